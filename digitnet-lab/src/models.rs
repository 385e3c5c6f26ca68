use digitnet::activation::ActivationFn;
use digitnet::backend::Backend;
use digitnet::net::initializer::RandomNetInitializer;
use digitnet::net::layer::{Conv2dLayerParams, DenseLayerParams, MaxPool2dLayerParams};
use digitnet::net::{Net, NetBuildError, NetBuilder};
use digitnet::shape::FeatureShape;

/// Layer sizes of the initialization comparison network, input first.
pub const MLP_LAYERS: [usize; 7] = [784, 100, 10, 100, 10, 100, 10];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CnnParams {
    /// side of the square single channel input
    pub image_size: usize,
    pub out_1: usize,
    pub out_2: usize,
    pub classes: usize,
}

impl Default for CnnParams {
    fn default() -> Self {
        CnnParams {
            image_size: 16,
            out_1: 16,
            out_2: 32,
            classes: 10,
        }
    }
}

impl CnnParams {
    /// Convolution layers of [`build_cnn`] as `(layer index, name, output channels)`.
    pub fn conv_layers(&self) -> [(usize, &'static str, usize); 2] {
        [(0, "conv1", self.out_1), (2, "conv2", self.out_2)]
    }
}

/// Grid rows for plotting the feature maps of a convolution with `channels` outputs, before
/// and after its ReLU.
pub fn feature_map_rows(channels: usize) -> (usize, usize) {
    ((channels / 4).max(1), channels.clamp(1, 4))
}

/// Two 5x5 convolutions with ReLU and 2x2 max pooling, then one dense layer producing logits.
pub fn build_cnn<B: Backend>(
    backend: B,
    params: CnnParams,
    initializer: RandomNetInitializer,
) -> Result<Net<B>, NetBuildError> {
    NetBuilder::new(backend, FeatureShape::new(1, params.image_size, params.image_size))
        .with_initializer(initializer)
        .with_layer(
            Conv2dLayerParams::new(params.out_1, 5)
                .with_padding(2)
                .with_activation(ActivationFn::RELU),
        )
        .with_layer(MaxPool2dLayerParams::new(2))
        .with_layer(
            Conv2dLayerParams::new(params.out_2, 5)
                .with_padding(2)
                .with_activation(ActivationFn::RELU),
        )
        .with_layer(MaxPool2dLayerParams::new(2))
        .with_layer(DenseLayerParams::new(params.classes, ActivationFn::Identity))
        .build()
}

/// Dense layers between consecutive `sizes`, tanh on every hidden layer and logits out.
pub fn build_mlp<B: Backend>(
    backend: B,
    sizes: &[usize],
    initializer: RandomNetInitializer,
) -> Result<Net<B>, NetBuildError> {
    let Some((&input, layers)) = sizes.split_first() else {
        return Err(NetBuildError::NoLayers);
    };
    let last = layers.len().saturating_sub(1);
    layers
        .iter()
        .enumerate()
        .fold(
            NetBuilder::new(backend, input).with_initializer(initializer),
            |builder, (i, &size)| {
                let activation_fn = if i == last {
                    ActivationFn::Identity
                } else {
                    ActivationFn::Tanh
                };
                builder.with_layer(DenseLayerParams::new(size, activation_fn))
            },
        )
        .build()
}

#[cfg(test)]
mod test {
    use super::*;
    use digitnet::backend::CpuBackend;
    use digitnet::net::initializer::InitStrategy;
    use digitnet::net::layer::{Layer, LayerType};
    use digitnet::tensor::{Dim2, Dim4, ITensor};

    #[test]
    fn test_cnn_layout() {
        let net = build_cnn(
            CpuBackend::<f32>::new(),
            CnnParams::default(),
            RandomNetInitializer::seed_from_u64(0),
        )
        .unwrap();
        let types: Vec<LayerType> = net.layers().iter().map(|l| l.layer_type()).collect();
        assert_eq!(
            types,
            vec![
                LayerType::Conv2d,
                LayerType::MaxPool2d,
                LayerType::Conv2d,
                LayerType::MaxPool2d,
                LayerType::FullyConnected
            ]
        );
        assert_eq!(net.layers()[3].output_shape(), FeatureShape::new(32, 4, 4));
        assert_eq!(net.input_size(), 256);
        assert_eq!(net.output_size(), 10);
        assert_eq!(net.kernels(0).unwrap().dims(), &Dim4(16, 1, 5, 5));
        assert_eq!(net.weights(4).unwrap().dims(), &Dim2(10, 32 * 4 * 4));
    }

    #[test]
    fn test_feature_map_grids() {
        let params = CnnParams::default();
        let net = build_cnn(CpuBackend::<f32>::new(), params, RandomNetInitializer::seed_from_u64(0)).unwrap();
        for (layer_idx, _, channels) in params.conv_layers() {
            assert_eq!(net.layers()[layer_idx].layer_type(), LayerType::Conv2d);
            assert_eq!(net.layers()[layer_idx].output_shape().channels, channels);
        }
        let [(_, _, conv1), (_, _, conv2)] = params.conv_layers();
        assert_eq!(feature_map_rows(conv1), (4, 4));
        assert_eq!(feature_map_rows(conv2), (8, 4));
        assert_eq!(feature_map_rows(2), (1, 2));
    }

    #[test]
    fn test_cnn_on_full_size_images() {
        let params = CnnParams {
            image_size: 28,
            ..CnnParams::default()
        };
        let net = build_cnn(CpuBackend::<f32>::new(), params, RandomNetInitializer::seed_from_u64(0)).unwrap();
        assert_eq!(net.weights(4).unwrap().dims(), &Dim2(10, 32 * 7 * 7));
        let tiny = CnnParams {
            image_size: 2,
            ..CnnParams::default()
        };
        assert!(build_cnn(CpuBackend::<f32>::new(), tiny, RandomNetInitializer::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_mlp_layout() {
        let initializer = RandomNetInitializer::seed_from_u64(0).with_strategy(InitStrategy::UNIT_UNIFORM);
        let net = build_mlp(CpuBackend::<f32>::new(), &MLP_LAYERS, initializer).unwrap();
        assert_eq!(net.layers().len(), 6);
        assert_eq!(net.input_size(), 784);
        assert_eq!(net.output_size(), 10);
        let debug = format!("{net:?}");
        assert_eq!(debug.matches("Tanh").count(), 5);
        assert_eq!(debug.matches("Identity").count(), 1);
        // unit uniform weights are never negative
        let weights = net.weights(2).unwrap();
        assert_eq!(weights.dims(), &Dim2(100, 10));
        assert!(weights.as_ref().iter().all(|&w| (0.0..=1.0).contains(&w)));

        let err = build_mlp(CpuBackend::<f32>::new(), &[784], RandomNetInitializer::seed_from_u64(0));
        assert_eq!(err.unwrap_err(), NetBuildError::NoLayers);
        let err = build_mlp(CpuBackend::<f32>::new(), &[], RandomNetInitializer::seed_from_u64(0));
        assert_eq!(err.unwrap_err(), NetBuildError::NoLayers);
    }
}
