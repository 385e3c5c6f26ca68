use crate::backend::Backend;
use crate::backend::math::argmax;
use crate::dtype::DType;
use crate::loss::LossFn;
use crate::net::initializer::{NetInitializer, RandomNetInitializer};
use crate::net::layer::{ConcreteLayer, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::scoring::Scorer;
use crate::shape::FeatureShape;
use crate::tensor::{Dim1, Dim2, ITensor, Tensor2, Tensor4, TensorBase};
use log::info;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub mod initializer;
pub mod layer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetBuildError {
    #[error("a network needs at least one layer")]
    NoLayers,
    #[error("layer {layer_idx} ({layer_type:?}) cannot take input of shape {input_shape}: {reason}")]
    InvalidLayer {
        layer_idx: usize,
        layer_type: LayerType,
        input_shape: FeatureShape,
        reason: &'static str,
    },
}

pub struct Net<B: Backend> {
    backend: B,
    input_shape: FeatureShape,
    layers: Box<[ConcreteLayer<B>]>,
    outputs: Box<[B::Tensor<Dim2>]>,

    // training only, input_errors[i] holds the error w.r.t. the output of layer i
    input_errors: Box<[B::Tensor<Dim2>]>,
    output_error_buff: B::Tensor<Dim1>,
    output_error_deriv_buff: B::Tensor<Dim2>,
}

/// Intermediate results of one layer for a traced forward pass.
pub struct LayerTrace<T> {
    pub layer_type: LayerType,
    pub shape: FeatureShape,
    /// the layer output before its activation function, equal to `output` for layers without one
    pub pre_activation: Tensor2<T>,
    pub output: Tensor2<T>,
}

impl<B: Backend> Net<B> {
    fn new(backend: B, input_shape: FeatureShape, layers: Box<[ConcreteLayer<B>]>) -> Self {
        let outputs: Box<[B::Tensor<Dim2>]> = layers
            .iter()
            .map(|l| backend.new_tensor_exact(Dim2(0, l.output_size())))
            .collect();
        let input_errors = layers
            .iter()
            .take(layers.len() - 1)
            .map(|l| backend.new_tensor_exact(Dim2(0, l.output_size())))
            .collect();
        let output_size = layers.last().map_or(0, |l| l.output_size());
        let output_error_buff = backend.new_tensor_exact(Dim1(0));
        let output_error_deriv_buff = backend.new_tensor_exact(Dim2(0, output_size));
        Net {
            backend,
            input_shape,
            layers,
            outputs,
            input_errors,
            output_error_buff,
            output_error_deriv_buff,
        }
    }

    pub fn predict(&mut self, input: &B::Tensor<Dim2>) -> &B::Tensor<Dim2> {
        let num_rows = input.dims().rows();
        assert_eq!(
            input.dims(),
            &Dim2(num_rows, self.input_size()),
            "Invalid dimensions for input tensor"
        );
        self.forward(num_rows, input);
        self.last_output()
    }

    pub fn train_batch(
        &mut self,
        input: &B::Tensor<Dim2>,
        expected: &B::Tensor<Dim2>,
        loss: &LossFn,
        learn_rate: B::Float,
        momentum: B::Float,
    ) -> TrainBatchResult<'_, B> {
        let num_rows = input.dims().rows();
        let input_size = self.input_size();
        let output_size = self.output_size();

        assert_eq!(
            input.dims(),
            &Dim2(num_rows, input_size),
            "Invalid dimensions for input tensor"
        );
        assert_eq!(
            expected.dims(),
            &Dim2(num_rows, output_size),
            "Invalid dimensions for expected tensor"
        );

        self.forward(num_rows, input);
        self.backprop(num_rows, input, expected, loss, learn_rate, momentum);

        TrainBatchResult {
            backend: &self.backend,
            output: self.last_output(),
            error: &self.output_error_buff,
        }
    }

    /// Runs a forward pass and feeds the output to `scorer`.
    pub fn evaluate<S: Scorer<B>>(&mut self, input: &B::Tensor<Dim2>, expected: &B::Tensor<Dim2>, scorer: &mut S) {
        self.predict(input);
        scorer.process_batch(&self.backend, self.last_output(), expected);
    }

    /// index of the highest output for every input row
    pub fn classify(&mut self, input: &B::Tensor<Dim2>) -> Vec<usize> {
        self.predict(input);
        let output = self.backend.tensor_as_native(self.last_output());
        output.iter_major_axis().map(|row| argmax(row.as_slice())).collect()
    }

    /// Runs a forward pass and returns a native copy of every layer's intermediate results.
    pub fn trace(&mut self, input: &B::Tensor<Dim2>) -> Vec<LayerTrace<B::Float>> {
        self.predict(input);
        self.layers
            .iter()
            .zip(self.outputs.iter())
            .map(|(layer, output)| {
                let output = self.backend.tensor_as_native(output);
                let pre_activation = match layer.pre_activation() {
                    Some(z) => self.backend.tensor_as_native(z),
                    None => output.clone(),
                };
                LayerTrace {
                    layer_type: layer.layer_type(),
                    shape: layer.output_shape(),
                    pre_activation,
                    output,
                }
            })
            .collect()
    }

    fn forward(&mut self, num_rows: usize, input: &B::Tensor<Dim2>) {
        for i in 0..self.layers.len() {
            let (prev, rest) = self.outputs.split_at_mut(i);
            let output = &mut rest[0];
            self.backend.resize_tensor_major(output, num_rows);
            let layer_input = if i == 0 { input } else { &prev[i - 1] };
            self.layers[i].forward(&self.backend, layer_input, output);
        }
    }

    fn backprop(
        &mut self,
        num_rows: usize,
        input: &B::Tensor<Dim2>,
        expected: &B::Tensor<Dim2>,
        loss: &LossFn,
        learn_rate: B::Float,
        momentum: B::Float,
    ) {
        let num_layers = self.layers.len();
        self.backend.resize_tensor(&mut self.output_error_buff, Dim1(num_rows));
        self.backend.resize_tensor_major(&mut self.output_error_deriv_buff, num_rows);
        loss.compute(
            &self.backend,
            &self.outputs[num_layers - 1],
            expected,
            &mut self.output_error_buff,
            &mut self.output_error_deriv_buff,
        );

        for i in (0..num_layers).rev() {
            let layer_input = if i == 0 { input } else { &self.outputs[i - 1] };
            let (lower, upper) = self.input_errors.split_at_mut(i);
            let output_error = if i + 1 == num_layers {
                &self.output_error_deriv_buff
            } else {
                &upper[0]
            };
            let input_error = match lower.last_mut() {
                Some(input_error) => {
                    self.backend.resize_tensor_major(input_error, num_rows);
                    Some(input_error)
                }
                None => None,
            };
            self.layers[i].backprop(
                &self.backend,
                layer_input,
                &self.outputs[i],
                input_error,
                output_error,
                learn_rate,
                momentum,
            );
        }
    }

    #[inline]
    fn last_output(&self) -> &B::Tensor<Dim2> {
        &self.outputs[self.outputs.len() - 1]
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn layers(&self) -> &[ConcreteLayer<B>] {
        &self.layers
    }

    #[inline]
    pub fn input_shape(&self) -> FeatureShape {
        self.input_shape
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_shape.len()
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// native copy of the weights of layer `layer_idx`, `(outputs, inputs)` for dense layers
    /// and `(out_channels, in_channels * k * k)` for convolutions
    pub fn weights(&self, layer_idx: usize) -> Option<Tensor2<B::Float>> {
        let weights = self.layers.get(layer_idx)?.weights()?;
        Some(self.backend.tensor_as_native(weights))
    }

    /// convolution kernels of layer `layer_idx` as `(out_channels, in_channels, k, k)`
    pub fn kernels(&self, layer_idx: usize) -> Option<Tensor4<B::Float>> {
        match self.layers.get(layer_idx)? {
            ConcreteLayer::Conv2d(conv) => Some(conv.kernels(&self.backend)),
            _ => None,
        }
    }
}

pub struct NetBuilder<B: Backend> {
    backend: B,
    input_shape: FeatureShape,
    initializer: Box<dyn NetInitializer<B::Float>>,
    layers: Vec<ConcreteLayerParams>,
}

impl<B: Backend> NetBuilder<B> {
    pub fn new(backend: B, input_shape: impl Into<FeatureShape>) -> Self {
        NetBuilder {
            backend,
            input_shape: input_shape.into(),
            initializer: Box::new(RandomNetInitializer::default()),
            layers: Vec::new(),
        }
    }

    pub fn with_initializer<I>(mut self, initializer: I) -> Self
    where
        I: 'static + NetInitializer<B::Float>,
    {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn with_layer<T>(mut self, layer: T) -> Self
    where
        T: Into<ConcreteLayerParams>,
    {
        self.layers.push(layer.into());
        self
    }

    pub fn build(mut self) -> Result<Net<B>, NetBuildError> {
        if self.layers.is_empty() {
            return Err(NetBuildError::NoLayers);
        }
        let mut layers = Vec::with_capacity(self.layers.len());
        let mut shape = self.input_shape;
        for (layer_idx, params) in self.layers.iter().enumerate() {
            let layer = params.create_layer(&self.backend, layer_idx, shape, self.initializer.as_mut())?;
            info!(
                "layer {layer_idx}: {:?} {} -> {}",
                layer.layer_type(),
                layer.input_shape(),
                layer.output_shape()
            );
            shape = layer.output_shape();
            layers.push(layer);
        }
        Ok(Net::new(self.backend, self.input_shape, layers.into_boxed_slice()))
    }
}

pub struct TrainBatchResult<'a, B: Backend> {
    pub backend: &'a B,
    pub output: &'a B::Tensor<Dim2>,
    pub error: &'a B::Tensor<Dim1>,
}

impl<B: Backend> TrainBatchResult<'_, B> {
    /// mean of the per-sample losses of the batch
    pub fn mean_loss(&self) -> f64 {
        let errors = self.backend.tensor_as_native(self.error);
        if errors.is_empty() {
            return 0.0;
        }
        errors.as_ref().iter().map(|e| e.as_f64()).sum::<f64>() / errors.len() as f64
    }
}

impl<B: Backend> Debug for Net<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Net")
            .field("backend", &self.backend)
            .field("input_shape", &self.input_shape)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::activation::ActivationFn;
    use crate::backend::{BackendOther, CpuBackend, TensorOps};
    use crate::net::initializer::{Fan, InitStrategy};
    use crate::net::layer::{Conv2dLayerParams, DenseLayerParams, MaxPool2dLayerParams};
    use crate::tensor::{Tensor, Tensor1};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::distributions::Uniform;
    use rand::rngs::StdRng;

    /// seeded initializer that nudges a single weight
    struct Nudged {
        inner: RandomNetInitializer,
        layer_idx: usize,
        index: usize,
        delta: f64,
    }

    impl NetInitializer<f64> for Nudged {
        fn get_weights(&mut self, layer_type: LayerType, dims: Dim2, layer_idx: usize, fan: Fan) -> Tensor2<f64> {
            let mut weights = self.inner.get_weights(layer_type, dims, layer_idx, fan);
            if layer_idx == self.layer_idx {
                weights.as_mut()[self.index] += self.delta;
            }
            weights
        }
        fn get_biases(&mut self, layer_type: LayerType, dims: Dim1, layer_idx: usize, fan: Fan) -> Tensor1<f64> {
            self.inner.get_biases(layer_type, dims, layer_idx, fan)
        }
    }

    fn small_cnn(initializer: impl NetInitializer<f64> + 'static) -> Net<CpuBackend<f64>> {
        NetBuilder::new(CpuBackend::new(), (1, 6, 6))
            .with_initializer(initializer)
            .with_layer(
                Conv2dLayerParams::new(2, 3)
                    .with_padding(1)
                    .with_activation(ActivationFn::Tanh),
            )
            .with_layer(MaxPool2dLayerParams::new(2))
            .with_layer(DenseLayerParams::new(3, ActivationFn::Identity))
            .build()
            .unwrap()
    }

    fn nudged(layer_idx: usize, index: usize, delta: f64) -> Nudged {
        Nudged {
            inner: RandomNetInitializer::seed_from_u64(42).with_strategy(InitStrategy::XavierUniform),
            layer_idx,
            index,
            delta,
        }
    }

    fn batch() -> (Tensor2<f64>, Tensor2<f64>) {
        let mut rng = StdRng::seed_from_u64(1);
        let input = Tensor::from_distribution(&mut rng, Uniform::new(0.0, 1.0), Dim2(4, 36));
        let expected = Tensor::from_vec_2d(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
        (input, expected)
    }

    fn mean_loss(net: &mut Net<CpuBackend<f64>>, input: &Tensor2<f64>, expected: &Tensor2<f64>) -> f64 {
        let output = net.predict(input).clone();
        let backend = net.backend();
        let mut loss = backend.new_tensor_exact(Dim1(4));
        let mut deriv = backend.new_tensor_exact(Dim2(4, 3));
        backend.cross_entropy(&output, expected, &mut loss, &mut deriv);
        loss.as_ref().iter().sum::<f64>() / 4.0
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let (input, expected) = batch();
        let h = 1e-6;
        // (layer, weight index): conv kernels and dense weights
        for (layer_idx, index) in [(0, 0), (0, 4), (0, 13), (2, 0), (2, 7), (2, 17)] {
            let mut net = small_cnn(nudged(layer_idx, index, 0.0));
            let before = net.weights(layer_idx).unwrap();
            // lr 1 without momentum: the update is exactly the negative gradient
            net.train_batch(&input, &expected, &LossFn::CrossEntropy, 1.0, 0.0);
            let after = net.weights(layer_idx).unwrap();
            let analytic = before.as_ref()[index] - after.as_ref()[index];

            let plus = mean_loss(&mut small_cnn(nudged(layer_idx, index, h)), &input, &expected);
            let minus = mean_loss(&mut small_cnn(nudged(layer_idx, index, -h)), &input, &expected);
            assert_abs_diff_eq!(analytic, (plus - minus) / (2.0 * h), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_momentum_accumulates_previous_step() {
        let (input, expected) = batch();
        let (lr, momentum) = (0.1, 0.9);
        let mut with_momentum = small_cnn(nudged(0, 0, 0.0));
        let mut without = small_cnn(nudged(0, 0, 0.0));
        for layer_idx in [0, 2] {
            assert_eq!(with_momentum.weights(layer_idx), without.weights(layer_idx));
        }
        let w0: Vec<Tensor2<f64>> = [0, 2].map(|i| with_momentum.weights(i).unwrap()).into();

        // the first step of both nets is plain SGD, so they stay identical
        with_momentum.train_batch(&input, &expected, &LossFn::CrossEntropy, lr, momentum);
        without.train_batch(&input, &expected, &LossFn::CrossEntropy, lr, momentum);
        let w1: Vec<Tensor2<f64>> = [0, 2].map(|i| with_momentum.weights(i).unwrap()).into();
        for (k, layer_idx) in [0, 2].into_iter().enumerate() {
            assert_eq!(without.weights(layer_idx).unwrap(), w1[k]);
        }

        with_momentum.train_batch(&input, &expected, &LossFn::CrossEntropy, lr, momentum);
        without.train_batch(&input, &expected, &LossFn::CrossEntropy, lr, 0.0);
        for (k, layer_idx) in [0, 2].into_iter().enumerate() {
            let w2 = with_momentum.weights(layer_idx).unwrap();
            let sgd = without.weights(layer_idx).unwrap();
            for i in 0..w2.len() {
                let step1 = w0[k].as_ref()[i] - w1[k].as_ref()[i];
                let gradient_step = w1[k].as_ref()[i] - sgd.as_ref()[i];
                let step2 = w1[k].as_ref()[i] - w2.as_ref()[i];
                assert_abs_diff_eq!(step2, momentum * step1 + gradient_step, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_train_batch_reduces_loss() {
        let (input, expected) = batch();
        let mut net = small_cnn(nudged(0, 0, 0.0));
        let first = net
            .train_batch(&input, &expected, &LossFn::CrossEntropy, 0.1, 0.9)
            .mean_loss();
        let mut last = first;
        for _ in 0..100 {
            last = net
                .train_batch(&input, &expected, &LossFn::CrossEntropy, 0.1, 0.9)
                .mean_loss();
        }
        assert!(last < first * 0.5, "loss went from {first} to {last}");
    }

    #[test]
    fn test_trace_shapes() {
        let mut net = NetBuilder::new(CpuBackend::<f32>::new(), (1, 16, 16))
            .with_initializer(RandomNetInitializer::seed_from_u64(0))
            .with_layer(Conv2dLayerParams::new(16, 5).with_padding(2).with_activation(ActivationFn::RELU))
            .with_layer(MaxPool2dLayerParams::new(2))
            .with_layer(Conv2dLayerParams::new(32, 5).with_padding(2).with_activation(ActivationFn::RELU))
            .with_layer(MaxPool2dLayerParams::new(2))
            .with_layer(DenseLayerParams::new(10, ActivationFn::Identity))
            .build()
            .unwrap();
        assert_eq!(net.output_size(), 10);
        let input = Tensor::filled(0.5f32, Dim2(2, 256));
        let trace = net.trace(&input);
        let shapes: Vec<FeatureShape> = trace.iter().map(|t| t.shape).collect();
        assert_eq!(
            shapes,
            vec![
                FeatureShape::new(16, 16, 16),
                FeatureShape::new(16, 8, 8),
                FeatureShape::new(32, 8, 8),
                FeatureShape::new(32, 4, 4),
                FeatureShape::flat(10),
            ]
        );
        // relu output is the clamped pre-activation
        for (&z, &a) in trace[0].pre_activation.as_ref().iter().zip(trace[0].output.as_ref()) {
            assert_eq!(a, z.max(0.0));
        }
        assert_eq!(trace[1].pre_activation, trace[1].output);
        assert_eq!(trace[4].output.dims(), &Dim2(2, 10));

        let kernels = net.kernels(2).unwrap();
        assert_eq!(kernels.dims(), &crate::tensor::Dim4(32, 16, 5, 5));
        assert!(net.kernels(1).is_none());
        assert_eq!(net.weights(4).unwrap().dims(), &Dim2(10, 512));
    }

    #[test]
    fn test_build_errors() {
        let err = NetBuilder::new(CpuBackend::<f32>::new(), 784).build().unwrap_err();
        assert_eq!(err, NetBuildError::NoLayers);

        let err = NetBuilder::new(CpuBackend::<f32>::new(), 784)
            .with_layer(Conv2dLayerParams::new(4, 5))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            NetBuildError::InvalidLayer {
                layer_idx: 0,
                layer_type: LayerType::Conv2d,
                ..
            }
        ));

        let err = NetBuilder::new(CpuBackend::<f32>::new(), (1, 3, 3))
            .with_layer(MaxPool2dLayerParams::new(2))
            .with_layer(MaxPool2dLayerParams::new(2))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "layer 1 (MaxPool2d) cannot take input of shape 1x1x1: pooling window does not fit the input"
        );
    }

    #[test]
    fn test_single_layer_net() {
        let mut net = NetBuilder::new(CpuBackend::<f64>::new(), 2)
            .with_initializer(RandomNetInitializer::seed_from_u64(3))
            .with_layer(DenseLayerParams::new(2, ActivationFn::Identity))
            .build()
            .unwrap();
        let input = Tensor::from_vec_2d(vec![[1.0, 0.0], [0.0, 1.0]]);
        let expected = Tensor::from_vec_2d(vec![[1.0, 0.0], [0.0, 1.0]]);
        let mut loss = f64::MAX;
        for _ in 0..200 {
            loss = net
                .train_batch(&input, &expected, &LossFn::MeanSquaredError, 0.5, 0.0)
                .mean_loss();
        }
        assert!(loss < 1e-6, "loss was {loss}");
    }
}
