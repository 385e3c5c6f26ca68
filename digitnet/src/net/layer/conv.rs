use crate::activation::ActivationFn;
use crate::backend::Backend;
use crate::dtype::DType;
use crate::net::NetBuildError;
use crate::net::initializer::{Fan, NetInitializer};
use crate::net::layer::{ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::shape::{Conv2dGeometry, FeatureShape};
use crate::tensor::{Dim1, Dim2, Dim4, ITensor, Tensor4};
use std::fmt::{Debug, Formatter};

#[derive(Clone, Debug, PartialEq)]
pub struct Conv2dLayerParams {
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    pub activation_fn: ActivationFn,
}

impl Conv2dLayerParams {
    /// a stride 1 convolution without padding or activation
    pub fn new(out_channels: usize, kernel_size: usize) -> Self {
        Conv2dLayerParams {
            out_channels,
            kernel_size,
            stride: 1,
            padding: 0,
            activation_fn: ActivationFn::Identity,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_activation(mut self, activation_fn: ActivationFn) -> Self {
        self.activation_fn = activation_fn;
        self
    }
}

impl<B: Backend> LayerParams<B> for Conv2dLayerParams {
    type Layer = Conv2dLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: FeatureShape,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, NetBuildError> {
        let geom = Conv2dGeometry::new(
            input_shape,
            self.out_channels,
            self.kernel_size,
            self.stride,
            self.padding,
        )
        .ok_or(NetBuildError::InvalidLayer {
            layer_idx,
            layer_type: LayerType::Conv2d,
            input_shape,
            reason: "kernel does not fit the padded input",
        })?;
        let kernel_area = self.kernel_size * self.kernel_size;
        let fan = Fan {
            fan_in: input_shape.channels * kernel_area,
            fan_out: self.out_channels * kernel_area,
        };
        let weights = initializer.get_weights(
            LayerType::Conv2d,
            Dim2(self.out_channels, geom.patch_len()),
            layer_idx,
            fan,
        );
        let biases = initializer.get_biases(LayerType::Conv2d, Dim1(self.out_channels), layer_idx, fan);
        Ok(Conv2dLayer {
            geom,
            weights: backend.new_tensor_from_native(weights),
            biases: backend.new_tensor_from_native(biases),
            activation: backend.new_tensor_exact(Dim2(0, geom.output.len())),
            training_tensors: None,
            activation_fn: self.activation_fn,
        })
    }
}

impl From<Conv2dLayerParams> for ConcreteLayerParams {
    fn from(params: Conv2dLayerParams) -> Self {
        ConcreteLayerParams::Conv2d(params)
    }
}

/// 2d convolution with weights stored as `(out_channels, in_channels * k * k)`.
pub struct Conv2dLayer<B: Backend> {
    geom: Conv2dGeometry,
    weights: B::Tensor<Dim2>,
    biases: B::Tensor<Dim1>,
    activation: B::Tensor<Dim2>,
    training_tensors: Option<TrainingTensors<B>>,
    activation_fn: ActivationFn,
}

struct TrainingTensors<B: Backend> {
    activation_error: B::Tensor<Dim2>,
    weight_error: B::Tensor<Dim2>,
    bias_error: B::Tensor<Dim1>,
}

impl<B: Backend> Conv2dLayer<B> {
    #[inline]
    pub fn geometry(&self) -> &Conv2dGeometry {
        &self.geom
    }

    /// the weights as `(out_channels, in_channels, kernel_size, kernel_size)`
    pub fn kernels(&self, backend: &B) -> Tensor4<B::Float> {
        let k = self.geom.kernel_size;
        backend
            .tensor_as_native(&self.weights)
            .into_reshaped(Dim4(self.geom.output.channels, self.geom.input.channels, k, k))
    }
}

impl<B: Backend> Layer<B> for Conv2dLayer<B> {
    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Conv2d
    }

    fn forward(&mut self, backend: &B, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        let num_rows = input.dims().rows();
        backend.resize_tensor_major(&mut self.activation, num_rows);
        backend.conv2d(&self.geom, input, &self.weights, &self.biases, &mut self.activation);
        self.activation_fn.compute(backend, &self.activation, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        out_error: &B::Tensor<Dim2>,
        learn_rate: B::Float,
        momentum: B::Float,
    ) {
        let num_rows = input.dims().rows();
        assert_eq!(
            out_error.dims(),
            &Dim2(num_rows, self.geom.output.len()),
            "Invalid dimensions for out_error tensor"
        );
        let out_len = self.geom.output.len();
        let weight_dims = *self.weights.dims();
        let tt = self.training_tensors.get_or_insert_with(|| TrainingTensors {
            activation_error: backend.new_tensor_exact(Dim2(num_rows, out_len)),
            weight_error: backend.new_tensor_exact(weight_dims),
            bias_error: backend.new_tensor_exact(Dim1(weight_dims.rows())),
        });

        backend.resize_tensor_major(&mut tt.activation_error, num_rows);
        self.activation_fn
            .compute_error(backend, &self.activation, output, out_error, &mut tt.activation_error);

        backend.conv2d_backprop(
            &self.geom,
            input,
            &self.weights,
            &tt.activation_error,
            input_error,
            learn_rate,
            momentum,
            &mut tt.weight_error,
            &mut tt.bias_error,
        );

        backend.add_assign(-B::Float::ONE, &tt.weight_error, B::Float::ONE, &mut self.weights);
        backend.add_assign(-B::Float::ONE, &tt.bias_error, B::Float::ONE, &mut self.biases);
    }

    #[inline]
    fn input_shape(&self) -> FeatureShape {
        self.geom.input
    }

    #[inline]
    fn output_shape(&self) -> FeatureShape {
        self.geom.output
    }

    #[inline]
    fn pre_activation(&self) -> Option<&B::Tensor<Dim2>> {
        Some(&self.activation)
    }

    #[inline]
    fn weights(&self) -> Option<&B::Tensor<Dim2>> {
        Some(&self.weights)
    }

    #[inline]
    fn biases(&self) -> Option<&B::Tensor<Dim1>> {
        Some(&self.biases)
    }
}

impl<B: Backend> Debug for Conv2dLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conv2dLayer")
            .field("input", &self.geom.input)
            .field("output", &self.geom.output)
            .field("kernel_size", &self.geom.kernel_size)
            .field("stride", &self.geom.stride)
            .field("padding", &self.geom.padding)
            .field("activation_fn", &self.activation_fn)
            .finish_non_exhaustive()
    }
}
