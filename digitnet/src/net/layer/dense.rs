use crate::activation::ActivationFn;
use crate::backend::Backend;
use crate::dtype::DType;
use crate::net::NetBuildError;
use crate::net::initializer::{Fan, NetInitializer};
use crate::net::layer::{ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::shape::FeatureShape;
use crate::tensor::{Dim1, Dim2, ITensor};
use std::fmt::{Debug, Formatter};

#[derive(Clone, Debug, PartialEq)]
pub struct DenseLayerParams {
    pub size: usize,
    pub activation_fn: ActivationFn,
}

impl DenseLayerParams {
    pub fn new(size: usize, activation_fn: ActivationFn) -> Self {
        DenseLayerParams { size, activation_fn }
    }
}

impl<B: Backend> LayerParams<B> for DenseLayerParams {
    type Layer = DenseLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: FeatureShape,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, NetBuildError> {
        let input_size = input_shape.len();
        let output_size = self.size;
        if input_size == 0 || output_size == 0 {
            return Err(NetBuildError::InvalidLayer {
                layer_idx,
                layer_type: LayerType::FullyConnected,
                input_shape,
                reason: "input and output sizes must be non-zero",
            });
        }
        let fan = Fan {
            fan_in: input_size,
            fan_out: output_size,
        };
        let weights = initializer.get_weights(
            LayerType::FullyConnected,
            Dim2(output_size, input_size),
            layer_idx,
            fan,
        );
        let biases = initializer.get_biases(LayerType::FullyConnected, Dim1(output_size), layer_idx, fan);
        Ok(DenseLayer {
            input_shape,
            output_size,
            weights: backend.new_tensor_from_native(weights),
            biases: backend.new_tensor_from_native(biases),
            activation: backend.new_tensor_exact(Dim2(0, output_size)),
            training_tensors: None,
            activation_fn: self.activation_fn,
        })
    }
}

impl From<DenseLayerParams> for ConcreteLayerParams {
    fn from(params: DenseLayerParams) -> Self {
        ConcreteLayerParams::FullyConnected(params)
    }
}

/// Fully connected layer computing `act(x * W^T + b)` with `W` of dims `(output, input)`.
pub struct DenseLayer<B: Backend> {
    input_shape: FeatureShape,
    output_size: usize,
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

impl<B: Backend> TrainingTensors<B> {
    fn new(backend: &B, num_rows: usize, size: usize, prev_size: usize) -> Self {
        TrainingTensors {
            activation_error: backend.new_tensor_exact(Dim2(num_rows, size)),
            weight_error: backend.new_tensor_exact(Dim2(size, prev_size)),
            bias_error: backend.new_tensor_exact(Dim1(size)),
        }
    }
}

impl<B: Backend> Layer<B> for DenseLayer<B> {
    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::FullyConnected
    }

    fn forward(&mut self, backend: &B, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        let num_rows = input.dims().rows();
        let input_size = self.input_size();

        assert_eq!(input.dims(), &Dim2(num_rows, input_size), "Invalid dimensions for input tensor");
        assert_eq!(output.dims(), &Dim2(num_rows, self.output_size), "Invalid dimensions for output tensor");

        backend.resize_tensor_major(&mut self.activation, num_rows);
        backend.matmul(
            B::Float::ONE,
            input,
            false,
            &self.weights,
            true,
            B::Float::ZERO,
            &mut self.activation,
        );
        backend.add_bias(&self.biases, &mut self.activation);

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
        let input_size = self.input_size();

        assert_eq!(input.dims(), &Dim2(num_rows, input_size), "Invalid dimensions for input tensor");
        assert_eq!(output.dims(), &Dim2(num_rows, self.output_size), "Invalid dimensions for output tensor");
        assert_eq!(
            out_error.dims(),
            &Dim2(num_rows, self.output_size),
            "Invalid dimensions for out_error tensor"
        );

        let output_size = self.output_size;
        let tt = self
            .training_tensors
            .get_or_insert_with(|| TrainingTensors::new(backend, num_rows, output_size, input_size));

        backend.resize_tensor_major(&mut tt.activation_error, num_rows);
        self.activation_fn
            .compute_error(backend, &self.activation, output, out_error, &mut tt.activation_error);

        if let Some(input_error) = input_error {
            assert_eq!(input_error.dims(), &Dim2(num_rows, input_size));
            backend.matmul(
                B::Float::ONE,
                &tt.activation_error,
                false,
                &self.weights,
                false,
                B::Float::ZERO,
                input_error,
            );
        }

        backend.matmul(
            learn_rate,
            &tt.activation_error,
            true,
            input,
            false,
            momentum,
            &mut tt.weight_error,
        );

        backend.column_sum(learn_rate, &tt.activation_error, momentum, &mut tt.bias_error);

        backend.add_assign(-B::Float::ONE, &tt.weight_error, B::Float::ONE, &mut self.weights);
        backend.add_assign(-B::Float::ONE, &tt.bias_error, B::Float::ONE, &mut self.biases);
    }

    #[inline]
    fn input_shape(&self) -> FeatureShape {
        self.input_shape
    }

    #[inline]
    fn output_shape(&self) -> FeatureShape {
        FeatureShape::flat(self.output_size)
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

impl<B: Backend> Debug for DenseLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseLayer")
            .field("size", &self.output_size)
            .field("activation_fn", &self.activation_fn)
            .field("weights", &self.weights)
            .field("biases", &self.biases)
            .finish_non_exhaustive()
    }
}
