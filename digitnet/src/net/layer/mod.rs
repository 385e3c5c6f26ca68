mod concrete;
mod conv;
mod dense;
mod pool;

use crate::backend::Backend;
use crate::net::NetBuildError;
use crate::net::initializer::NetInitializer;
use crate::shape::FeatureShape;
use crate::tensor::{Dim1, Dim2};
use std::fmt::Debug;

pub use concrete::{ConcreteLayer, ConcreteLayerParams};
pub use conv::{Conv2dLayer, Conv2dLayerParams};
pub use dense::{DenseLayer, DenseLayerParams};
pub use pool::{MaxPool2dLayer, MaxPool2dLayerParams};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LayerType {
    FullyConnected,
    Conv2d,
    MaxPool2d,
}

pub trait LayerParams<B: Backend>: Clone + Debug {
    type Layer: Layer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: FeatureShape,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, NetBuildError>;
}

/// A layer maps `(batch, input_shape.len())` tensors to `(batch, output_shape.len())` tensors.
pub trait Layer<B: Backend>: Debug {
    fn layer_type(&self) -> LayerType;

    fn forward(&mut self, backend: &B, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>);

    /// Propagates `output_error` back through the layer, writes the error w.r.t. the layer
    /// input into `input_error` (if given) and applies one gradient descent step.
    #[allow(clippy::too_many_arguments)]
    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        output_error: &B::Tensor<Dim2>,
        learn_rate: B::Float,
        momentum: B::Float,
    );

    fn input_shape(&self) -> FeatureShape;
    fn output_shape(&self) -> FeatureShape;

    #[inline]
    fn input_size(&self) -> usize {
        self.input_shape().len()
    }

    #[inline]
    fn output_size(&self) -> usize {
        self.output_shape().len()
    }

    /// output of the last forward pass before the activation function was applied
    fn pre_activation(&self) -> Option<&B::Tensor<Dim2>> {
        None
    }

    fn weights(&self) -> Option<&B::Tensor<Dim2>> {
        None
    }

    fn biases(&self) -> Option<&B::Tensor<Dim1>> {
        None
    }
}
