use super::{
    Conv2dLayer, Conv2dLayerParams, DenseLayer, DenseLayerParams, Layer, LayerParams, LayerType, MaxPool2dLayer,
    MaxPool2dLayerParams,
};
use crate::backend::Backend;
use crate::net::NetBuildError;
use crate::net::initializer::NetInitializer;
use crate::shape::FeatureShape;
use crate::tensor::{Dim1, Dim2};
use std::fmt::{Debug, Formatter};

// LayerParams has an associated type, so it can't be boxed as a trait object

#[derive(Clone, Debug, PartialEq)]
pub enum ConcreteLayerParams {
    FullyConnected(DenseLayerParams),
    Conv2d(Conv2dLayerParams),
    MaxPool2d(MaxPool2dLayerParams),
}

impl<B: Backend> LayerParams<B> for ConcreteLayerParams {
    type Layer = ConcreteLayer<B>;
    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: FeatureShape,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, NetBuildError> {
        Ok(match self {
            ConcreteLayerParams::FullyConnected(params) => {
                ConcreteLayer::FullyConnected(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::Conv2d(params) => {
                ConcreteLayer::Conv2d(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::MaxPool2d(params) => {
                ConcreteLayer::MaxPool2d(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
        })
    }
}

pub enum ConcreteLayer<B: Backend> {
    FullyConnected(DenseLayer<B>),
    Conv2d(Conv2dLayer<B>),
    MaxPool2d(MaxPool2dLayer),
}

impl<B: Backend> ConcreteLayer<B> {
    fn inner(&self) -> &dyn Layer<B> {
        match self {
            ConcreteLayer::FullyConnected(inner) => inner,
            ConcreteLayer::Conv2d(inner) => inner,
            ConcreteLayer::MaxPool2d(inner) => inner,
        }
    }
    fn inner_mut(&mut self) -> &mut dyn Layer<B> {
        match self {
            ConcreteLayer::FullyConnected(inner) => inner,
            ConcreteLayer::Conv2d(inner) => inner,
            ConcreteLayer::MaxPool2d(inner) => inner,
        }
    }
}

impl<B: Backend> Layer<B> for ConcreteLayer<B> {
    #[inline]
    fn layer_type(&self) -> LayerType {
        self.inner().layer_type()
    }

    fn forward(&mut self, backend: &B, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        self.inner_mut().forward(backend, input, output)
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        output_error: &B::Tensor<Dim2>,
        learn_rate: B::Float,
        momentum: B::Float,
    ) {
        self.inner_mut()
            .backprop(backend, input, output, input_error, output_error, learn_rate, momentum)
    }

    #[inline]
    fn input_shape(&self) -> FeatureShape {
        self.inner().input_shape()
    }

    #[inline]
    fn output_shape(&self) -> FeatureShape {
        self.inner().output_shape()
    }

    #[inline]
    fn pre_activation(&self) -> Option<&B::Tensor<Dim2>> {
        self.inner().pre_activation()
    }

    #[inline]
    fn weights(&self) -> Option<&B::Tensor<Dim2>> {
        self.inner().weights()
    }

    #[inline]
    fn biases(&self) -> Option<&B::Tensor<Dim1>> {
        self.inner().biases()
    }
}

impl<B: Backend> Debug for ConcreteLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.inner(), f)
    }
}
