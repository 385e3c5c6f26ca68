use crate::backend::Backend;
use crate::net::NetBuildError;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::shape::{FeatureShape, Pool2dGeometry};
use crate::tensor::{Dim2, ITensor};
use std::fmt::{Debug, Formatter};

#[derive(Clone, Debug, PartialEq)]
pub struct MaxPool2dLayerParams {
    pub kernel_size: usize,
    pub stride: usize,
}

impl MaxPool2dLayerParams {
    /// non-overlapping windows, incomplete windows at the border are dropped
    pub fn new(kernel_size: usize) -> Self {
        MaxPool2dLayerParams {
            kernel_size,
            stride: kernel_size,
        }
    }
}

impl<B: Backend> LayerParams<B> for MaxPool2dLayerParams {
    type Layer = MaxPool2dLayer;

    fn create_layer(
        &self,
        _backend: &B,
        layer_idx: usize,
        input_shape: FeatureShape,
        _initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, NetBuildError> {
        Pool2dGeometry::new(input_shape, self.kernel_size, self.stride)
            .map(|geom| MaxPool2dLayer { geom })
            .ok_or(NetBuildError::InvalidLayer {
                layer_idx,
                layer_type: LayerType::MaxPool2d,
                input_shape,
                reason: "pooling window does not fit the input",
            })
    }
}

impl From<MaxPool2dLayerParams> for ConcreteLayerParams {
    fn from(params: MaxPool2dLayerParams) -> Self {
        ConcreteLayerParams::MaxPool2d(params)
    }
}

pub struct MaxPool2dLayer {
    geom: Pool2dGeometry,
}

impl MaxPool2dLayer {
    #[inline]
    pub fn geometry(&self) -> &Pool2dGeometry {
        &self.geom
    }
}

impl<B: Backend> Layer<B> for MaxPool2dLayer {
    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::MaxPool2d
    }

    fn forward(&mut self, backend: &B, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        backend.max_pool2d(&self.geom, input, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        _output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        output_error: &B::Tensor<Dim2>,
        _learn_rate: B::Float,
        _momentum: B::Float,
    ) {
        if let Some(input_error) = input_error {
            debug_assert_eq!(input_error.dims(), input.dims());
            backend.max_pool2d_error(&self.geom, input, output_error, input_error);
        }
    }

    #[inline]
    fn input_shape(&self) -> FeatureShape {
        self.geom.input
    }

    #[inline]
    fn output_shape(&self) -> FeatureShape {
        self.geom.output
    }
}

impl Debug for MaxPool2dLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxPool2dLayer")
            .field("input", &self.geom.input)
            .field("output", &self.geom.output)
            .field("kernel_size", &self.geom.kernel_size)
            .finish()
    }
}
