use crate::tensor::Dim3;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Shape of a single sample as it flows between layers.
///
/// Samples are stored as flat rows of a `(batch, channels * height * width)` matrix in
/// channel-major order, so a dense layer simply sees `len()` features.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FeatureShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FeatureShape {
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        FeatureShape {
            channels,
            height,
            width,
        }
    }

    /// a plain feature vector
    pub const fn flat(size: usize) -> Self {
        FeatureShape::new(size, 1, 1)
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub const fn spatial_len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn as_dims(&self) -> Dim3 {
        Dim3(self.channels, self.height, self.width)
    }
}

impl From<usize> for FeatureShape {
    fn from(size: usize) -> Self {
        FeatureShape::flat(size)
    }
}

impl From<(usize, usize, usize)> for FeatureShape {
    fn from((channels, height, width): (usize, usize, usize)) -> Self {
        FeatureShape::new(channels, height, width)
    }
}

impl Display for FeatureShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// Geometry of a 2d convolution over one sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Conv2dGeometry {
    pub input: FeatureShape,
    pub output: FeatureShape,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl Conv2dGeometry {
    /// Returns `None` when the kernel does not fit the padded input.
    pub fn new(
        input: FeatureShape,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Option<Self> {
        if input.is_empty() || out_channels == 0 || kernel_size == 0 || stride == 0 {
            return None;
        }
        let padded_h = input.height + 2 * padding;
        let padded_w = input.width + 2 * padding;
        if kernel_size > padded_h || kernel_size > padded_w {
            return None;
        }
        let output = FeatureShape::new(
            out_channels,
            (padded_h - kernel_size) / stride + 1,
            (padded_w - kernel_size) / stride + 1,
        );
        Some(Conv2dGeometry {
            input,
            output,
            kernel_size,
            stride,
            padding,
        })
    }

    /// number of input values seen by one kernel application
    #[inline]
    pub fn patch_len(&self) -> usize {
        self.input.channels * self.kernel_size * self.kernel_size
    }
}

/// Geometry of a 2d max pooling over one sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pool2dGeometry {
    pub input: FeatureShape,
    pub output: FeatureShape,
    pub kernel_size: usize,
    pub stride: usize,
}

impl Pool2dGeometry {
    pub fn new(input: FeatureShape, kernel_size: usize, stride: usize) -> Option<Self> {
        if input.is_empty() || kernel_size == 0 || stride == 0 {
            return None;
        }
        if kernel_size > input.height || kernel_size > input.width {
            return None;
        }
        let output = FeatureShape::new(
            input.channels,
            (input.height - kernel_size) / stride + 1,
            (input.width - kernel_size) / stride + 1,
        );
        Some(Pool2dGeometry {
            input,
            output,
            kernel_size,
            stride,
        })
    }
}
