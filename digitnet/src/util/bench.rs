use crate::shape::{Conv2dGeometry, FeatureShape};
use crate::tensor::{Dim1, Dim2, Tensor1, Tensor2};
use rand::SeedableRng;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

pub const SIZE_LG: usize = 2048;
pub const SIZE_MD: usize = 512;
pub const SIZE_SM: usize = 128;
pub const CONV_BATCH: usize = 100;
const SEED: u64 = 0x8371943;

pub fn get_square_matrices<T>(size: usize) -> [Tensor2<T>; 3]
where
    StandardNormal: Distribution<T>,
{
    let mut rng = StdRng::seed_from_u64(SEED);
    [
        Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(size, size)),
        Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(size, size)),
        Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(size, size)),
    ]
}

/// The tensors of one convolution: input batch, weights, biases and output.
pub struct ConvTensors<T> {
    pub geom: Conv2dGeometry,
    pub input: Tensor2<T>,
    pub weights: Tensor2<T>,
    pub biases: Tensor1<T>,
    pub output: Tensor2<T>,
}

/// A padded `kernel_size` convolution with `out_channels` filters over `input`.
pub fn get_conv_tensors<T>(input: FeatureShape, out_channels: usize, kernel_size: usize) -> ConvTensors<T>
where
    T: crate::dtype::DType,
    StandardNormal: Distribution<T>,
{
    let geom = Conv2dGeometry::new(input, out_channels, kernel_size, 1, kernel_size / 2)
        .unwrap_or_else(|| panic!("kernel of size {kernel_size} does not fit {input}"));
    let mut rng = StdRng::seed_from_u64(SEED);
    ConvTensors {
        geom,
        input: Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(CONV_BATCH, input.len())),
        weights: Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(out_channels, geom.patch_len())),
        biases: Tensor1::from_distribution(&mut rng, StandardNormal, Dim1(out_channels)),
        output: Tensor2::zeroed(Dim2(CONV_BATCH, geom.output.len())),
    }
}
