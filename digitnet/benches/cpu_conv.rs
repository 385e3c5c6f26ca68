#[macro_use]
extern crate bencher;

use bencher::Bencher;
use digitnet::backend::{BackendOther, CpuBackend};
use digitnet::shape::FeatureShape;
use digitnet::util::bench::*;

macro_rules! impl_bench {
    ($name:ident, $input:expr, $out_channels:literal, $kernel:literal) => {
        fn $name(bench: &mut Bencher) {
            let backend = CpuBackend::<f32>::new();
            let mut t = get_conv_tensors::<f32>($input, $out_channels, $kernel);
            bench.iter(|| backend.conv2d(&t.geom, &t.input, &t.weights, &t.biases, &mut t.output))
        }
    };
}

impl_bench!(conv_first_16x16, FeatureShape::new(1, 16, 16), 16, 5);
impl_bench!(conv_second_8x8, FeatureShape::new(16, 8, 8), 32, 5);
impl_bench!(conv_first_28x28, FeatureShape::new(1, 28, 28), 16, 5);
benchmark_group!(cpu_conv_f32, conv_first_16x16, conv_second_8x8, conv_first_28x28);

benchmark_main!(cpu_conv_f32);
