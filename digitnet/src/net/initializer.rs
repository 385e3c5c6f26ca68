use crate::dtype::DType;
use crate::net::layer::LayerType;
use crate::tensor::{Dim1, Dim2, Dims, Tensor, Tensor1, Tensor2};
use log::debug;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Number of connections feeding into and out of one unit of a layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Fan {
    pub fan_in: usize,
    pub fan_out: usize,
}

pub trait NetInitializer<T: DType> {
    fn get_weights(&mut self, layer_type: LayerType, dims: Dim2, layer_idx: usize, fan: Fan) -> Tensor2<T>;
    fn get_biases(&mut self, layer_type: LayerType, dims: Dim1, layer_idx: usize, fan: Fan) -> Tensor1<T>;
}

/// How [`RandomNetInitializer`] draws the parameters of each layer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum InitStrategy {
    /// weights and biases from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`
    #[default]
    Default,
    /// weights from `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`, default biases
    XavierUniform,
    /// weights from `N(0, sqrt(2 / (fan_in + fan_out)))`, zero biases
    XavierNormal,
    /// weights from `U(low, high)`, default biases
    Uniform { low: f64, high: f64 },
}

impl InitStrategy {
    pub const UNIT_UNIFORM: InitStrategy = InitStrategy::Uniform { low: 0.0, high: 1.0 };
}

impl Display for InitStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStrategy::Default => f.write_str("Default"),
            InitStrategy::XavierUniform => f.write_str("Xavier"),
            InitStrategy::XavierNormal => f.write_str("Xavier normal"),
            InitStrategy::Uniform { low, high } => write!(f, "Uniform({low}, {high})"),
        }
    }
}

pub struct RandomNetInitializer {
    rng: StdRng,
    strategy: InitStrategy,
}

impl RandomNetInitializer {
    pub fn seed_from_u64(seed: u64) -> Self {
        RandomNetInitializer {
            rng: StdRng::seed_from_u64(seed),
            strategy: InitStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: InitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[inline]
    pub fn strategy(&self) -> InitStrategy {
        self.strategy
    }
}

impl Default for RandomNetInitializer {
    fn default() -> Self {
        RandomNetInitializer {
            rng: StdRng::from_entropy(),
            strategy: InitStrategy::default(),
        }
    }
}

fn default_bound(fan: Fan) -> f64 {
    if fan.fan_in == 0 {
        0.0
    } else {
        1.0 / (fan.fan_in as f64).sqrt()
    }
}

fn sample_uniform<T: DType, D: Dims, R: Rng>(rng: &mut R, low: f64, high: f64, dims: D) -> Tensor<T, D> {
    let dist = Uniform::new_inclusive(low.min(high), low.max(high));
    let data: Vec<T> = dist.sample_iter(rng).take(dims.tensor_len()).map(T::from_f64).collect();
    Tensor::from_vec(data, dims)
}

impl<T: DType> NetInitializer<T> for RandomNetInitializer {
    fn get_weights(&mut self, layer_type: LayerType, dims: Dim2, layer_idx: usize, fan: Fan) -> Tensor2<T> {
        debug!(
            "initializing {layer_type:?} weights {dims} of layer {layer_idx} with {} ({fan:?})",
            self.strategy
        );
        match self.strategy {
            InitStrategy::Default => {
                let bound = default_bound(fan);
                sample_uniform(&mut self.rng, -bound, bound, dims)
            }
            InitStrategy::XavierUniform => {
                let bound = (6.0 / (fan.fan_in + fan.fan_out) as f64).sqrt();
                sample_uniform(&mut self.rng, -bound, bound, dims)
            }
            InitStrategy::XavierNormal => {
                let std = (2.0 / (fan.fan_in + fan.fan_out) as f64).sqrt();
                let data: Vec<T> = StandardNormal
                    .sample_iter(&mut self.rng)
                    .take(dims.tensor_len())
                    .map(|x: f64| T::from_f64(x * std))
                    .collect();
                Tensor::from_vec(data, dims)
            }
            InitStrategy::Uniform { low, high } => sample_uniform(&mut self.rng, low, high, dims),
        }
    }

    fn get_biases(&mut self, _layer_type: LayerType, dims: Dim1, _layer_idx: usize, fan: Fan) -> Tensor1<T> {
        match self.strategy {
            InitStrategy::XavierNormal => Tensor::filled(T::ZERO, dims),
            _ => {
                let bound = default_bound(fan);
                sample_uniform(&mut self.rng, -bound, bound, dims)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor::TensorBase;

    const FAN: Fan = Fan {
        fan_in: 100,
        fan_out: 10,
    };

    fn weights(strategy: InitStrategy, seed: u64) -> Tensor2<f64> {
        RandomNetInitializer::seed_from_u64(seed)
            .with_strategy(strategy)
            .get_weights(LayerType::FullyConnected, Dim2(10, 100), 0, FAN)
    }

    #[test]
    fn test_seeded_is_deterministic() {
        assert_eq!(weights(InitStrategy::Default, 0), weights(InitStrategy::Default, 0));
        assert!(weights(InitStrategy::Default, 0) != weights(InitStrategy::Default, 1));
    }

    #[test]
    fn test_default_bounds() {
        let (min, max) = weights(InitStrategy::Default, 3).value_range().unwrap();
        assert!(min >= -0.1 && max <= 0.1);
        assert!(min < -0.05 && max > 0.05);
        let biases: Tensor1<f64> =
            RandomNetInitializer::seed_from_u64(3).get_biases(LayerType::FullyConnected, Dim1(10), 0, FAN);
        let (min, max) = biases.value_range().unwrap();
        assert!(min >= -0.1 && max <= 0.1);
    }

    #[test]
    fn test_xavier_uniform_bounds() {
        let bound = (6.0f64 / 110.0).sqrt();
        let (min, max) = weights(InitStrategy::XavierUniform, 5).value_range().unwrap();
        assert!(min >= -bound && max <= bound);
        assert!(max > 0.1);
    }

    #[test]
    fn test_unit_uniform() {
        let w = weights(InitStrategy::UNIT_UNIFORM, 9);
        let (min, max) = w.value_range().unwrap();
        assert!(min >= 0.0 && max <= 1.0);
        let mean = w.iter_major_axis().flat_map(|row| row.into_iter()).sum::<f64>() / 1000.0;
        assert!((mean - 0.5).abs() < 0.05, "mean was {mean}");
    }

    #[test]
    fn test_xavier_normal() {
        let mut init = RandomNetInitializer::seed_from_u64(11).with_strategy(InitStrategy::XavierNormal);
        let w: Tensor2<f64> = init.get_weights(LayerType::Conv2d, Dim2(50, 100), 1, FAN);
        let var = w.as_ref().iter().map(|x| x * x).sum::<f64>() / w.as_ref().len() as f64;
        assert!((var - 2.0 / 110.0).abs() < 0.005, "variance was {var}");
        let b: Tensor1<f64> = init.get_biases(LayerType::Conv2d, Dim1(4), 1, FAN);
        assert_eq!(b.as_ref(), &[0.0; 4]);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(InitStrategy::XavierUniform.to_string(), "Xavier");
        assert_eq!(InitStrategy::UNIT_UNIFORM.to_string(), "Uniform(0, 1)");
    }
}
