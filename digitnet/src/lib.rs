pub mod activation;
pub mod backend;
pub mod data;
pub mod dtype;
pub mod loss;
pub mod net;
pub mod scoring;
pub mod shape;
pub mod tensor;
pub mod train;
pub mod util;

extern crate matrixmultiply;
extern crate num_traits;
extern crate rand;
extern crate rand_distr;
extern crate serde;
