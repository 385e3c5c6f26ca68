mod backend;
pub mod math;

pub use backend::CpuBackend;
