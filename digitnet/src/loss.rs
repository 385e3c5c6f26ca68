use crate::backend::Backend;
use crate::tensor::{Dim1, Dim2};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossFn {
    MeanSquaredError,
    /// Softmax cross-entropy on the raw network outputs. Pair it with an
    /// [`Identity`](crate::activation::ActivationFn::Identity) output layer.
    #[default]
    CrossEntropy,
}

impl LossFn {
    /// Writes the per-sample loss into `result` and the derivative of the batch mean loss
    /// w.r.t. `output` into `result_deriv`.
    pub fn compute<B: Backend>(
        &self,
        backend: &B,
        output: &B::Tensor<Dim2>,
        expected: &B::Tensor<Dim2>,
        result: &mut B::Tensor<Dim1>,
        result_deriv: &mut B::Tensor<Dim2>,
    ) {
        match self {
            LossFn::MeanSquaredError => backend.mean_squared_error(output, expected, result, result_deriv),
            LossFn::CrossEntropy => backend.cross_entropy(output, expected, result, result_deriv),
        }
    }
}
