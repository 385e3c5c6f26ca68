use crate::backend::Backend;
use crate::dtype::DType;
use crate::tensor::Dim2;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub enum ActivationFn {
    /// passes the pre-activation through, used for logits fed to a cross-entropy loss
    Identity,
    #[default]
    Sigmoid,
    Tanh,
    ReLU {
        leak: f64,
    },
    Softmax,
}

impl ActivationFn {
    pub const RELU: ActivationFn = ActivationFn::ReLU { leak: 0.0 };

    pub fn compute<B: Backend>(&self, backend: &B, activation: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        match self {
            ActivationFn::Identity => backend.copy(activation, output),
            ActivationFn::Sigmoid => backend.sigmoid(activation, output),
            ActivationFn::Tanh => backend.tanh(activation, output),
            &ActivationFn::ReLU { leak } => backend.relu(B::Float::from_f64(leak), activation, output),
            ActivationFn::Softmax => backend.softmax(activation, output),
        }
    }

    pub fn compute_error<B: Backend>(
        &self,
        backend: &B,
        activation: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        out_error: &B::Tensor<Dim2>,
        result: &mut B::Tensor<Dim2>,
    ) {
        match self {
            ActivationFn::Identity => backend.copy(out_error, result),
            ActivationFn::Sigmoid => backend.sigmoid_error(output, out_error, result),
            ActivationFn::Tanh => backend.tanh_error(output, out_error, result),
            &ActivationFn::ReLU { leak } => {
                backend.relu_error(B::Float::from_f64(leak), activation, out_error, result)
            }
            ActivationFn::Softmax => backend.softmax_error(output, out_error, result),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::{CpuBackend, TensorOps};
    use crate::tensor;
    use crate::tensor::Tensor2;

    #[test]
    fn test_identity_passes_through() {
        let backend = CpuBackend::<f32>::new();
        let activation: Tensor2<f32> = tensor![[-1.0, 2.0]];
        let mut output = backend.new_tensor_exact(Dim2(1, 2));
        ActivationFn::Identity.compute(&backend, &activation, &mut output);
        assert_eq!(output, activation);
        let out_error: Tensor2<f32> = tensor![[0.5, 0.25]];
        let mut result = backend.new_tensor_exact(Dim2(1, 2));
        ActivationFn::Identity.compute_error(&backend, &activation, &output, &out_error, &mut result);
        assert_eq!(result, out_error);
    }

    #[test]
    fn test_relu_constant() {
        let backend = CpuBackend::<f32>::new();
        let activation: Tensor2<f32> = tensor![[-1.0, 2.0]];
        let mut output = backend.new_tensor_exact(Dim2(1, 2));
        ActivationFn::RELU.compute(&backend, &activation, &mut output);
        assert_eq!(output.as_ref(), &[0.0, 2.0]);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ActivationFn::Tanh).unwrap();
        assert_eq!(json, "\"Tanh\"");
        let relu: ActivationFn = serde_json::from_str(r#"{"ReLU":{"leak":0.01}}"#).unwrap();
        assert_eq!(relu, ActivationFn::ReLU { leak: 0.01 });
    }
}
