use crate::dtype::DTypeFloat;
use crate::shape::{Conv2dGeometry, Pool2dGeometry};
use crate::tensor::{Dim1, Dim2, Dims, ITensor, Tensor, TensorBase, TensorBaseMut};
use std::fmt::Debug;

mod cpu;

pub use cpu::*;

pub trait TensorTyped {
    type Float: DTypeFloat;
    type Tensor<D: Dims>: ITensor<D> + Debug;
}

pub trait TensorOps: TensorTyped {
    fn new_tensor_exact<D: Dims>(&self, dims: D) -> Self::Tensor<D>;
    fn resize_tensor<D: Dims>(&self, tensor: &mut Self::Tensor<D>, dims: D);
    fn write_tensor<T, D>(&self, tensor: &mut Self::Tensor<D>, native_src: &T)
    where
        T: TensorBase<Self::Float, D>,
        D: Dims;
    fn read_tensor<T, D>(&self, tensor: &Self::Tensor<D>, native_dst: &mut T)
    where
        T: TensorBaseMut<Self::Float, D>,
        D: Dims;

    fn resize_tensor_major<D: Dims>(&self, tensor: &mut Self::Tensor<D>, size: usize) {
        let dims = tensor.dims().resize_major(size);
        self.resize_tensor(tensor, dims);
    }

    fn new_tensor_from_native<T, D>(&self, native: T) -> Self::Tensor<D>
    where
        T: TensorBase<Self::Float, D>,
        D: Dims,
    {
        let mut tensor = self.new_tensor_exact(*native.dims());
        self.write_tensor(&mut tensor, &native);
        tensor
    }

    fn tensor_as_native<D: Dims>(&self, tensor: &Self::Tensor<D>) -> Tensor<Self::Float, D> {
        let mut native = Tensor::zeroed(*tensor.dims());
        self.read_tensor(tensor, &mut native);
        native
    }
}

pub trait MatrixMultiplication: TensorTyped {
    /// performs a generic matrix multiplication (gemm) operation
    #[allow(clippy::too_many_arguments)]
    fn matmul(
        &self,
        alpha: Self::Float,
        a: &Self::Tensor<Dim2>,
        ta: bool,
        b: &Self::Tensor<Dim2>,
        tb: bool,
        beta: Self::Float,
        c: &mut Self::Tensor<Dim2>,
    );
}

pub trait BackendOther: TensorTyped {
    fn column_sum(&self, alpha: Self::Float, a: &Self::Tensor<Dim2>, beta: Self::Float, b: &mut Self::Tensor<Dim1>);

    fn add_assign<D: Dims>(&self, alpha: Self::Float, a: &Self::Tensor<D>, beta: Self::Float, b: &mut Self::Tensor<D>);

    /// adds `bias` to every row of `output`
    fn add_bias(&self, bias: &Self::Tensor<Dim1>, output: &mut Self::Tensor<Dim2>);

    fn copy<D: Dims>(&self, src: &Self::Tensor<D>, dst: &mut Self::Tensor<D>);

    /// computes the sigmoid function for all elements in a given tensor
    fn sigmoid(&self, activation: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);
    fn sigmoid_error(
        &self,
        output: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim2>,
    );

    fn tanh(&self, activation: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);
    fn tanh_error(
        &self,
        output: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim2>,
    );

    /// computes the leaky ReLU function for all elements in a given tensor
    fn relu(&self, leak: Self::Float, activation: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);
    fn relu_error(
        &self,
        leak: Self::Float,
        activation: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim2>,
    );

    fn softmax(&self, activation: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);
    fn softmax_error(
        &self,
        output: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim2>,
    );

    /// Per-row mean of squared differences. The derivative is taken w.r.t. the mean over the
    /// whole batch.
    fn mean_squared_error(
        &self,
        output: &Self::Tensor<Dim2>,
        expected: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim1>,
        result_deriv: &mut Self::Tensor<Dim2>,
    );

    /// Per-row softmax cross-entropy of `output` logits against the `expected` distribution.
    /// The derivative is taken w.r.t. the mean over the batch and the logits.
    fn cross_entropy(
        &self,
        output: &Self::Tensor<Dim2>,
        expected: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim1>,
        result_deriv: &mut Self::Tensor<Dim2>,
    );

    /// Convolves every row of `input` with `weights` of dims `(out_channels, patch_len)` and
    /// adds one bias per output channel.
    fn conv2d(
        &self,
        geom: &Conv2dGeometry,
        input: &Self::Tensor<Dim2>,
        weights: &Self::Tensor<Dim2>,
        biases: &Self::Tensor<Dim1>,
        output: &mut Self::Tensor<Dim2>,
    );

    /// Computes `weight_error = alpha * dL/dW + beta * weight_error` (same for the biases) and,
    /// when requested, the error w.r.t. the convolution input.
    #[allow(clippy::too_many_arguments)]
    fn conv2d_backprop(
        &self,
        geom: &Conv2dGeometry,
        input: &Self::Tensor<Dim2>,
        weights: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        input_error: Option<&mut Self::Tensor<Dim2>>,
        alpha: Self::Float,
        beta: Self::Float,
        weight_error: &mut Self::Tensor<Dim2>,
        bias_error: &mut Self::Tensor<Dim1>,
    );

    fn max_pool2d(&self, geom: &Pool2dGeometry, input: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);

    /// routes each output error to the (first) maximum of its pooling window
    fn max_pool2d_error(
        &self,
        geom: &Pool2dGeometry,
        input: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        input_error: &mut Self::Tensor<Dim2>,
    );

    fn accum_confusion_matrix_multiclass(
        &self,
        matrix: &mut Self::Tensor<Dim2>,
        output: &Self::Tensor<Dim2>,
        expected: &Self::Tensor<Dim2>,
    );
}

pub trait Backend: 'static + Debug + TensorTyped + TensorOps + MatrixMultiplication + BackendOther {}
