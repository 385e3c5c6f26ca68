use super::math::{argmax, col2im, compute_jacobian_matrix, for_each_pool_max, im2col, log_sum_exp, DTypeOps};
use crate::backend::{Backend, BackendOther, MatrixMultiplication, TensorOps, TensorTyped};
use crate::shape::{Conv2dGeometry, Pool2dGeometry};
use crate::tensor::{Dim2, Dims, ITensor, Tensor, Tensor1, Tensor2, TensorBase, TensorBaseMut};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter, Write};
use std::iter::zip;
use std::ops::{Deref, DerefMut};

pub struct CpuBackend<DT: DTypeOps> {
    temp_matrix: RefCell<Tensor2<DT>>,
    temp_cols: RefCell<Tensor2<DT>>,
}

impl<DT: DTypeOps> CpuBackend<DT> {
    pub fn new() -> Self {
        CpuBackend {
            temp_matrix: RefCell::new(Tensor2::empty()),
            temp_cols: RefCell::new(Tensor2::empty()),
        }
    }
}

impl<DT: DTypeOps> Default for CpuBackend<DT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DT: DTypeOps> TensorTyped for CpuBackend<DT> {
    type Float = DT;
    type Tensor<D: Dims> = Tensor<DT, D>;
}

impl<DT: DTypeOps> TensorOps for CpuBackend<DT> {
    #[inline]
    fn new_tensor_exact<D: Dims>(&self, dims: D) -> Tensor<DT, D> {
        Tensor::zeroed(dims)
    }

    #[inline]
    fn resize_tensor<D: Dims>(&self, tensor: &mut Tensor<DT, D>, dims: D) {
        tensor.resize(DT::ZERO, dims)
    }

    fn write_tensor<T, D>(&self, tensor: &mut Tensor<DT, D>, native_src: &T)
    where
        T: TensorBase<DT, D>,
        D: Dims,
    {
        assert_eq!(tensor.dims(), native_src.dims());
        tensor.as_mut().copy_from_slice(native_src.as_ref());
    }

    fn read_tensor<T, D>(&self, tensor: &Tensor<DT, D>, native_dst: &mut T)
    where
        T: TensorBaseMut<DT, D>,
        D: Dims,
    {
        assert_eq!(tensor.dims(), native_dst.dims());
        native_dst.as_mut().copy_from_slice(tensor.as_ref());
    }

    #[inline]
    fn new_tensor_from_native<T, D>(&self, native: T) -> Tensor<DT, D>
    where
        T: TensorBase<DT, D>,
        D: Dims,
    {
        native.into_owned()
    }

    #[inline]
    fn tensor_as_native<D: Dims>(&self, tensor: &Tensor<DT, D>) -> Tensor<DT, D> {
        tensor.clone()
    }
}

impl<DT: DTypeOps> MatrixMultiplication for CpuBackend<DT> {
    #[inline]
    fn matmul(&self, alpha: DT, a: &Tensor2<DT>, ta: bool, b: &Tensor2<DT>, tb: bool, beta: DT, c: &mut Tensor2<DT>) {
        DT::matrix_multiply(alpha, a, ta, b, tb, beta, c);
    }
}

impl<DT: DTypeOps> BackendOther for CpuBackend<DT> {
    fn column_sum(&self, alpha: DT, a: &Tensor2<DT>, beta: DT, b: &mut Tensor1<DT>) {
        let cols = a.dims().cols();
        assert_eq!(b.len(), cols);
        b.as_mut().iter_mut().for_each(|x| *x *= beta);
        for row in a.as_ref().chunks_exact(cols.max(1)) {
            for (x, &r) in zip(b.as_mut().iter_mut(), row) {
                *x += alpha * r;
            }
        }
    }

    fn add_assign<D>(&self, alpha: DT, a: &Tensor<DT, D>, beta: DT, b: &mut Tensor<DT, D>)
    where
        D: Dims,
    {
        assert_eq!(a.dims(), b.dims());
        for (&ai, bi) in zip(a, b) {
            *bi = alpha * ai + beta * *bi;
        }
    }

    fn add_bias(&self, bias: &Tensor1<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(bias.len(), output.dims().cols());
        for row in output.iter_major_axis_mut() {
            for (o, &b) in zip(row, bias) {
                *o += b;
            }
        }
    }

    fn copy<D: Dims>(&self, src: &Tensor<DT, D>, dst: &mut Tensor<DT, D>) {
        assert_eq!(src.dims(), dst.dims());
        dst.as_mut().copy_from_slice(src.as_ref());
    }

    fn sigmoid(&self, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), output.dims());
        for (o, &a) in zip(output, activation) {
            *o = DT::ONE / (DT::ONE + (-a).exp());
        }
    }

    fn sigmoid_error(&self, output: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        assert_eq!(output.dims(), result.dims());
        assert_eq!(output.dims(), out_error.dims());
        for ((r, &out), &err) in zip(zip(result, output), out_error) {
            *r = err * (out * (DT::ONE - out))
        }
    }

    fn tanh(&self, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), output.dims());
        for (o, &a) in zip(output, activation) {
            *o = a.tanh();
        }
    }

    fn tanh_error(&self, output: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        assert_eq!(output.dims(), result.dims());
        assert_eq!(output.dims(), out_error.dims());
        for ((r, &out), &err) in zip(zip(result, output), out_error) {
            *r = err * (DT::ONE - out * out)
        }
    }

    fn relu(&self, leak: DT, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), output.dims());
        for (o, &a) in zip(output, activation) {
            *o = if a < DT::ZERO { a * leak } else { a }
        }
    }

    fn relu_error(&self, leak: DT, activation: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), result.dims());
        assert_eq!(activation.dims(), out_error.dims());
        for ((r, &act), &err) in zip(zip(result, activation), out_error) {
            *r = if act < DT::ZERO { leak * err } else { err };
        }
    }

    fn softmax(&self, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), output.dims());
        for (mut output_row, activation_row) in zip(output.iter_major_axis_mut(), activation.iter_major_axis()) {
            // shift the values by -max(inputs) to prevent overflow (does not affect derivative)
            let max = activation_row.iter().copied().fold(DT::neg_infinity(), DT::max);
            let mut sum = DT::ZERO;
            for (t, &a) in zip(output_row.iter_mut(), activation_row) {
                let x = (a - max).exp();
                sum += x;
                *t = x;
            }
            for t in output_row.iter_mut() {
                *t /= sum
            }
        }
    }

    fn softmax_error(&self, output: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        let size = output.dims().cols();
        assert_eq!(output.dims(), result.dims());
        assert_eq!(output.dims(), out_error.dims());
        let mut temp = self.temp_matrix.borrow_mut();
        temp.resize(DT::ZERO, Dim2(size, size));
        for (mut result_row, (output_row, out_err_row)) in zip(
            result.iter_major_axis_mut(),
            zip(output.iter_major_axis(), out_error.iter_major_axis()),
        ) {
            compute_jacobian_matrix(output_row.as_ref(), temp.deref_mut());
            DT::matrix_multiply(
                DT::ONE,
                &out_err_row.as_row_matrix(),
                false,
                temp.deref(),
                false,
                DT::ZERO,
                &mut result_row.as_row_matrix_mut(),
            );
        }
    }

    fn mean_squared_error(
        &self,
        output: &Tensor2<DT>,
        expected: &Tensor2<DT>,
        result: &mut Tensor1<DT>,
        result_deriv: &mut Tensor2<DT>,
    ) {
        assert_eq!(output.dims().rows(), result.len());
        assert_eq!(output.dims(), expected.dims());
        assert_eq!(output.dims(), result_deriv.dims());
        let cols = DT::from_usize(output.dims().cols());
        let deriv_scale = DT::from_f64(2.0) / (cols * DT::from_usize(output.dims().rows()));
        for (r, (rd_row, (o_row, e_row))) in zip(
            result,
            zip(
                result_deriv.iter_major_axis_mut(),
                zip(output.iter_major_axis(), expected.iter_major_axis()),
            ),
        ) {
            let mut sum_error = DT::ZERO;
            for (rd, (&o, &e)) in zip(rd_row, zip(o_row, e_row)) {
                let diff = o - e;
                *rd = diff * deriv_scale;
                sum_error += diff * diff;
            }
            *r = sum_error / cols;
        }
    }

    fn cross_entropy(
        &self,
        output: &Tensor2<DT>,
        expected: &Tensor2<DT>,
        result: &mut Tensor1<DT>,
        result_deriv: &mut Tensor2<DT>,
    ) {
        assert_eq!(output.dims().rows(), result.len());
        assert_eq!(output.dims(), expected.dims());
        assert_eq!(output.dims(), result_deriv.dims());
        let rows = DT::from_usize(output.dims().rows());
        for (r, (rd_row, (o_row, e_row))) in zip(
            result,
            zip(
                result_deriv.iter_major_axis_mut(),
                zip(output.iter_major_axis(), expected.iter_major_axis()),
            ),
        ) {
            let lse = log_sum_exp(o_row.as_slice());
            let target_sum = e_row.iter().fold(DT::ZERO, |sum, &y| sum + y);
            let mut loss = DT::ZERO;
            for (rd, (&x, &y)) in zip(rd_row, zip(o_row, e_row)) {
                loss += y * (lse - x);
                *rd = ((x - lse).exp() * target_sum - y) / rows;
            }
            *r = loss;
        }
    }

    fn conv2d(
        &self,
        geom: &Conv2dGeometry,
        input: &Tensor2<DT>,
        weights: &Tensor2<DT>,
        biases: &Tensor1<DT>,
        output: &mut Tensor2<DT>,
    ) {
        let rows = input.dims().rows();
        let channels = geom.output.channels;
        let out_spatial = geom.output.spatial_len();
        assert_eq!(input.dims(), &Dim2(rows, geom.input.len()), "Invalid dimensions for input tensor");
        assert_eq!(output.dims(), &Dim2(rows, geom.output.len()), "Invalid dimensions for output tensor");
        assert_eq!(weights.dims(), &Dim2(channels, geom.patch_len()), "Invalid dimensions for weights");
        assert_eq!(biases.len(), channels, "Invalid dimensions for biases");

        let mut cols = self.temp_cols.borrow_mut();
        cols.resize(DT::ZERO, Dim2(geom.patch_len(), out_spatial));
        for (in_row, mut out_row) in zip(input.iter_major_axis(), output.iter_major_axis_mut()) {
            im2col(geom, in_row.as_slice(), cols.as_mut());
            let mut out_mat = out_row.reshape_mut(Dim2(channels, out_spatial));
            DT::matrix_multiply(DT::ONE, weights, false, cols.deref(), false, DT::ZERO, &mut out_mat);
            for (channel, &b) in zip(out_mat.as_mut().chunks_exact_mut(out_spatial), biases) {
                channel.iter_mut().for_each(|x| *x += b);
            }
        }
    }

    fn conv2d_backprop(
        &self,
        geom: &Conv2dGeometry,
        input: &Tensor2<DT>,
        weights: &Tensor2<DT>,
        out_error: &Tensor2<DT>,
        input_error: Option<&mut Tensor2<DT>>,
        alpha: DT,
        beta: DT,
        weight_error: &mut Tensor2<DT>,
        bias_error: &mut Tensor1<DT>,
    ) {
        let rows = input.dims().rows();
        let channels = geom.output.channels;
        let out_spatial = geom.output.spatial_len();
        assert_eq!(input.dims(), &Dim2(rows, geom.input.len()), "Invalid dimensions for input tensor");
        assert_eq!(out_error.dims(), &Dim2(rows, geom.output.len()), "Invalid dimensions for out_error tensor");
        assert_eq!(weights.dims(), &Dim2(channels, geom.patch_len()), "Invalid dimensions for weights");
        assert_eq!(weights.dims(), weight_error.dims());
        assert_eq!(bias_error.len(), channels);

        weight_error.as_mut().iter_mut().for_each(|w| *w *= beta);
        bias_error.as_mut().iter_mut().for_each(|b| *b *= beta);

        let mut cols = self.temp_cols.borrow_mut();
        cols.resize(DT::ZERO, Dim2(geom.patch_len(), out_spatial));
        let mut col_error = self.temp_matrix.borrow_mut();
        let mut input_error_rows = input_error.map(|e| {
            assert_eq!(e.dims(), input.dims(), "Invalid dimensions for input_error tensor");
            col_error.resize(DT::ZERO, Dim2(geom.patch_len(), out_spatial));
            e.iter_major_axis_mut()
        });

        for (in_row, err_row) in zip(input.iter_major_axis(), out_error.iter_major_axis()) {
            let err_mat = err_row.reshape(Dim2(channels, out_spatial));
            im2col(geom, in_row.as_slice(), cols.as_mut());
            DT::matrix_multiply(alpha, &err_mat, false, cols.deref(), true, DT::ONE, weight_error);
            for (b, channel) in zip(bias_error.as_mut().iter_mut(), err_mat.as_ref().chunks_exact(out_spatial)) {
                *b += alpha * channel.iter().fold(DT::ZERO, |sum, &x| sum + x);
            }
            if let Some(mut in_err_row) = input_error_rows.as_mut().and_then(|it| it.next()) {
                DT::matrix_multiply(DT::ONE, weights, true, &err_mat, false, DT::ZERO, col_error.deref_mut());
                col2im(geom, col_error.as_ref(), in_err_row.as_mut());
            }
        }
    }

    fn max_pool2d(&self, geom: &Pool2dGeometry, input: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        let rows = input.dims().rows();
        assert_eq!(input.dims(), &Dim2(rows, geom.input.len()), "Invalid dimensions for input tensor");
        assert_eq!(output.dims(), &Dim2(rows, geom.output.len()), "Invalid dimensions for output tensor");
        for (in_row, mut out_row) in zip(input.iter_major_axis(), output.iter_major_axis_mut()) {
            let src = in_row.as_slice();
            let dst = out_row.as_mut();
            for_each_pool_max(geom, src, |o, i| dst[o] = src[i]);
        }
    }

    fn max_pool2d_error(
        &self,
        geom: &Pool2dGeometry,
        input: &Tensor2<DT>,
        out_error: &Tensor2<DT>,
        input_error: &mut Tensor2<DT>,
    ) {
        let rows = input.dims().rows();
        assert_eq!(input.dims(), &Dim2(rows, geom.input.len()), "Invalid dimensions for input tensor");
        assert_eq!(out_error.dims(), &Dim2(rows, geom.output.len()), "Invalid dimensions for out_error tensor");
        assert_eq!(input.dims(), input_error.dims(), "Invalid dimensions for input_error tensor");
        for ((in_row, err_row), mut in_err_row) in zip(
            zip(input.iter_major_axis(), out_error.iter_major_axis()),
            input_error.iter_major_axis_mut(),
        ) {
            let err = err_row.as_slice();
            let dst = in_err_row.as_mut();
            dst.fill(DT::ZERO);
            for_each_pool_max(geom, in_row.as_slice(), |o, i| dst[i] += err[o]);
        }
    }

    fn accum_confusion_matrix_multiclass(
        &self,
        matrix: &mut Tensor2<DT>,
        output: &Tensor2<DT>,
        expected: &Tensor2<DT>,
    ) {
        assert_eq!(output.dims(), expected.dims());
        let classes = output.dims().cols();
        assert_eq!(matrix.dims(), &Dim2(classes, classes));
        for (output_row, expected_row) in zip(output.iter_major_axis(), expected.iter_major_axis()) {
            let out_idx = argmax(output_row.as_ref());
            let expected_idx = argmax(expected_row.as_ref());
            matrix[[expected_idx, out_idx]] += DT::ONE;
        }
    }
}

impl<DT: DTypeOps> Backend for CpuBackend<DT> {}

impl<DT: DTypeOps> Debug for CpuBackend<DT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CpuBackend<")?;
        f.write_str(std::any::type_name::<DT>())?;
        f.write_char('>')
    }
}
