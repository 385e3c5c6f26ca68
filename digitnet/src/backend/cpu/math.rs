use crate::dtype::{DType, DTypeFloat};
use crate::shape::{Conv2dGeometry, Pool2dGeometry};
use crate::tensor::{Dim2, ITensor, Tensor2, TensorBase, TensorBaseMut};
use std::cmp::Ordering;

pub fn compute_jacobian_matrix<T: DType>(a: &[T], b: &mut Tensor2<T>) {
    let size = a.len();
    assert_eq!(b.dims(), &Dim2(size, size));
    for (i, row) in b.as_mut().chunks_exact_mut(size.max(1)).enumerate().take(size) {
        let ai = a[i];
        for (j, x) in row.iter_mut().enumerate() {
            *x = if i == j { ai * (T::ONE - ai) } else { T::ZERO - ai * a[j] };
        }
    }
}

/// index of the first maximum element
pub fn argmax<T: PartialOrd + Copy>(a: &[T]) -> usize {
    a.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, T)>, (i, &x)| match best {
            Some((_, b)) if x.partial_cmp(&b) != Some(Ordering::Greater) => best,
            _ => Some((i, x)),
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Unfolds one sample (`channels * height * width`) into a `(patch_len, out_h * out_w)` matrix
/// whose columns are the zero padded receptive fields of each output position.
pub fn im2col<T: DType>(geom: &Conv2dGeometry, image: &[T], cols: &mut [T]) {
    let Conv2dGeometry {
        input,
        output,
        kernel_size: k,
        stride,
        padding,
    } = *geom;
    let out_spatial = output.spatial_len();
    debug_assert_eq!(image.len(), input.len());
    debug_assert_eq!(cols.len(), geom.patch_len() * out_spatial);
    for c in 0..input.channels {
        let channel = &image[c * input.spatial_len()..(c + 1) * input.spatial_len()];
        for ky in 0..k {
            for kx in 0..k {
                let row = (c * k + ky) * k + kx;
                let dst = &mut cols[row * out_spatial..(row + 1) * out_spatial];
                for oy in 0..output.height {
                    let iy = (oy * stride + ky) as isize - padding as isize;
                    let dst_row = &mut dst[oy * output.width..(oy + 1) * output.width];
                    if iy < 0 || iy >= input.height as isize {
                        dst_row.fill(T::ZERO);
                        continue;
                    }
                    let src_row = &channel[iy as usize * input.width..(iy as usize + 1) * input.width];
                    for (ox, d) in dst_row.iter_mut().enumerate() {
                        let ix = (ox * stride + kx) as isize - padding as isize;
                        *d = if ix < 0 || ix >= input.width as isize {
                            T::ZERO
                        } else {
                            src_row[ix as usize]
                        };
                    }
                }
            }
        }
    }
}

/// Inverse of [`im2col`]: accumulates the columns back onto a zeroed image.
pub fn col2im<T: DType>(geom: &Conv2dGeometry, cols: &[T], image: &mut [T]) {
    let Conv2dGeometry {
        input,
        output,
        kernel_size: k,
        stride,
        padding,
    } = *geom;
    let out_spatial = output.spatial_len();
    debug_assert_eq!(image.len(), input.len());
    debug_assert_eq!(cols.len(), geom.patch_len() * out_spatial);
    image.fill(T::ZERO);
    for c in 0..input.channels {
        let channel = &mut image[c * input.spatial_len()..(c + 1) * input.spatial_len()];
        for ky in 0..k {
            for kx in 0..k {
                let row = (c * k + ky) * k + kx;
                let src = &cols[row * out_spatial..(row + 1) * out_spatial];
                for oy in 0..output.height {
                    let iy = (oy * stride + ky) as isize - padding as isize;
                    if iy < 0 || iy >= input.height as isize {
                        continue;
                    }
                    for ox in 0..output.width {
                        let ix = (ox * stride + kx) as isize - padding as isize;
                        if ix >= 0 && ix < input.width as isize {
                            channel[iy as usize * input.width + ix as usize] += src[oy * output.width + ox];
                        }
                    }
                }
            }
        }
    }
}

/// Calls `f(output_index, input_index)` with the position of the first maximum of every
/// pooling window of one sample.
pub fn for_each_pool_max<T, F>(geom: &Pool2dGeometry, image: &[T], mut f: F)
where
    T: DType,
    F: FnMut(usize, usize),
{
    let Pool2dGeometry {
        input,
        output,
        kernel_size: k,
        stride,
    } = *geom;
    debug_assert_eq!(image.len(), input.len());
    for c in 0..input.channels {
        let in_base = c * input.spatial_len();
        let out_base = c * output.spatial_len();
        for oy in 0..output.height {
            for ox in 0..output.width {
                let mut best_idx = in_base + (oy * stride) * input.width + ox * stride;
                let mut best = image[best_idx];
                for ky in 0..k {
                    for kx in 0..k {
                        let idx = in_base + (oy * stride + ky) * input.width + ox * stride + kx;
                        if image[idx] > best {
                            best = image[idx];
                            best_idx = idx;
                        }
                    }
                }
                f(out_base + oy * output.width + ox, best_idx);
            }
        }
    }
}

/// numerically stable `ln(sum(exp(x)))`
pub fn log_sum_exp<T: DTypeFloat>(a: &[T]) -> T {
    let max = a.iter().copied().fold(T::neg_infinity(), T::max);
    if max == T::neg_infinity() {
        return max;
    }
    let sum = a.iter().fold(T::ZERO, |sum, &x| sum + (x - max).exp());
    max + sum.ln()
}

pub trait DTypeOps: DTypeFloat {
    /// `c = alpha * op(a) * op(b) + beta * c`
    fn matrix_multiply<A, B, C>(alpha: Self, a: &A, ta: bool, b: &B, tb: bool, beta: Self, c: &mut C)
    where
        A: TensorBase<Self, Dim2>,
        B: TensorBase<Self, Dim2>,
        C: TensorBaseMut<Self, Dim2>;
}

macro_rules! implement_dtype_ops {
    ($t: ident, $g: ident) => {
        impl DTypeOps for $t {
            fn matrix_multiply<A, B, C>(alpha: Self, a: &A, ta: bool, b: &B, tb: bool, beta: Self, c: &mut C)
            where
                A: TensorBase<Self, Dim2>,
                B: TensorBase<Self, Dim2>,
                C: TensorBaseMut<Self, Dim2>,
            {
                let &Dim2(a_rows, a_cols) = a.dims();
                let &Dim2(b_rows, b_cols) = b.dims();
                let (m, k, rsa, csa) = if ta {
                    (a_cols, a_rows, 1, a_cols as isize)
                } else {
                    (a_rows, a_cols, a_cols as isize, 1)
                };
                let (n, rsb, csb) = if tb {
                    assert_eq!(b_cols, k, "inner dimensions differ");
                    (b_rows, 1, b_cols as isize)
                } else {
                    assert_eq!(b_rows, k, "inner dimensions differ");
                    (b_cols, b_cols as isize, 1)
                };
                assert_eq!(c.dims(), &Dim2(m, n), "invalid dimensions for result matrix");
                if m == 0 || n == 0 {
                    return;
                }
                unsafe {
                    matrixmultiply::$g(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ref().as_ptr(),
                        rsa,
                        csa,
                        b.as_ref().as_ptr(),
                        rsb,
                        csb,
                        beta,
                        c.as_mut().as_mut_ptr(),
                        n as isize,
                        1,
                    );
                }
            }
        }
    };
}

implement_dtype_ops!(f32, sgemm);
implement_dtype_ops!(f64, dgemm);

#[cfg(test)]
mod test {
    use super::*;
    use crate::shape::FeatureShape;
    use crate::tensor::Tensor;

    macro_rules! assert_slice_equal {
        ($a:ident, $b:expr) => {{
            let b = $b;
            let a = $a.as_ref();
            if a.len() != b.len() || !std::iter::zip(a, &b).all(|(&i, &j)| (i - j).abs() <= f32::EPSILON) {
                let mismatch: Vec<usize> = std::iter::zip(a, &b)
                    .enumerate()
                    .filter(|&(_, (&i, &j))| (i - j).abs() > f32::EPSILON)
                    .map(|(idx, _)| idx)
                    .collect();
                panic!(
                    "slices not equal: left={:?}, right={:?}, mismatched indexes={:?}",
                    a, &b, &mismatch
                );
            }
        }};
    }

    #[test]
    fn test_mat_mul() {
        let a = Tensor::from_vec(vec![1., 2., 3., 4., 5., 6.], Dim2(2, 3));
        let b = Tensor::from_vec(vec![7., 8., 9., 10., 11., 12.], Dim2(3, 2));
        let c = Tensor::from_vec(vec![0.5, 1., 1., 0.25], Dim2(2, 2));

        let mut r2x2 = Tensor::filled(0f32, Dim2(2, 2));
        let mut r2x3 = Tensor::filled(0f32, Dim2(2, 3));
        let mut r3x2 = Tensor::filled(0f32, Dim2(3, 2));
        let mut r3x3 = Tensor::filled(0f32, Dim2(3, 3));

        // various combinations of A X B

        r2x2.fill(100.); // existing values should be ignored
        f32::matrix_multiply(1.0, &a, false, &b, false, 0.0, &mut r2x2);
        assert_slice_equal!(r2x2, [58., 64., 139., 154.]);

        r2x2.fill(0.);
        f32::matrix_multiply(0.5, &a, false, &b, false, 0.0, &mut r2x2);
        assert_slice_equal!(r2x2, [29., 32., 69.5, 77.]);

        r2x2.fill(1.);
        f32::matrix_multiply(1.0, &a, false, &b, false, 5.0, &mut r2x2);
        assert_slice_equal!(r2x2, [63., 69., 144., 159.]);

        // B X A

        r3x3.fill(100.);
        f32::matrix_multiply(1.0, &b, false, &a, false, 0.0, &mut r3x3);
        assert_slice_equal!(r3x3, [39., 54., 69., 49., 68., 87., 59., 82., 105.]);

        // C X Bt

        r2x3.fill(100.);
        f32::matrix_multiply(1.0, &c, false, &b, true, 0.0, &mut r2x3);
        assert_slice_equal!(r2x3, [11.5, 14.5, 17.5, 9., 11.5, 14.]);

        // At X C

        r3x2.fill(100.);
        f32::matrix_multiply(1.0, &a, true, &c, false, 0.0, &mut r3x2);
        assert_slice_equal!(r3x2, [4.5, 2., 6., 3.25, 7.5, 4.5]);
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), 1);
        assert_eq!(argmax::<f32>(&[]), 0);
    }

    #[test]
    fn test_im2col_padding() {
        // 1 channel 2x2 image, 2x2 kernel, padding 1 -> 3x3 output
        let geom = Conv2dGeometry::new(FeatureShape::new(1, 2, 2), 1, 2, 1, 1).unwrap();
        let image = [1.0f32, 2.0, 3.0, 4.0];
        let mut cols = vec![0.0f32; 4 * 9];
        im2col(&geom, &image, &mut cols);
        // kernel position (0, 0) sees the image shifted down-right by the padding
        assert_eq!(&cols[0..9], &[0., 0., 0., 0., 1., 2., 0., 3., 4.]);
        // kernel position (1, 1)
        assert_eq!(&cols[27..36], &[1., 2., 0., 3., 4., 0., 0., 0., 0.]);
    }

    #[test]
    fn test_col2im_counts_overlaps() {
        let geom = Conv2dGeometry::new(FeatureShape::new(1, 3, 3), 1, 2, 1, 0).unwrap();
        let cols = vec![1.0f32; geom.patch_len() * geom.output.spatial_len()];
        let mut image = vec![0.0f32; 9];
        col2im(&geom, &cols, &mut image);
        // number of 2x2 windows covering each pixel of a 3x3 image
        assert_eq!(image, vec![1., 2., 1., 2., 4., 2., 1., 2., 1.]);
    }

    #[test]
    fn test_pool_max_positions() {
        let geom = Pool2dGeometry::new(FeatureShape::new(1, 2, 4), 2, 2).unwrap();
        let image = [1.0f32, 5.0, 0.0, 0.0, 3.0, 2.0, 0.0, 0.0];
        let mut found = Vec::new();
        for_each_pool_max(&geom, &image, |o, i| found.push((o, i)));
        // ties keep the first element of the window
        assert_eq!(found, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_log_sum_exp() {
        let x = [1000.0f64, 1000.0];
        assert!((log_sum_exp(&x) - (1000.0 + 2f64.ln())).abs() < 1e-9);
    }
}
