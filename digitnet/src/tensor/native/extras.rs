use crate::tensor::{Dim2, Dim3, Dim4, Dims, ITensor, Tensor, TensorView, TensorViewMut};
use std::ops::{Index, IndexMut};

macro_rules! impl_tensor_index {
    ($dims:ident, $n:literal, |$d:ident, $i:ident| $offset:expr) => {
        impl<T> Index<[usize; $n]> for Tensor<T, $dims> {
            type Output = T;
            #[inline]
            fn index(&self, $i: [usize; $n]) -> &T {
                let $d = self.dims();
                &self.as_ref()[$offset]
            }
        }

        impl<T> IndexMut<[usize; $n]> for Tensor<T, $dims> {
            #[inline]
            fn index_mut(&mut self, $i: [usize; $n]) -> &mut T {
                let $d = *self.dims();
                &mut self.as_mut()[$offset]
            }
        }

        impl<T> Index<[usize; $n]> for TensorView<'_, T, $dims> {
            type Output = T;
            #[inline]
            fn index(&self, $i: [usize; $n]) -> &T {
                let $d = self.dims();
                &self.as_ref()[$offset]
            }
        }
    };
}

impl_tensor_index!(Dim2, 2, |d, i| {
    debug_assert!(i[0] < d.0 && i[1] < d.1);
    i[0] * d.1 + i[1]
});
impl_tensor_index!(Dim3, 3, |d, i| {
    debug_assert!(i[0] < d.0 && i[1] < d.1 && i[2] < d.2);
    (i[0] * d.1 + i[1]) * d.2 + i[2]
});
impl_tensor_index!(Dim4, 4, |d, i| {
    debug_assert!(i[0] < d.0 && i[1] < d.1 && i[2] < d.2 && i[3] < d.3);
    ((i[0] * d.1 + i[1]) * d.2 + i[2]) * d.3 + i[3]
});

macro_rules! impl_tensor_eq {
    ($type_name: ident $(, $l: lifetime )?) => {
        impl<$($l,)? T: PartialEq, D: Dims> PartialEq<Tensor<T, D>> for $type_name<$($l,)? T, D> {
            fn eq(&self, other: &Tensor<T, D>) -> bool {
                self.dims() == other.dims() && self.as_ref() == other.as_ref()
            }
        }

        impl<$($l,)? 'b, T: PartialEq, D: Dims> PartialEq<TensorView<'b, T, D>> for $type_name<$($l,)? T, D> {
            fn eq(&self, other: &TensorView<'b, T, D>) -> bool {
                self.dims() == other.dims() && self.as_ref() == other.as_ref()
            }
        }

        impl<$($l,)? 'b, T: PartialEq, D: Dims> PartialEq<TensorViewMut<'b, T, D>> for $type_name<$($l,)? T, D> {
            fn eq(&self, other: &TensorViewMut<'b, T, D>) -> bool {
                self.dims() == other.dims() && self.as_ref() == other.as_ref()
            }
        }
    };
}

impl_tensor_eq!(Tensor);
impl_tensor_eq!(TensorView, 'a);
impl_tensor_eq!(TensorViewMut, 'a);

#[cfg(test)]
mod test {
    use crate::tensor;
    use crate::tensor::{Dim4, Tensor, Tensor2, TensorBase};

    #[test]
    fn test_index_2d() {
        let mut t: Tensor2<i32> = tensor![[1, 2, 3], [4, 5, 6]];
        assert_eq!(t[[1, 0]], 4);
        t[[0, 2]] += 10;
        assert_eq!(t.as_ref(), &[1, 2, 13, 4, 5, 6]);
    }

    #[test]
    fn test_index_4d() {
        let t = Tensor::from_vec((0..24).collect::<Vec<i32>>(), Dim4(2, 3, 2, 2));
        assert_eq!(t[[1, 2, 1, 0]], 12 + 8 + 2);
    }

    #[test]
    fn test_eq_view() {
        let a: Tensor2<i32> = tensor![[1, 2], [3, 4]];
        let b = a.clone();
        assert!(a == b);
        assert!(a.view() == b);
        assert!(b == a.view());
    }
}
