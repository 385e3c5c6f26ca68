use crate::tensor::{Dim0, Dim1, Dim2, Dim3, Dim4, Dims, ITensor, Tensor, TensorBase, TensorBaseMut};
use std::slice::{Iter, IterMut};

pub struct TensorView<'a, T, D: Dims> {
    data: &'a [T],
    dims: D,
}

pub type TensorView0<'a, T> = TensorView<'a, T, Dim0>;
pub type TensorView1<'a, T> = TensorView<'a, T, Dim1>;
pub type TensorView2<'a, T> = TensorView<'a, T, Dim2>;
pub type TensorView3<'a, T> = TensorView<'a, T, Dim3>;
pub type TensorView4<'a, T> = TensorView<'a, T, Dim4>;

impl<'a, T, D: Dims> TensorView<'a, T, D> {
    pub fn from_slice(data: &'a [T], dims: D) -> Self {
        assert_eq!(
            data.len(),
            dims.tensor_len(),
            "Mismatched data length {} and dimension {}",
            data.len(),
            dims
        );
        TensorView { data, dims }
    }

    #[inline]
    pub(crate) fn from_slice_unchecked(data: &'a [T], dims: D) -> Self {
        debug_assert_eq!(data.len(), dims.tensor_len());
        TensorView { data, dims }
    }

    /// the underlying slice, with the lifetime of the borrowed tensor
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    #[inline]
    pub fn iter(&self) -> Iter<'a, T> {
        self.data.iter()
    }
}

impl<T, D: Dims> Clone for TensorView<'_, T, D> {
    fn clone(&self) -> Self {
        TensorView {
            data: self.data,
            dims: self.dims,
        }
    }
}

impl<T, D: Dims> Copy for TensorView<'_, T, D> {}

impl<T, D: Dims> ITensor<D> for TensorView<'_, T, D> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    fn dims(&self) -> &D {
        &self.dims
    }
}

impl<T, D: Dims> AsRef<[T]> for TensorView<'_, T, D> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.data
    }
}

impl<T, D: Dims> TensorBase<T, D> for TensorView<'_, T, D> {
    #[inline]
    fn is_owned(&self) -> bool {
        false
    }
    fn into_owned(self) -> Tensor<T, D>
    where
        T: Clone,
    {
        Tensor::from_vec(self.data.to_vec(), self.dims)
    }
    fn into_vec(self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.to_vec()
    }
}

impl<'a, T, D: Dims> IntoIterator for TensorView<'a, T, D> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<'a, T, D: Dims> IntoIterator for &TensorView<'a, T, D> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

pub struct TensorViewMut<'a, T, D: Dims> {
    data: &'a mut [T],
    dims: D,
}

pub type TensorViewMut1<'a, T> = TensorViewMut<'a, T, Dim1>;
pub type TensorViewMut2<'a, T> = TensorViewMut<'a, T, Dim2>;

impl<'a, T, D: Dims> TensorViewMut<'a, T, D> {
    pub fn from_slice(data: &'a mut [T], dims: D) -> Self {
        assert_eq!(
            data.len(),
            dims.tensor_len(),
            "Mismatched data length {} and dimension {}",
            data.len(),
            dims
        );
        TensorViewMut { data, dims }
    }

    #[inline]
    pub(crate) fn from_slice_unchecked(data: &'a mut [T], dims: D) -> Self {
        debug_assert_eq!(data.len(), dims.tensor_len());
        TensorViewMut { data, dims }
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        self.data.iter_mut()
    }
}

impl<T, D: Dims> ITensor<D> for TensorViewMut<'_, T, D> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    fn dims(&self) -> &D {
        &self.dims
    }
}

impl<T, D: Dims> AsRef<[T]> for TensorViewMut<'_, T, D> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        &*self.data
    }
}

impl<T, D: Dims> AsMut<[T]> for TensorViewMut<'_, T, D> {
    #[inline]
    fn as_mut(&mut self) -> &mut [T] {
        &mut *self.data
    }
}

impl<T, D: Dims> TensorBase<T, D> for TensorViewMut<'_, T, D> {
    #[inline]
    fn is_owned(&self) -> bool {
        false
    }
    fn into_owned(self) -> Tensor<T, D>
    where
        T: Clone,
    {
        Tensor::from_vec(self.data.to_vec(), self.dims)
    }
    fn into_vec(self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.to_vec()
    }
}

impl<T, D: Dims> TensorBaseMut<T, D> for TensorViewMut<'_, T, D> {}

impl<'a, T, D: Dims> IntoIterator for TensorViewMut<'a, T, D> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter_mut()
    }
}
