use crate::tensor::{Dim1, Dim2, Dims, ITensor, Tensor, TensorIter, TensorIterMut, TensorView, TensorViewMut};

pub trait TensorBase<T, D: Dims>: ITensor<D> + AsRef<[T]> {
    fn is_owned(&self) -> bool;
    fn into_owned(self) -> Tensor<T, D>
    where
        T: Clone;
    fn into_vec(self) -> Vec<T>
    where
        T: Clone;

    #[inline]
    fn view(&self) -> TensorView<'_, T, D> {
        TensorView::from_slice_unchecked(self.as_ref(), *self.dims())
    }

    #[inline]
    fn iter_major_axis(&self) -> TensorIter<'_, T, D::Less> {
        TensorIter::new_unchecked(self.as_ref(), self.dims().major(), self.dims().remove_major())
    }

    #[inline]
    fn as_1d(&self) -> TensorView<'_, T, Dim1> {
        TensorView::from_slice_unchecked(self.as_ref(), Dim1(self.len()))
    }

    #[inline]
    fn as_row_matrix(&self) -> TensorView<'_, T, Dim2> {
        TensorView::from_slice_unchecked(self.as_ref(), Dim2(1, self.len()))
    }

    #[inline]
    fn as_col_matrix(&self) -> TensorView<'_, T, Dim2> {
        TensorView::from_slice_unchecked(self.as_ref(), Dim2(self.len(), 1))
    }

    /// reinterprets the tensor data with new dims of the same length
    fn reshape<D2: Dims>(&self, dims: D2) -> TensorView<'_, T, D2> {
        TensorView::from_slice(self.as_ref(), dims)
    }

    /// returns the (min, max) of all elements, or `None` for an empty tensor
    fn value_range(&self) -> Option<(T, T)>
    where
        T: Copy + PartialOrd,
    {
        let mut iter = self.as_ref().iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), x| {
            (if x < min { x } else { min }, if x > max { x } else { max })
        }))
    }
}

pub trait TensorBaseMut<T, D: Dims>: TensorBase<T, D> + AsMut<[T]> {
    #[inline]
    fn view_mut(&mut self) -> TensorViewMut<'_, T, D> {
        let dims = *self.dims();
        TensorViewMut::from_slice_unchecked(self.as_mut(), dims)
    }

    #[inline]
    fn iter_major_axis_mut(&mut self) -> TensorIterMut<'_, T, D::Less> {
        let dims = *self.dims();
        TensorIterMut::new_unchecked(self.as_mut(), dims.major(), dims.remove_major())
    }

    #[inline]
    fn as_row_matrix_mut(&mut self) -> TensorViewMut<'_, T, Dim2> {
        let dims = Dim2(1, self.len());
        TensorViewMut::from_slice_unchecked(self.as_mut(), dims)
    }

    fn reshape_mut<D2: Dims>(&mut self, dims: D2) -> TensorViewMut<'_, T, D2> {
        TensorViewMut::from_slice(self.as_mut(), dims)
    }
}
