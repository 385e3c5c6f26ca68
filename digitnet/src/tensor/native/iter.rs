use crate::tensor::{Dims, TensorView, TensorViewMut};

/// Iterates over the sub-tensors along the major axis of a tensor.
pub struct TensorIter<'a, T: 'a, D: Dims> {
    data: &'a [T],
    remaining: usize,
    out_dims: D,
}

impl<'a, T: 'a, D: Dims> TensorIter<'a, T, D> {
    pub(crate) fn new_unchecked(data: &'a [T], count: usize, out_dims: D) -> Self {
        debug_assert_eq!(data.len(), count * out_dims.tensor_len());
        TensorIter {
            data,
            remaining: count,
            out_dims,
        }
    }
}

impl<'a, T: 'a, D: Dims> Iterator for TensorIter<'a, T, D> {
    type Item = TensorView<'a, T, D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let data = self.data;
        let (head, tail) = data.split_at(self.out_dims.tensor_len());
        self.data = tail;
        self.remaining -= 1;
        Some(TensorView::from_slice_unchecked(head, self.out_dims))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        let data = self.data;
        if n >= self.remaining {
            self.data = &data[data.len()..];
            self.remaining = 0;
            return None;
        }
        self.data = &data[n * self.out_dims.tensor_len()..];
        self.remaining -= n;
        self.next()
    }
}

impl<'a, T: 'a, D: Dims> ExactSizeIterator for TensorIter<'a, T, D> {}

pub struct TensorIterMut<'a, T: 'a, D: Dims> {
    data: &'a mut [T],
    remaining: usize,
    out_dims: D,
}

impl<'a, T: 'a, D: Dims> TensorIterMut<'a, T, D> {
    pub(crate) fn new_unchecked(data: &'a mut [T], count: usize, out_dims: D) -> Self {
        debug_assert_eq!(data.len(), count * out_dims.tensor_len());
        TensorIterMut {
            data,
            remaining: count,
            out_dims,
        }
    }
}

impl<'a, T: 'a, D: Dims> Iterator for TensorIterMut<'a, T, D> {
    type Item = TensorViewMut<'a, T, D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let data = std::mem::take(&mut self.data);
        let (head, tail) = data.split_at_mut(self.out_dims.tensor_len());
        self.data = tail;
        self.remaining -= 1;
        Some(TensorViewMut::from_slice_unchecked(head, self.out_dims))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T: 'a, D: Dims> ExactSizeIterator for TensorIterMut<'a, T, D> {}

#[cfg(test)]
mod test {
    use crate::tensor;
    use crate::tensor::{Dim1, Dim2, ITensor, Tensor, TensorBase, TensorBaseMut};

    #[test]
    fn test_tensor_iter_2d() {
        let t = tensor![[1, 2, 3], [4, 5, 6]];
        let rows: Vec<Vec<i32>> = t.iter_major_axis().map(|r| r.as_ref().to_vec()).collect();
        assert_eq!(rows, vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(t.iter_major_axis().len(), 2);
        assert_eq!(t.iter_major_axis().next().map(|r| *r.dims()), Some(Dim1(3)));
    }

    #[test]
    fn test_tensor_iter_nth() {
        let t = Tensor::from_vec((0..12).collect::<Vec<i32>>(), Dim2(6, 2));
        let mut iter = t.iter_major_axis();
        assert_eq!(iter.nth(2).map(|r| r.as_ref().to_vec()), Some(vec![4, 5]));
        assert_eq!(iter.len(), 3);
        assert!(iter.nth(5).is_none());
        assert_eq!(iter.len(), 0);
    }

    #[test]
    fn test_tensor_iter_zero_width() {
        let t: Tensor<i32, Dim2> = Tensor::from_vec(vec![], Dim2(3, 0));
        assert_eq!(t.iter_major_axis().count(), 3);
    }

    #[test]
    fn test_tensor_iter_mut() {
        let mut t = tensor![[1, 2], [3, 4], [5, 6]];
        for (i, mut row) in t.iter_major_axis_mut().enumerate() {
            row.iter_mut().for_each(|x| *x *= i as i32);
        }
        assert_eq!(t.as_ref(), &[0, 0, 3, 4, 10, 12]);
    }
}
