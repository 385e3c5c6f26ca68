use crate::dtype::DType;
use crate::shape::FeatureShape;
use crate::tensor::{Dim2, ITensor, Tensor2, TensorView, TensorView3};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("{images} images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },
    #[error("images have {actual} values per sample, shape {shape} needs {}", .shape.len())]
    ShapeMismatch { shape: FeatureShape, actual: usize },
    #[error("label {label} of sample {index} is not below {num_classes}")]
    LabelOutOfRange { index: usize, label: usize, num_classes: usize },
    #[error("cannot resize images to {height}x{width}")]
    EmptyResize { height: usize, width: usize },
}

/// Labelled images stored as one `(len, C*H*W)` tensor.
#[derive(Clone, Debug)]
pub struct Dataset<T> {
    images: Tensor2<T>,
    labels: Vec<usize>,
    shape: FeatureShape,
    num_classes: usize,
}

/// One mini-batch: the stacked images and the one-hot encoded labels.
#[derive(Clone, Debug)]
pub struct Batch<T> {
    pub input: Tensor2<T>,
    pub expected: Tensor2<T>,
    pub labels: Vec<usize>,
    pub indices: Vec<usize>,
}

impl<T: DType> Dataset<T> {
    pub fn new(
        images: Tensor2<T>,
        labels: Vec<usize>,
        shape: FeatureShape,
        num_classes: usize,
    ) -> Result<Self, DatasetError> {
        let &Dim2(rows, cols) = images.dims();
        if rows != labels.len() {
            return Err(DatasetError::LengthMismatch {
                images: rows,
                labels: labels.len(),
            });
        }
        if cols != shape.len() {
            return Err(DatasetError::ShapeMismatch { shape, actual: cols });
        }
        if let Some((index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= num_classes) {
            return Err(DatasetError::LabelOutOfRange {
                index,
                label,
                num_classes,
            });
        }
        Ok(Dataset {
            images,
            labels,
            shape,
            num_classes,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn shape(&self) -> FeatureShape {
        self.shape
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[inline]
    pub fn images(&self) -> &Tensor2<T> {
        &self.images
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[inline]
    pub fn label(&self, index: usize) -> usize {
        self.labels[index]
    }

    fn sample(&self, index: usize) -> &[T] {
        let size = self.shape.len();
        &self.images.as_ref()[index * size..(index + 1) * size]
    }

    /// image `index` as `(channels, height, width)`
    pub fn image(&self, index: usize) -> TensorView3<'_, T> {
        TensorView::from_slice(self.sample(index), self.shape.as_dims())
    }

    /// image `index` as a single row network input
    pub fn sample_input(&self, index: usize) -> Tensor2<T> {
        Tensor2::from_vec(self.sample(index).to_vec(), Dim2(1, self.shape.len()))
    }

    /// the first `count` samples
    pub fn take(&self, count: usize) -> Self {
        let count = count.min(self.len());
        let size = self.shape.len();
        Dataset {
            images: Tensor2::from_vec(self.images.as_ref()[..count * size].to_vec(), Dim2(count, size)),
            labels: self.labels[..count].to_vec(),
            shape: self.shape,
            num_classes: self.num_classes,
        }
    }

    /// Resamples every image to `height` x `width` by averaging the covered source area.
    pub fn resized(&self, height: usize, width: usize) -> Result<Self, DatasetError> {
        if height == 0 || width == 0 {
            return Err(DatasetError::EmptyResize { height, width });
        }
        let src = self.shape;
        let dst = FeatureShape::new(src.channels, height, width);
        if src == dst {
            return Ok(self.clone());
        }
        let rows = resample_weights(src.height, height);
        let cols = resample_weights(src.width, width);
        let area = (src.height as f64 / height as f64) * (src.width as f64 / width as f64);
        let mut data = Vec::with_capacity(self.len() * dst.len());
        for index in 0..self.len() {
            let sample = self.sample(index);
            for channel in sample.chunks_exact(src.spatial_len()) {
                for row_weights in rows.iter() {
                    for col_weights in cols.iter() {
                        let mut sum = 0.0;
                        for &(iy, wy) in row_weights {
                            for &(ix, wx) in col_weights {
                                sum += wy * wx * channel[iy * src.width + ix].as_f64();
                            }
                        }
                        data.push(T::from_f64(sum / area));
                    }
                }
            }
        }
        Ok(Dataset {
            images: Tensor2::from_vec(data, Dim2(self.len(), dst.len())),
            labels: self.labels.clone(),
            shape: dst,
            num_classes: self.num_classes,
        })
    }

    pub fn shuffled_order<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        order
    }

    #[inline]
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size)
    }

    /// Iterates over mini-batches in `order` (dataset order if `None`), the last batch may be
    /// smaller than `batch_size`.
    pub fn batches<'a>(&'a self, batch_size: usize, order: Option<&'a [usize]>) -> Batches<'a, T> {
        assert!(batch_size > 0, "batch size must be positive");
        if let Some(order) = order {
            assert_eq!(order.len(), self.len(), "order must cover every sample");
        }
        Batches {
            dataset: self,
            order,
            batch_size,
            pos: 0,
        }
    }

    fn make_batch(&self, indices: Vec<usize>) -> Batch<T> {
        let size = self.shape.len();
        let mut input = Vec::with_capacity(indices.len() * size);
        let mut expected = vec![T::ZERO; indices.len() * self.num_classes];
        let mut labels = Vec::with_capacity(indices.len());
        for (row, &index) in indices.iter().enumerate() {
            input.extend_from_slice(self.sample(index));
            let label = self.labels[index];
            expected[row * self.num_classes + label] = T::ONE;
            labels.push(label);
        }
        Batch {
            input: Tensor2::from_vec(input, Dim2(indices.len(), size)),
            expected: Tensor2::from_vec(expected, Dim2(indices.len(), self.num_classes)),
            labels,
            indices,
        }
    }
}

/// For every output cell, the source cells it covers and how much of each (in source units).
fn resample_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f64)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|o| {
            let start = o as f64 * scale;
            let end = (o + 1) as f64 * scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src);
            (first..last)
                .filter_map(|i| {
                    let overlap = end.min((i + 1) as f64) - start.max(i as f64);
                    (overlap > 1e-12).then_some((i, overlap))
                })
                .collect()
        })
        .collect()
}

pub struct Batches<'a, T> {
    dataset: &'a Dataset<T>,
    order: Option<&'a [usize]>,
    batch_size: usize,
    pos: usize,
}

impl<T: DType> Iterator for Batches<'_, T> {
    type Item = Batch<T>;

    fn next(&mut self) -> Option<Batch<T>> {
        let len = self.dataset.len();
        if self.pos >= len {
            return None;
        }
        let end = (self.pos + self.batch_size).min(len);
        let indices = match self.order {
            Some(order) => order[self.pos..end].to_vec(),
            None => (self.pos..end).collect(),
        };
        self.pos = end;
        Some(self.dataset.make_batch(indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.dataset.len() - self.pos).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl<T: DType> ExactSizeIterator for Batches<'_, T> {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor::TensorBase;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn counting(n: usize, shape: FeatureShape) -> Dataset<f32> {
        let data = (0..n * shape.len()).map(|x| x as f32).collect();
        Dataset::new(
            Tensor2::from_vec(data, Dim2(n, shape.len())),
            (0..n).map(|i| i % 3).collect(),
            shape,
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates() {
        let images = Tensor2::<f32>::zeroed(Dim2(2, 4));
        assert_eq!(
            Dataset::new(images.clone(), vec![0], FeatureShape::new(1, 2, 2), 10).unwrap_err(),
            DatasetError::LengthMismatch { images: 2, labels: 1 }
        );
        assert!(matches!(
            Dataset::new(images.clone(), vec![0, 1], FeatureShape::new(1, 3, 3), 10),
            Err(DatasetError::ShapeMismatch { actual: 4, .. })
        ));
        assert_eq!(
            Dataset::new(images, vec![0, 10], FeatureShape::new(1, 2, 2), 10)
                .unwrap_err()
                .to_string(),
            "label 10 of sample 1 is not below 10"
        );
    }

    #[test]
    fn test_image_view() {
        let data = counting(3, FeatureShape::new(1, 2, 2));
        let image = data.image(1);
        assert_eq!(image.as_ref(), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(data.label(2), 2);
        assert_eq!(data.sample_input(2).dims(), &Dim2(1, 4));
    }

    #[test]
    fn test_resize_halves_by_averaging() {
        let data = counting(1, FeatureShape::new(1, 4, 4));
        let resized = data.resized(2, 2).unwrap();
        assert_eq!(resized.shape(), FeatureShape::new(1, 2, 2));
        // mean of [0, 1, 4, 5], [2, 3, 6, 7], ...
        assert_eq!(resized.images().as_ref(), &[2.5, 4.5, 10.5, 12.5]);
    }

    #[test]
    fn test_resize_to_zero_size() {
        let data = counting(2, FeatureShape::new(1, 4, 4));
        assert_eq!(
            data.resized(0, 0).unwrap_err(),
            DatasetError::EmptyResize { height: 0, width: 0 }
        );
        assert_eq!(
            data.resized(3, 0).unwrap_err().to_string(),
            "cannot resize images to 3x0"
        );
        assert_eq!(data.resized(4, 4).unwrap().images(), data.images());
    }

    #[test]
    fn test_resize_preserves_mean() {
        let data = counting(2, FeatureShape::new(1, 28, 28));
        let resized = data.resized(16, 16).unwrap();
        assert_eq!(resized.images().dims(), &Dim2(2, 256));
        for (src, dst) in data.images().iter_major_axis().zip(resized.images().iter_major_axis()) {
            let src_mean = src.iter().map(|&x| x as f64).sum::<f64>() / 784.0;
            let dst_mean = dst.iter().map(|&x| x as f64).sum::<f64>() / 256.0;
            assert_abs_diff_eq!(src_mean, dst_mean, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_batches() {
        let data = counting(5, FeatureShape::flat(2));
        let batches: Vec<Batch<f32>> = data.batches(2, None).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(data.num_batches(2), 3);
        assert_eq!(batches[2].input.dims(), &Dim2(1, 2));
        assert_eq!(batches[0].input.as_ref(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(batches[0].expected.as_ref(), &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(batches[1].labels, vec![2, 0]);
    }

    #[test]
    fn test_shuffled_batches_cover_everything() {
        let data = counting(10, FeatureShape::flat(1));
        let order = data.shuffled_order(&mut StdRng::seed_from_u64(0));
        let mut seen: Vec<usize> = data.batches(4, Some(order.as_slice())).flat_map(|b| b.indices).collect();
        assert_eq!(seen, order);
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_take() {
        let data = counting(10, FeatureShape::flat(3));
        let head = data.take(4);
        assert_eq!(head.len(), 4);
        assert_eq!(head.images().dims(), &Dim2(4, 3));
        assert_eq!(data.take(100).len(), 10);
    }
}
