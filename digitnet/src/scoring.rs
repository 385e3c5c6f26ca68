use crate::backend::Backend;
use crate::dtype::DType;
use crate::net::Net;
use crate::tensor::{Dim2, ITensor, Tensor2, TensorBaseMut};
use log::info;

pub trait Scorer<B: Backend> {
    fn process_batch(&mut self, backend: &B, output: &B::Tensor<Dim2>, expected: &B::Tensor<Dim2>);
}

/// Accumulates a confusion matrix with rows indexed by the expected class and columns by
/// the predicted (argmax) class.
pub struct MulticlassScorer<B: Backend> {
    matrix: B::Tensor<Dim2>,
    count: usize,
}

impl<B: Backend> MulticlassScorer<B> {
    pub fn new(backend: &B, num_classes: usize) -> Self {
        let matrix = backend.new_tensor_exact(Dim2(num_classes, num_classes));
        MulticlassScorer { matrix, count: 0 }
    }

    pub fn for_net(net: &Net<B>) -> Self {
        Self::new(net.backend(), net.output_size())
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn confusion_matrix(&self, backend: &B) -> Tensor2<usize> {
        let matrix = backend.tensor_as_native(&self.matrix);
        let dims = *matrix.dims();
        Tensor2::from_vec(matrix.into_iter().map(|x| x.as_usize()).collect(), dims)
    }

    pub fn correct(&self, backend: &B) -> usize {
        let matrix = backend.tensor_as_native(&self.matrix);
        let size = matrix.dims().rows();
        (0..size).map(|i| matrix[[i, i]].as_usize()).sum()
    }

    /// fraction of correctly classified samples, zero before any batch was processed
    pub fn accuracy(&self, backend: &B) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.correct(backend) as f64 / self.count as f64
    }

    pub fn error_rate(&self, backend: &B) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        1.0 - self.accuracy(backend)
    }

    pub fn log_report(&self, backend: &B) {
        let mut matrix = backend.tensor_as_native(&self.matrix);
        let count = self.count;
        let mut total_correct = 0;
        for (i, mut row) in matrix.iter_major_axis_mut().enumerate() {
            let row = row.as_mut();
            total_correct += row[i].as_usize();
            let total = B::Float::from_usize(row.iter().map(|e| e.as_usize()).sum());
            if total > B::Float::ZERO {
                row.iter_mut().for_each(|e| *e /= total);
            }
        }
        let total_incorrect = count - total_correct;
        let percent_incorrect = if count == 0 {
            0.0
        } else {
            (total_incorrect as f64 / count as f64) * 100.0
        };
        info!("Confusion Matrix: {matrix:.3?}");
        info!("Error rate: {percent_incorrect:.2}% ({total_incorrect}/{count})");
    }
}

impl<B: Backend> Scorer<B> for MulticlassScorer<B> {
    fn process_batch(&mut self, backend: &B, output: &B::Tensor<Dim2>, expected: &B::Tensor<Dim2>) {
        self.count += output.dims().rows();
        backend.accum_confusion_matrix_multiclass(&mut self.matrix, output, expected);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::tensor;

    #[test]
    fn test_accuracy() {
        let backend = CpuBackend::<f32>::new();
        let mut scorer = MulticlassScorer::new(&backend, 3);
        assert_eq!(scorer.accuracy(&backend), 0.0);
        let output: Tensor2<f32> = tensor![[0.1, 0.8, 0.1], [0.7, 0.2, 0.1], [0.0, 0.1, 0.9], [0.3, 0.3, 0.4]];
        let expected: Tensor2<f32> = tensor![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        scorer.process_batch(&backend, &output, &expected);
        assert_eq!(scorer.count(), 4);
        assert_eq!(scorer.correct(&backend), 2);
        assert_eq!(scorer.accuracy(&backend), 0.5);
        assert_eq!(scorer.error_rate(&backend), 0.5);
        let matrix = scorer.confusion_matrix(&backend);
        assert_eq!(matrix.as_ref(), &[1, 0, 1, 0, 1, 1, 0, 0, 0]);
        scorer.log_report(&backend);
    }
}
