use anyhow::{Context, Result, bail, ensure};
use digitnet::data::Dataset;
use digitnet::dtype::DType;
use digitnet::shape::FeatureShape;
use digitnet::tensor::{Dim2, Tensor2};
use log::{info, warn};
use std::path::Path;

pub const IMAGE_SIDE: usize = 28;
pub const NUM_CLASSES: usize = 10;
pub const TRAIN_MAX: usize = 60_000;
pub const TEST_MAX: usize = 10_000;

/// The uncompressed IDX files expected in the data directory.
pub const MNIST_FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

pub struct MnistData<T> {
    pub train: Dataset<T>,
    pub test: Dataset<T>,
}

/// Loads the first `train_len` training and `test_len` test images from `dir`, with pixels
/// scaled to `[0, 1]`.
pub fn load_mnist<T: DType>(dir: &Path, train_len: usize, test_len: usize) -> Result<MnistData<T>> {
    ensure!(
        (1..=TRAIN_MAX).contains(&train_len),
        "training set length must be between 1 and {TRAIN_MAX}, got {train_len}"
    );
    ensure!(
        (1..=TEST_MAX).contains(&test_len),
        "test set length must be between 1 and {TEST_MAX}, got {test_len}"
    );
    let missing: Vec<&str> = MNIST_FILES
        .iter()
        .copied()
        .filter(|name| !dir.join(name).is_file())
        .collect();
    if !missing.is_empty() {
        bail!(
            "MNIST files missing from '{}': {} (download and gunzip them first)",
            dir.display(),
            missing.join(", ")
        );
    }
    let base_path = dir
        .to_str()
        .with_context(|| format!("'{}' is not a valid UTF-8 path", dir.display()))?;

    let mnist = ::mnist::MnistBuilder::new()
        .base_path(base_path)
        .label_format_digit()
        .training_set_length(train_len as u32)
        .validation_set_length(0)
        .test_set_length(test_len as u32)
        .finalize();
    info!("loaded {train_len} training and {test_len} test images from '{}'", dir.display());

    Ok(MnistData {
        train: to_dataset(mnist.trn_img, mnist.trn_lbl).context("invalid training set")?,
        test: to_dataset(mnist.tst_img, mnist.tst_lbl).context("invalid test set")?,
    })
}

/// Builds a dataset of 28x28 single channel images from raw pixel bytes and digit labels.
pub fn to_dataset<T: DType>(pixels: Vec<u8>, labels: Vec<u8>) -> Result<Dataset<T>> {
    let image_len = IMAGE_SIDE * IMAGE_SIDE;
    ensure!(
        pixels.len() == labels.len() * image_len,
        "{} pixels do not make {} images of {image_len} pixels",
        pixels.len(),
        labels.len()
    );
    let count = labels.len();
    let images = Tensor2::from_vec(
        pixels.into_iter().map(|p| T::from_f64(p as f64 / 255.0)).collect(),
        Dim2(count, image_len),
    );
    let labels = labels.into_iter().map(usize::from).collect();
    let shape = FeatureShape::new(1, IMAGE_SIDE, IMAGE_SIDE);
    Ok(Dataset::new(images, labels, shape, NUM_CLASSES)?)
}

/// The entries of `wanted` that index a sample of `data`, in order.
pub fn available_samples<T: DType>(data: &Dataset<T>, wanted: &[usize]) -> Vec<usize> {
    let (present, skipped): (Vec<usize>, Vec<usize>) = wanted.iter().copied().partition(|&index| index < data.len());
    if !skipped.is_empty() {
        warn!("skipping samples {skipped:?}: the set only holds {} images", data.len());
    }
    present
}

#[cfg(test)]
mod test {
    use super::*;
    use digitnet::tensor::{ITensor, TensorBase};

    #[test]
    fn test_to_dataset_scales_pixels() {
        let mut pixels = vec![0u8; 2 * 784];
        pixels[0] = 255;
        pixels[784 + 1] = 51;
        let data: Dataset<f32> = to_dataset(pixels, vec![7, 2]).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.shape(), FeatureShape::new(1, 28, 28));
        assert_eq!(data.labels(), &[7, 2]);
        assert_eq!(data.images().dims(), &Dim2(2, 784));
        assert_eq!(data.image(0)[[0, 0, 0]], 1.0);
        assert_eq!(data.image(1)[[0, 0, 1]], 0.2);
        assert_eq!(data.images().value_range(), Some((0.0, 1.0)));
    }

    #[test]
    fn test_to_dataset_rejects_bad_input() {
        assert!(to_dataset::<f32>(vec![0; 100], vec![1]).is_err());
        let err = to_dataset::<f32>(vec![0; 784], vec![10]).unwrap_err();
        assert_eq!(err.to_string(), "label 10 of sample 0 is not below 10");
    }

    #[test]
    fn test_missing_files_are_named() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MNIST_FILES[0]), b"").unwrap();
        let err = load_mnist::<f32>(dir.path(), 100, 100).err().unwrap().to_string();
        assert!(!err.contains(MNIST_FILES[0]), "{err}");
        for name in &MNIST_FILES[1..] {
            assert!(err.contains(name), "{err}");
        }
    }

    #[test]
    fn test_available_samples() {
        let data: Dataset<f32> = to_dataset(vec![0; 3 * 784], vec![1, 2, 3]).unwrap();
        assert_eq!(available_samples(&data, &[1, 2]), vec![1, 2]);
        assert_eq!(available_samples(&data, &[3]), Vec::<usize>::new());
        assert_eq!(available_samples(&data, &[2, 5, 0]), vec![2, 0]);
    }

    #[test]
    fn test_lengths_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_mnist::<f32>(dir.path(), 0, 10).is_err());
        assert!(load_mnist::<f32>(dir.path(), 10, TEST_MAX + 1).is_err());
    }
}
