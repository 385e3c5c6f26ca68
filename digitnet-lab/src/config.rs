use crate::data::{TEST_MAX, TRAIN_MAX};
use anyhow::{Context, Result};
use clap::Args;
use digitnet::train::TrainConfig;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Options shared by the lab programs.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct LabArgs {
    /// Directory holding the four uncompressed MNIST IDX files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for plots, charts and training histories
    #[arg(long, default_value = "output")]
    pub out_dir: PathBuf,

    /// JSON file with training settings, the flags below take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub validation_batch_size: Option<usize>,

    #[arg(long)]
    pub learn_rate: Option<f64>,

    #[arg(long)]
    pub momentum: Option<f64>,

    /// Number of training images to load
    #[arg(long, default_value_t = TRAIN_MAX)]
    pub train_len: usize,

    /// Number of test images to load, used for validation
    #[arg(long, default_value_t = TEST_MAX)]
    pub test_len: usize,

    /// Seed for weight initialization and shuffling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl LabArgs {
    /// `defaults` overridden by the config file, then by command line flags.
    pub fn train_config(&self, defaults: TrainConfig) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => load_train_config(path, defaults)?,
            None => defaults,
        };
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(batch_size) = self.validation_batch_size {
            config.validation_batch_size = batch_size;
        }
        if let Some(learn_rate) = self.learn_rate {
            config.learn_rate = learn_rate;
        }
        if let Some(momentum) = self.momentum {
            config.momentum = momentum;
        }
        Ok(config)
    }

    pub fn out_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }
}

/// Reads a JSON object of training settings, fields it leaves out keep their value in
/// `defaults`.
pub fn load_train_config(path: &Path, defaults: TrainConfig) -> Result<TrainConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))?;
    let overrides: Map<String, Value> =
        serde_json::from_str(&text).with_context(|| format!("'{}' is not a JSON object", path.display()))?;
    let mut merged = serde_json::to_value(defaults)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    serde_json::from_value(merged).with_context(|| format!("invalid training settings in '{}'", path.display()))
}
