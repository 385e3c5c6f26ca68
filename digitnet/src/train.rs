use crate::backend::Backend;
use crate::data::Dataset;
use crate::dtype::DType;
use crate::loss::LossFn;
use crate::net::Net;
use crate::scoring::MulticlassScorer;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_batch_size: usize,
    pub learn_rate: f64,
    pub momentum: f64,
    pub loss: LossFn,
    /// reshuffle the training set at the start of every epoch
    pub shuffle: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 3,
            batch_size: 100,
            validation_batch_size: 5000,
            learn_rate: 0.1,
            momentum: 0.0,
            loss: LossFn::CrossEntropy,
            shuffle: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrainError {
    #[error("dataset samples have {dataset} values but the network takes {net}")]
    InputSize { dataset: usize, net: usize },
    #[error("dataset has {dataset} classes but the network outputs {net}")]
    ClassCount { dataset: usize, net: usize },
    #[error("batch sizes must be positive")]
    ZeroBatchSize,
}

/// Losses and accuracies recorded by [`fit`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainHistory {
    /// mean loss of every training batch, in training order
    pub batch_losses: Vec<f64>,
    /// sum of the batch losses of each epoch
    pub epoch_costs: Vec<f64>,
    /// fraction of correctly classified validation samples after each epoch
    pub validation_accuracy: Vec<f64>,
}

#[derive(Copy, Clone, Debug)]
pub struct EpochSummary {
    /// 1-based
    pub epoch: usize,
    pub cost: f64,
    pub mean_loss: f64,
    pub validation_accuracy: f64,
    pub elapsed: Duration,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Misclassified {
    pub index: usize,
    pub label: usize,
    pub predicted: usize,
}

fn check_compatible<B: Backend>(net: &Net<B>, dataset: &Dataset<B::Float>) -> Result<(), TrainError> {
    if dataset.shape().len() != net.input_size() {
        return Err(TrainError::InputSize {
            dataset: dataset.shape().len(),
            net: net.input_size(),
        });
    }
    if dataset.num_classes() != net.output_size() {
        return Err(TrainError::ClassCount {
            dataset: dataset.num_classes(),
            net: net.output_size(),
        });
    }
    Ok(())
}

/// Trains `net` for `config.epochs` epochs of mini-batch gradient descent, evaluating on
/// `validation` after every epoch.
pub fn fit<B, R, F>(
    net: &mut Net<B>,
    rng: &mut R,
    train: &Dataset<B::Float>,
    validation: &Dataset<B::Float>,
    config: &TrainConfig,
    mut on_epoch: F,
) -> Result<TrainHistory, TrainError>
where
    B: Backend,
    R: Rng,
    F: FnMut(&EpochSummary),
{
    if config.batch_size == 0 || config.validation_batch_size == 0 {
        return Err(TrainError::ZeroBatchSize);
    }
    check_compatible(net, train)?;
    check_compatible(net, validation)?;

    let learn_rate = B::Float::from_f64(config.learn_rate);
    let momentum = B::Float::from_f64(config.momentum);
    let num_batches = train.num_batches(config.batch_size);
    let mut history = TrainHistory::default();
    info!(
        "training on {} samples ({num_batches} batches of {}) for {} epochs",
        train.len(),
        config.batch_size,
        config.epochs
    );

    for epoch in 1..=config.epochs {
        let start = Instant::now();
        let order = config.shuffle.then(|| train.shuffled_order(rng));
        let mut cost = 0.0;
        for (batch_idx, batch) in train.batches(config.batch_size, order.as_deref()).enumerate() {
            let backend = net.backend();
            let input = backend.new_tensor_from_native(batch.input);
            let expected = backend.new_tensor_from_native(batch.expected);
            let loss = net
                .train_batch(&input, &expected, &config.loss, learn_rate, momentum)
                .mean_loss();
            debug!("epoch {epoch} batch {}/{num_batches}: loss {loss:.5}", batch_idx + 1);
            history.batch_losses.push(loss);
            cost += loss;
        }
        let accuracy = evaluate(net, validation, config.validation_batch_size)?.accuracy(net.backend());
        let summary = EpochSummary {
            epoch,
            cost,
            mean_loss: if num_batches == 0 { 0.0 } else { cost / num_batches as f64 },
            validation_accuracy: accuracy,
            elapsed: start.elapsed(),
        };
        info!(
            "epoch {epoch}/{}: cost {cost:.4}, validation accuracy {:.2}% ({:.1}s)",
            config.epochs,
            accuracy * 100.0,
            summary.elapsed.as_secs_f64()
        );
        history.epoch_costs.push(cost);
        history.validation_accuracy.push(accuracy);
        on_epoch(&summary);
    }
    Ok(history)
}

pub fn evaluate<B: Backend>(
    net: &mut Net<B>,
    dataset: &Dataset<B::Float>,
    batch_size: usize,
) -> Result<MulticlassScorer<B>, TrainError> {
    if batch_size == 0 {
        return Err(TrainError::ZeroBatchSize);
    }
    check_compatible(net, dataset)?;
    let mut scorer = MulticlassScorer::for_net(net);
    for batch in dataset.batches(batch_size, None) {
        let backend = net.backend();
        let input = backend.new_tensor_from_native(batch.input);
        let expected = backend.new_tensor_from_native(batch.expected);
        net.evaluate(&input, &expected, &mut scorer);
    }
    Ok(scorer)
}

/// The first `limit` misclassified samples of `dataset`, in dataset order.
pub fn misclassified<B: Backend>(
    net: &mut Net<B>,
    dataset: &Dataset<B::Float>,
    batch_size: usize,
    limit: usize,
) -> Result<Vec<Misclassified>, TrainError> {
    if batch_size == 0 {
        return Err(TrainError::ZeroBatchSize);
    }
    check_compatible(net, dataset)?;
    let mut found = Vec::new();
    for batch in dataset.batches(batch_size, None) {
        if found.len() >= limit {
            break;
        }
        let input = net.backend().new_tensor_from_native(batch.input);
        let predictions = net.classify(&input);
        found.extend(
            batch
                .indices
                .iter()
                .zip(batch.labels.iter())
                .zip(predictions)
                .filter(|((_, label), predicted)| **label != *predicted)
                .map(|((&index, &label), predicted)| Misclassified {
                    index,
                    label,
                    predicted,
                }),
        );
    }
    found.truncate(limit);
    Ok(found)
}
