use anyhow::Result;
use clap::Parser;
use digitnet::backend::CpuBackend;
use digitnet::net::initializer::{InitStrategy, RandomNetInitializer};
use digitnet::train::{self, TrainConfig, TrainHistory};
use digitnet_lab::config::LabArgs;
use digitnet_lab::data::{MnistData, load_mnist};
use digitnet_lab::models::{MLP_LAYERS, build_mlp};
use digitnet_lab::plot;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

const STRATEGIES: [InitStrategy; 3] = [
    InitStrategy::Default,
    InitStrategy::XavierUniform,
    InitStrategy::UNIT_UNIFORM,
];

/// Compares default, Xavier and uniform weight initialization on a deep tanh MLP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    lab: LabArgs,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let Cli { lab } = Cli::parse();
    let config = lab.train_config(TrainConfig {
        epochs: 15,
        batch_size: 2000,
        validation_batch_size: 5000,
        learn_rate: 0.01,
        shuffle: true,
        ..TrainConfig::default()
    })?;
    let MnistData { train, test } = load_mnist::<f32>(&lab.data_dir, lab.train_len, lab.test_len)?;

    let mut results: Vec<(String, TrainHistory)> = Vec::with_capacity(STRATEGIES.len());
    for strategy in STRATEGIES {
        info!("training with {strategy} initialization");
        let initializer = RandomNetInitializer::seed_from_u64(lab.seed).with_strategy(strategy);
        let mut net = build_mlp(CpuBackend::<f32>::new(), &MLP_LAYERS, initializer)?;
        let mut rng = StdRng::seed_from_u64(lab.seed);
        let mut history = train::fit(&mut net, &mut rng, &train, &test, &config, |_| {})?;
        history.validation_accuracy.iter_mut().for_each(|a| *a *= 100.0);
        results.push((strategy.to_string(), history));
    }

    let losses: Vec<(&str, &[f64])> = results
        .iter()
        .map(|(name, h)| (name.as_str(), h.batch_losses.as_slice()))
        .collect();
    let chart = plot::line_chart("Training loss", "iteration", &losses);
    plot::write_chart(&chart, &lab.out_path("training_loss.txt"))?;

    let accuracy: Vec<(&str, &[f64])> = results
        .iter()
        .map(|(name, h)| (name.as_str(), h.validation_accuracy.as_slice()))
        .collect();
    let chart = plot::line_chart("Validation accuracy (%)", "epoch", &accuracy);
    plot::write_chart(&chart, &lab.out_path("validation_accuracy.txt"))?;

    for (name, history) in &results {
        let last = history.validation_accuracy.last().copied().unwrap_or(0.0);
        info!("{name}: final validation accuracy {last:.2}%");
    }
    let by_name: BTreeMap<&str, &TrainHistory> = results.iter().map(|(n, h)| (n.as_str(), h)).collect();
    plot::write_json(&by_name, &lab.out_path("initializations.json"))?;
    Ok(())
}
