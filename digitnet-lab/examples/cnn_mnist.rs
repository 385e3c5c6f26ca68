use anyhow::{Context, Result};
use clap::Parser;
use digitnet::backend::CpuBackend;
use digitnet::data::Dataset;
use digitnet::net::initializer::RandomNetInitializer;
use digitnet::net::{LayerTrace, Net};
use digitnet::train::{self, TrainConfig};
use digitnet_lab::config::LabArgs;
use digitnet_lab::data::{MnistData, available_samples, load_mnist};
use digitnet_lab::models::{CnnParams, build_cnn, feature_map_rows};
use digitnet_lab::plot;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

type Backend = CpuBackend<f32>;

/// Trains a small CNN on downsized MNIST digits and plots its kernels and activations.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    lab: LabArgs,

    /// Side of the square images fed to the network
    #[arg(long, default_value_t = 16)]
    image_size: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let Cli { lab, image_size } = Cli::parse();
    let config = lab.train_config(TrainConfig {
        epochs: 3,
        batch_size: 100,
        validation_batch_size: 5000,
        learn_rate: 0.1,
        ..TrainConfig::default()
    })?;

    let MnistData { train, test } = load_mnist::<f32>(&lab.data_dir, lab.train_len, lab.test_len)?;
    let train = train
        .resized(image_size, image_size)
        .context("invalid --image-size")?;
    let validation = test
        .resized(image_size, image_size)
        .context("invalid --image-size")?;
    for index in available_samples(&train, &[3]) {
        info!("fourth training sample is a {}", train.label(index));
        save_sample(&lab, &train, index, "train")?;
    }

    let params = CnnParams {
        image_size,
        ..CnnParams::default()
    };
    let mut net = build_cnn(Backend::new(), params, RandomNetInitializer::seed_from_u64(lab.seed))?;

    plot_kernels(&lab, &net, params, "before")?;

    let mut rng = StdRng::seed_from_u64(lab.seed);
    let history = train::fit(&mut net, &mut rng, &train, &validation, &config, |_| {})?;
    plot::write_chart(&plot::cost_accuracy_chart(&history), &lab.out_path("cost_accuracy.txt"))?;
    plot::write_json(&history, &lab.out_path("history.json"))?;

    let kernels = net.kernels(0).context("first layer is not a convolution")?;
    plot::plot_channels(&kernels, &lab.out_path("conv1_channels.png"))?;
    let kernels = net.kernels(2).context("third layer is not a convolution")?;
    plot::plot_channels(&kernels, &lab.out_path("conv2_channels.png"))?;

    for index in available_samples(&train, &[1, 2]) {
        save_sample(&lab, &train, index, "train")?;
        let trace = net.trace(&train.sample_input(index));
        plot_trace(&lab, &trace, index, params)?;
    }

    let wrong = train::misclassified(&mut net, &validation, config.validation_batch_size, 5)?;
    for m in &wrong {
        info!("validation sample {} is a {} but was classified as {}", m.index, m.label, m.predicted);
        let name = format!("misclassified_{}_y{}_yhat{}.png", m.index, m.label, m.predicted);
        plot::save_sample(validation.image(m.index), &lab.out_path(&name))?;
    }

    let scorer = train::evaluate(&mut net, &validation, config.validation_batch_size)?;
    scorer.log_report(net.backend());
    Ok(())
}

fn save_sample(lab: &LabArgs, data: &Dataset<f32>, index: usize, set: &str) -> Result<()> {
    let name = format!("{set}_{index}_y{}.png", data.label(index));
    plot::save_sample(data.image(index), &lab.out_path(&name))
}

fn plot_kernels(lab: &LabArgs, net: &Net<Backend>, params: CnnParams, stage: &str) -> Result<()> {
    let kernels = net.kernels(0).context("first layer is not a convolution")?;
    plot::plot_parameters(&kernels, 0, 4, &lab.out_path(&format!("conv1_kernels_{stage}.png")))?;
    let kernels = net.kernels(2).context("third layer is not a convolution")?;
    let rows = (params.out_2 / 8).max(1);
    plot::plot_parameters(&kernels, 0, rows, &lab.out_path(&format!("conv2_kernels_{stage}.png")))
}

/// conv outputs before and after ReLU for both convolutions
fn plot_trace(lab: &LabArgs, trace: &[LayerTrace<f32>], index: usize, params: CnnParams) -> Result<()> {
    for (layer_idx, name, channels) in params.conv_layers() {
        let layer = trace.get(layer_idx).context("trace is missing a layer")?;
        let (rows, relu_rows) = feature_map_rows(channels);
        plot::plot_activations(
            layer.pre_activation.as_ref(),
            layer.shape,
            rows,
            &lab.out_path(&format!("sample_{index}_{name}.png")),
        )?;
        plot::plot_activations(
            layer.output.as_ref(),
            layer.shape,
            relu_rows,
            &lab.out_path(&format!("sample_{index}_{name}_relu.png")),
        )?;
    }
    Ok(())
}
