use anyhow::{Context, Result, ensure};
use digitnet::dtype::DType;
use digitnet::shape::FeatureShape;
use digitnet::tensor::{Dim2, Dim4, ITensor, Tensor4, TensorBase, TensorView, TensorView2, TensorView3};
use digitnet::train::TrainHistory;
use image::{GrayImage, Luma, Rgb, RgbImage};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;
use textplots::{Chart, Plot, Shape};

/// pixels per tensor element
const ZOOM: u32 = 8;
/// pixels between grid cells
const GAP: u32 = 2;
const BACKGROUND: Rgb<u8> = Rgb([200, 200, 200]);
const CHART_WIDTH: u32 = 160;
const CHART_HEIGHT: u32 = 48;

/// matplotlib's "seismic": dark blue, blue, white, red, dark red
const SEISMIC: [[f64; 3]; 5] = [
    [0.0, 0.0, 0.3],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.5, 0.0, 0.0],
];

/// Maps `t` in `[0, 1]` to the seismic colormap, values outside are clamped.
pub fn seismic(t: f64) -> Rgb<u8> {
    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    let pos = t * (SEISMIC.len() - 1) as f64;
    let lower = (pos.floor() as usize).min(SEISMIC.len() - 2);
    let frac = pos - lower as f64;
    let (a, b) = (SEISMIC[lower], SEISMIC[lower + 1]);
    Rgb(std::array::from_fn(|c| {
        ((a[c] + (b[c] - a[c]) * frac) * 255.0).round() as u8
    }))
}

/// Linear map from a shared value range onto `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ValueScale {
    pub min: f64,
    pub max: f64,
}

impl ValueScale {
    /// the range covering every cell, `None` if all cells are empty
    pub fn covering<T: DType>(cells: &[TensorView2<'_, T>]) -> Option<Self> {
        cells
            .iter()
            .filter_map(|cell| cell.value_range())
            .map(|(min, max)| (min.as_f64(), max.as_f64()))
            .reduce(|(a, b), (c, d)| (a.min(c), b.max(d)))
            .map(|(min, max)| ValueScale { min, max })
    }

    pub fn normalize(&self, value: f64) -> f64 {
        if self.max > self.min {
            (value - self.min) / (self.max - self.min)
        } else {
            0.5
        }
    }
}

/// Draws `cells` row-major into a `rows` x `cols` grid, coloured with one shared scale.
pub fn render_grid<T: DType>(cells: &[TensorView2<'_, T>], rows: usize, cols: usize) -> Result<RgbImage> {
    ensure!(!cells.is_empty(), "nothing to plot");
    ensure!(
        cells.len() <= rows * cols,
        "{} cells do not fit a {rows}x{cols} grid",
        cells.len()
    );
    let &Dim2(cell_h, cell_w) = cells[0].dims();
    ensure!(
        cells.iter().all(|c| c.dims() == &Dim2(cell_h, cell_w)),
        "grid cells differ in size"
    );
    let scale = ValueScale::covering(cells).context("grid cells are empty")?;
    let step_x = cell_w as u32 * ZOOM + GAP;
    let step_y = cell_h as u32 * ZOOM + GAP;
    let mut img = RgbImage::from_pixel(cols as u32 * step_x + GAP, rows as u32 * step_y + GAP, BACKGROUND);
    for (i, cell) in cells.iter().enumerate() {
        let x0 = GAP + (i % cols) as u32 * step_x;
        let y0 = GAP + (i / cols) as u32 * step_y;
        for y in 0..cell_h {
            for x in 0..cell_w {
                let color = seismic(scale.normalize(cell[[y, x]].as_f64()));
                for dy in 0..ZOOM {
                    for dx in 0..ZOOM {
                        img.put_pixel(x0 + x as u32 * ZOOM + dx, y0 + y as u32 * ZOOM + dy, color);
                    }
                }
            }
        }
    }
    Ok(img)
}

fn save_rgb(img: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("cannot create '{}'", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("cannot write '{}'", path.display()))?;
    info!("saved {}", path.display());
    Ok(())
}

/// every `(k, k)` kernel of `(out, in, k, k)` kernels, output channel major
fn kernel_views<T>(kernels: &Tensor4<T>) -> impl Iterator<Item = TensorView2<'_, T>> {
    let &Dim4(_, _, h, w) = kernels.dims();
    kernels
        .as_ref()
        .chunks_exact((h * w).max(1))
        .map(move |kernel| TensorView::from_slice(kernel, Dim2(h, w)))
}

/// Kernels of a convolution `(out, in, k, k)` with output channels as rows and input
/// channels as columns.
pub fn plot_channels<T: DType>(kernels: &Tensor4<T>, path: &Path) -> Result<()> {
    let &dims = kernels.dims();
    let cells: Vec<TensorView2<'_, T>> = kernel_views(kernels).collect();
    let img = render_grid(&cells, dims.0, dims.1)?;
    save_rgb(&img, path)
}

/// The kernels of every output channel applied to `input_channel`, laid out in
/// `number_rows` rows.
pub fn plot_parameters<T: DType>(
    kernels: &Tensor4<T>,
    input_channel: usize,
    number_rows: usize,
    path: &Path,
) -> Result<()> {
    let &dims = kernels.dims();
    ensure!(
        input_channel < dims.1,
        "input channel {input_channel} out of range, kernels have {}",
        dims.1
    );
    ensure!(number_rows > 0, "number of rows must be positive");
    let cells: Vec<TensorView2<'_, T>> = kernel_views(kernels).skip(input_channel).step_by(dims.1).collect();
    let img = render_grid(&cells, number_rows, cells.len().div_ceil(number_rows))?;
    save_rgb(&img, path)
}

/// Feature maps of one sample, `values` holding `shape.len()` values in CHW order.
pub fn plot_activations<T: DType>(values: &[T], shape: FeatureShape, number_rows: usize, path: &Path) -> Result<()> {
    ensure!(
        values.len() == shape.len(),
        "{} values do not match shape {shape}",
        values.len()
    );
    ensure!(!shape.is_empty(), "cannot plot an empty shape");
    ensure!(number_rows > 0, "number of rows must be positive");
    let cells: Vec<TensorView2<'_, T>> = values
        .chunks_exact(shape.spatial_len())
        .map(|map| TensorView::from_slice(map, Dim2(shape.height, shape.width)))
        .collect();
    let img = render_grid(&cells, number_rows, cells.len().div_ceil(number_rows))?;
    save_rgb(&img, path)
}

/// Saves the first channel of `image` in grayscale, black at 0 and white at 1.
pub fn save_sample<T: DType>(image: TensorView3<'_, T>, path: &Path) -> Result<()> {
    let channel = image.iter_major_axis().next().context("image has no channels")?;
    let &Dim2(h, w) = channel.dims();
    let img = GrayImage::from_fn(w as u32 * ZOOM, h as u32 * ZOOM, |x, y| {
        let value = channel[[(y / ZOOM) as usize, (x / ZOOM) as usize]].as_f64();
        Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    });
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("cannot create '{}'", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("cannot write '{}'", path.display()))?;
    info!("saved {}", path.display());
    Ok(())
}

fn points(values: &[f64]) -> Vec<(f32, f32)> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f32, v as f32))
        .collect()
}

/// Text line chart with one line per series, all sharing the x axis.
pub fn line_chart(title: &str, x_label: &str, series: &[(&str, &[f64])]) -> String {
    let len = series.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
    let xmax = len.saturating_sub(1).max(1) as f32;
    let shapes: Vec<Vec<(f32, f32)>> = series.iter().map(|(_, values)| points(values)).collect();
    let lines: Vec<Shape> = shapes.iter().map(|p| Shape::Lines(p)).collect();
    let mut chart = Chart::new(CHART_WIDTH, CHART_HEIGHT, 0.0, xmax);
    let chart = lines.iter().fold(&mut chart, |chart, line| chart.lineplot(line));
    chart.axis();
    chart.figures();
    let names: Vec<&str> = series.iter().map(|(name, _)| *name).collect();
    format!("{title} (x: {x_label}; series: {})\n{chart}\n", names.join(", "))
}

/// The cost and validation accuracy charts of a training run.
pub fn cost_accuracy_chart(history: &TrainHistory) -> String {
    let cost = line_chart("Cost", "epoch", &[("cost", history.epoch_costs.as_slice())]);
    let accuracy = line_chart("Accuracy", "epoch", &[("accuracy", history.validation_accuracy.as_slice())]);
    cost + "\n" + &accuracy
}

pub fn write_chart(chart: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("cannot create '{}'", parent.display()))?;
    }
    fs::write(path, chart).with_context(|| format!("cannot write '{}'", path.display()))?;
    info!("chart written to {}\n{chart}", path.display());
    Ok(())
}

pub fn write_json<S: Serialize>(value: &S, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("cannot create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("cannot write '{}'", path.display()))?;
    info!("saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use digitnet::tensor::{Dim3, Tensor, Tensor2};

    #[test]
    fn test_seismic_endpoints() {
        assert_eq!(seismic(0.0), Rgb([0, 0, (0.3f64 * 255.0).round() as u8]));
        assert_eq!(seismic(0.25), Rgb([0, 0, 255]));
        assert_eq!(seismic(0.5), Rgb([255, 255, 255]));
        assert_eq!(seismic(0.75), Rgb([255, 0, 0]));
        assert_eq!(seismic(1.0), Rgb([128, 0, 0]));
        assert_eq!(seismic(7.0), seismic(1.0));
        assert_eq!(seismic(f64::NAN), seismic(0.5));
    }

    #[test]
    fn test_shared_scale() {
        let a = Tensor2::from_vec(vec![-1.0f32, 0.0, 0.5, 0.25], Dim2(2, 2));
        let b = Tensor2::from_vec(vec![0.0f32, 3.0, 1.0, 1.0], Dim2(2, 2));
        let scale = ValueScale::covering(&[a.view(), b.view()]).unwrap();
        assert_eq!(scale, ValueScale { min: -1.0, max: 3.0 });
        assert_eq!(scale.normalize(1.0), 0.5);
        let flat = ValueScale { min: 2.0, max: 2.0 };
        assert_eq!(flat.normalize(2.0), 0.5);
    }

    #[test]
    fn test_render_grid_layout() {
        let low = Tensor2::filled(-1.0f64, Dim2(2, 3));
        let high = Tensor2::filled(1.0f64, Dim2(2, 3));
        let img = render_grid(&[low.view(), high.view(), low.view()], 2, 2).unwrap();
        assert_eq!(img.dimensions(), (2 * (3 * ZOOM + GAP) + GAP, 2 * (2 * ZOOM + GAP) + GAP));
        assert_eq!(*img.get_pixel(GAP, GAP), seismic(0.0));
        assert_eq!(*img.get_pixel(GAP + 3 * ZOOM + GAP, GAP), seismic(1.0));
        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
        // the unused fourth cell stays empty
        let (w, h) = img.dimensions();
        assert_eq!(*img.get_pixel(w - GAP - 1, h - GAP - 1), BACKGROUND);

        assert!(render_grid::<f64>(&[], 1, 1).is_err());
        assert!(render_grid(&[low.view(), high.view()], 1, 1).is_err());
    }

    #[test]
    fn test_kernel_plots() {
        let dir = tempfile::tempdir().unwrap();
        let kernels: Tensor4<f32> = Tensor::from_vec((0..2 * 3 * 5 * 5).map(|x| x as f32).collect(), Dim4(2, 3, 5, 5));
        let channels = dir.path().join("channels.png");
        plot_channels(&kernels, &channels).unwrap();
        let img = image::open(&channels).unwrap();
        assert_eq!(img.width(), 3 * (5 * ZOOM + GAP) + GAP);
        assert_eq!(img.height(), 2 * (5 * ZOOM + GAP) + GAP);

        let params = dir.path().join("nested").join("params.png");
        plot_parameters(&kernels, 2, 2, &params).unwrap();
        let img = image::open(&params).unwrap();
        assert_eq!(img.width(), 5 * ZOOM + 2 * GAP);
        assert_eq!(img.height(), 2 * (5 * ZOOM + GAP) + GAP);
        assert!(plot_parameters(&kernels, 3, 1, &params).is_err());
    }

    #[test]
    fn test_activation_and_sample_images() {
        let dir = tempfile::tempdir().unwrap();
        let shape = FeatureShape::new(4, 2, 2);
        let values: Vec<f64> = (0..16).map(|x| x as f64 - 8.0).collect();
        let path = dir.path().join("activations.png");
        plot_activations(&values, shape, 2, &path).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 2 * (2 * ZOOM + GAP) + GAP);
        assert!(plot_activations(&values[1..], shape, 2, &path).is_err());

        let pixels = Tensor::from_vec(vec![0.0f32, 1.0, 0.5, 1.0], Dim3(1, 2, 2));
        let path = dir.path().join("sample_y3.png");
        save_sample(pixels.view(), &path).unwrap();
        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (2 * ZOOM, 2 * ZOOM));
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(ZOOM, 0)[0], 255);
        assert_eq!(img.get_pixel(0, ZOOM)[0], 128);
    }

    #[test]
    fn test_charts_and_json() {
        let history = TrainHistory {
            batch_losses: vec![2.0, 1.5, 1.0, 0.8],
            epoch_costs: vec![3.5, 1.8],
            validation_accuracy: vec![0.6, 0.9],
        };
        let chart = cost_accuracy_chart(&history);
        assert!(chart.starts_with("Cost (x: epoch; series: cost)"));
        assert!(chart.contains("Accuracy (x: epoch; series: accuracy)"));
        let losses = line_chart(
            "Training loss",
            "iteration",
            &[("Xavier", &[2.0, 1.0, 0.5][..]), ("Default", &[2.5, 2.0, 1.5][..])],
        );
        assert!(losses.starts_with("Training loss (x: iteration; series: Xavier, Default)"));

        let dir = tempfile::tempdir().unwrap();
        let chart_path = dir.path().join("cost.txt");
        write_chart(&chart, &chart_path).unwrap();
        assert_eq!(fs::read_to_string(&chart_path).unwrap(), chart);

        let json_path = dir.path().join("history.json");
        write_json(&history, &json_path).unwrap();
        let read: TrainHistory = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(read, history);
    }
}
