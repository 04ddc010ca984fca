//! Diagnostic plots of calibrated traces.
//!
//! Traces are rendered with plotters into PNG files. Text (title, axis
//! descriptions, tick labels) needs a TrueType font; one is registered at
//! first use from the configured path or a handful of common system
//! locations. Without a font the plots are still written, just unlabeled.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, warn};
use plotters::prelude::*;
use plotters::style::FontStyle;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::core::transforms::CalibratedSample;
use crate::core::writers::ensure_parent_dirs;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("failed to prepare output location: {0}")]
    Output(#[from] crate::core::writers::WriteError),

    #[error("Plotting error for '{path}': {message}")]
    PlottingError { path: PathBuf, message: String },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Line color of every trace (matplotlib's default blue).
const TRACE_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Marker radius for the zoomed plot, in pixels.
const MARKER_SIZE: u32 = 3;

const X_DESC: &str = "Time (ms)";
const Y_DESC: &str = "Displacement (nm)";

/// Font files probed when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How samples are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStyle {
    /// Thin continuous line.
    Line,
    /// Line with a marker on every sample.
    LineWithMarkers,
}

/// Register a sans-serif font once per process. Returns whether text can be drawn.
fn labels_available(config: &PlotConfig) -> bool {
    static FONT_READY: OnceLock<bool> = OnceLock::new();
    *FONT_READY.get_or_init(|| {
        let candidates = config
            .font_path
            .iter()
            .cloned()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // The font table keeps a 'static reference for the process lifetime.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if plotters::style::register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                debug!("Using plot font {}", path.display());
                return true;
            }
            warn!("Ignoring unusable font file {}", path.display());
        }

        warn!("No TrueType font found; plots will be written without titles or labels");
        false
    })
}

/// Plot displacement against time and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image (parent directories are created)
/// * `samples` - Samples to draw, in order; may be empty
/// * `title` - Plot title
/// * `style` - Continuous line or line with markers
/// * `config` - Raster size and font settings
pub fn plot_trace(
    output_path: &Path,
    samples: &[CalibratedSample],
    title: &str,
    style: TraceStyle,
    config: &PlotConfig,
) -> Result<()> {
    ensure_parent_dirs(output_path)?;

    let labels = labels_available(config);

    let (x_min, x_max, y_min, y_max) = compute_bounds(samples);
    let x_padding = (x_max - x_min) * 0.02;
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plotting_error(output_path, &e))?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if labels {
        builder
            .caption(title, ("sans-serif", 26))
            .x_label_area_size(50)
            .y_label_area_size(90);
    }

    let mut chart = builder
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| plotting_error(output_path, &e))?;

    // Without label areas the mesh draws grid lines only, no text.
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(RGBColor(235, 235, 235).stroke_width(1))
        .bold_line_style(RGBColor(200, 200, 200).stroke_width(1));
    if labels {
        mesh.x_desc(X_DESC)
            .y_desc(Y_DESC)
            .label_style(("sans-serif", 16));
    }
    mesh.draw().map_err(|e| plotting_error(output_path, &e))?;

    let points = samples.iter().map(|s| (s.time_ms, s.displacement_nm));

    chart
        .draw_series(LineSeries::new(points.clone(), TRACE_COLOR.stroke_width(1)))
        .map_err(|e| plotting_error(output_path, &e))?;

    if style == TraceStyle::LineWithMarkers {
        chart
            .draw_series(points.map(|(x, y)| Circle::new((x, y), MARKER_SIZE, TRACE_COLOR.filled())))
            .map_err(|e| plotting_error(output_path, &e))?;
    }

    root.present().map_err(|e| plotting_error(output_path, &e))?;

    Ok(())
}

fn plotting_error(path: &Path, e: &dyn std::fmt::Display) -> VisualizationError {
    VisualizationError::PlottingError {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Compute the bounds (min/max) of time and displacement.
///
/// Degenerate ranges (no samples, a single sample, flat traces) are widened
/// so the chart always has a non-empty coordinate span.
fn compute_bounds(samples: &[CalibratedSample]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for s in samples {
        if !(s.time_ms.is_finite() && s.displacement_nm.is_finite()) {
            continue;
        }
        x_min = x_min.min(s.time_ms);
        x_max = x_max.max(s.time_ms);
        y_min = y_min.min(s.displacement_nm);
        y_max = y_max.max(s.displacement_nm);
    }

    if x_min > x_max {
        return (0.0, 1.0, -1.0, 1.0);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}
