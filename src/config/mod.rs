//! Configuration types for the conversion pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, saving or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How raw displacement readings are referenced before the unit transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Convert raw readings as-is.
    Absolute,
    /// Subtract the first reading of each file before converting.
    #[default]
    Relative,
}

impl ConversionMode {
    /// Label used in artifact file names and plot titles.
    pub fn label(self) -> &'static str {
        match self {
            ConversionMode::Absolute => "absolute",
            ConversionMode::Relative => "relative",
        }
    }

    /// Header of the displacement column in the emitted CSV.
    pub fn column_header(self) -> &'static str {
        match self {
            ConversionMode::Absolute => "Absolute_Displacement_nm",
            ConversionMode::Relative => "Delta_Displacement_nm",
        }
    }
}

impl std::fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ConversionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute" | "abs" | "1" => Ok(ConversionMode::Absolute),
            "relative" | "rel" | "2" => Ok(ConversionMode::Relative),
            other => Err(ConfigError::Invalid(format!(
                "unknown conversion mode '{}' (expected 'absolute' or 'relative')",
                other
            ))),
        }
    }
}

/// What a batch does when one file fails to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole batch at the first failing file.
    #[default]
    Abort,
    /// Record the failure and move on to the next file.
    Continue,
}

/// Calibration constants of the unit transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Laser wavelength in nanometers
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,

    /// Phase offset subtracted from the effective reading
    #[serde(default)]
    pub phase: f64,

    /// Correction subtracted after scaling, in nanometers
    #[serde(default)]
    pub correction: f64,
}

fn default_wavelength() -> f64 {
    632.991372
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            wavelength: default_wavelength(),
            phase: 0.0,
            correction: 0.0,
        }
    }
}

/// Per-run conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default)]
    pub mode: ConversionMode,

    /// Sampling frequency used to rebuild the time axis from counters
    #[serde(default = "default_sample_frequency")]
    pub sample_frequency_hz: f64,

    /// Number of leading samples shown in the zoom plot
    #[serde(default = "default_zoom_points")]
    pub zoom_points: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_sample_frequency() -> f64 {
    1000.0
}

fn default_zoom_points() -> usize {
    2400
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: ConversionMode::default(),
            sample_frequency_hz: default_sample_frequency(),
            zoom_points: default_zoom_points(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Raster output settings for the diagnostic plots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_plot_width")]
    pub width: u32,

    #[serde(default = "default_plot_height")]
    pub height: u32,

    /// TrueType font for titles and axis labels. When unset, a few common
    /// system locations are probed; without a font the plots are unlabeled.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

// 10x5 inches at 150 dpi
fn default_plot_width() -> u32 {
    1500
}

fn default_plot_height() -> u32 {
    750
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_plot_width(),
            height: default_plot_height(),
            font_path: None,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let freq = self.conversion.sample_frequency_hz;
        if !freq.is_finite() || freq <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sample_frequency_hz must be a positive number, got {}",
                freq
            )));
        }
        let cal = &self.calibration;
        if !(cal.wavelength.is_finite() && cal.phase.is_finite() && cal.correction.is_finite()) {
            return Err(ConfigError::Invalid(
                "calibration constants must be finite".to_string(),
            ));
        }
        if self.plot.width == 0 || self.plot.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "plot size must be non-zero, got {}x{}",
                self.plot.width, self.plot.height
            )));
        }
        Ok(())
    }
}
