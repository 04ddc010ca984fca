//! Conversion of one raw log into a CSV table and two plots.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::{ConversionMode, PipelineConfig};
use crate::core::extractor::{extract_records, ExtractError};
use crate::core::transforms::{Baseline, CalibratedSample, SampleConverter};
use crate::core::writers::{SampleCsvWriter, WriteError};
use crate::visualization::{plot_trace, TraceStyle, VisualizationError};

/// Extension of raw input logs, compared case-insensitively.
pub const INPUT_EXTENSION: &str = ".txt";

/// Errors that can occur while converting a single file.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to read input '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Render(#[from] VisualizationError),

    #[error("input file name is not a .txt log: {0}")]
    InvalidInputName(PathBuf),
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// The three files produced for one input log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub csv: PathBuf,
    pub plot_all: PathBuf,
    pub plot_zoom: PathBuf,
}

impl ArtifactPaths {
    /// Derive artifact paths in `output_dir` from an input file name.
    ///
    /// `run1.TXT` in relative mode becomes `run1_relative.csv`,
    /// `run1_relative_all.png` and `run1_relative_zoom.png`.
    pub fn for_input(input: &Path, output_dir: &Path, mode: ConversionMode) -> Result<Self> {
        let invalid = || ConversionError::InvalidInputName(input.to_path_buf());
        let name = input.file_name().ok_or_else(invalid)?.to_string_lossy();
        let stem = strip_input_extension(&name).ok_or_else(invalid)?;

        let label = mode.label();
        Ok(Self {
            csv: output_dir.join(format!("{}_{}.csv", stem, label)),
            plot_all: output_dir.join(format!("{}_{}_all.png", stem, label)),
            plot_zoom: output_dir.join(format!("{}_{}_zoom.png", stem, label)),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [&self.csv, &self.plot_all, &self.plot_zoom]
            .into_iter()
            .map(PathBuf::as_path)
    }
}

/// Strip a trailing `.txt` (any case) from a file name.
fn strip_input_extension(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(INPUT_EXTENSION.len())?;
    let (stem, ext) = (name.get(..split)?, name.get(split..)?);
    ext.eq_ignore_ascii_case(INPUT_EXTENSION).then_some(stem)
}

/// Result of converting one input file.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub mode: ConversionMode,
    /// Reference pair captured from the first record; unset for files without records.
    pub baseline: Baseline,
    /// All samples in source order.
    pub samples: Vec<CalibratedSample>,
    /// Number of leading samples drawn in the zoom plot.
    pub zoom_count: usize,
    pub artifacts: ArtifactPaths,
}

impl ConversionJob {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Convert a raw log and write its CSV table and both plots.
///
/// The file is read in full, then every record is converted against a
/// baseline owned by this call and streamed to the CSV. The plots are
/// rendered once all samples are known.
///
/// # Arguments
///
/// * `input` - Path to the raw `.txt` log
/// * `artifacts` - Where to write the CSV and the two PNGs
/// * `config` - Mode, sampling frequency, zoom size, calibration and plot settings
pub fn convert_file(
    input: &Path,
    artifacts: &ArtifactPaths,
    config: &PipelineConfig,
) -> Result<ConversionJob> {
    let conversion = &config.conversion;

    let bytes = fs::read(input).map_err(|e| ConversionError::Read {
        path: input.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);

    let mut converter = SampleConverter::new(
        conversion.mode,
        conversion.sample_frequency_hz,
        config.calibration,
    );
    let mut csv = SampleCsvWriter::create(&artifacts.csv, conversion.mode)?;
    let mut samples = Vec::new();

    for record in extract_records(&text) {
        let record = record.map_err(|e| ConversionError::Malformed {
            path: input.to_path_buf(),
            source: e,
        })?;
        let sample = converter.convert(&record);
        csv.write_sample(&sample)?;
        samples.push(sample);
    }
    csv.finish()?;

    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mode = conversion.mode;

    plot_trace(
        &artifacts.plot_all,
        &samples,
        &format!("{} ({}) - All Data", file_name, mode),
        TraceStyle::Line,
        &config.plot,
    )?;

    let zoom_count = conversion.zoom_points.min(samples.len());
    plot_trace(
        &artifacts.plot_zoom,
        &samples[..zoom_count],
        &format!("{} ({}) - First {} Points", file_name, mode, zoom_count),
        TraceStyle::LineWithMarkers,
        &config.plot,
    )?;

    debug!(
        "Converted {} ({} samples) -> {}",
        input.display(),
        samples.len(),
        artifacts.csv.display()
    );

    Ok(ConversionJob {
        source: input.to_path_buf(),
        mode,
        baseline: converter.into_baseline(),
        samples,
        zoom_count,
        artifacts: artifacts.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_log(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", body).unwrap();
        path
    }

    fn test_config(mode: ConversionMode, zoom_points: usize) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.conversion.mode = mode;
        config.conversion.zoom_points = zoom_points;
        config.plot.width = 320;
        config.plot.height = 200;
        config
    }

    fn read_rows(path: &Path) -> Vec<(f64, f64)> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].parse().unwrap(), r[1].parse().unwrap())
            })
            .collect()
    }

    const EXAMPLE: &str = "D:10.0 N:0\njunk\nD:12.0 N:1\nD:8.0 N:3\n";

    #[test]
    fn test_artifact_names() {
        let out = Path::new("/out/sub");
        let paths =
            ArtifactPaths::for_input(Path::new("/in/sub/run1.TXT"), out, ConversionMode::Relative)
                .unwrap();
        assert_eq!(paths.csv, out.join("run1_relative.csv"));
        assert_eq!(paths.plot_all, out.join("run1_relative_all.png"));
        assert_eq!(paths.plot_zoom, out.join("run1_relative_zoom.png"));

        let paths =
            ArtifactPaths::for_input(Path::new("a.txt.txt"), out, ConversionMode::Absolute).unwrap();
        assert_eq!(paths.csv, out.join("a.txt_absolute.csv"));

        assert!(ArtifactPaths::for_input(Path::new("data.dat"), out, ConversionMode::Absolute)
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_artifact_names_for_non_utf8_input() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let out = Path::new("/out");
        let input = Path::new("/in").join(OsStr::from_bytes(b"run\xff.txt"));
        let paths = ArtifactPaths::for_input(&input, out, ConversionMode::Relative).unwrap();
        assert_eq!(paths.csv, out.join("run\u{FFFD}_relative.csv"));
    }

    #[test]
    fn test_end_to_end_example() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_log(temp_dir.path(), "sample.txt", EXAMPLE);
        let out_dir = temp_dir.path().join("out");
        let config = test_config(ConversionMode::Relative, 2400);
        let artifacts = ArtifactPaths::for_input(&input, &out_dir, config.conversion.mode).unwrap();

        let job = convert_file(&input, &artifacts, &config).unwrap();

        assert_eq!(job.baseline.counter0, Some(0));
        assert_eq!(job.baseline.displacement0, Some(10.0));
        assert_eq!(job.len(), 3);
        assert_eq!(job.zoom_count, 3);

        let content = fs::read_to_string(&artifacts.csv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Time_ms,Delta_Displacement_nm",
                "0.000,0.000",
                "1.000,632.991",
                "3.000,-632.991",
            ]
        );
        assert!(artifacts.plot_all.exists());
        assert!(artifacts.plot_zoom.exists());
    }

    #[test]
    fn test_absolute_mode() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_log(temp_dir.path(), "abs.txt", "D:2.0 N:10\nD:-1.0 N:12\n");
        let config = test_config(ConversionMode::Absolute, 10);
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let job = convert_file(&input, &artifacts, &config).unwrap();

        assert_eq!(job.baseline.counter0, Some(10));
        assert_eq!(job.baseline.displacement0, Some(2.0));
        let content = fs::read_to_string(&artifacts.csv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Time_ms,Absolute_Displacement_nm");
        assert_eq!(lines[1], "0.000,632.991");
        assert_eq!(lines[2], "2.000,-316.496");
    }

    #[test]
    fn test_csv_matches_samples() {
        let temp_dir = TempDir::new().unwrap();
        let body: String = (0..50)
            .map(|i| format!("t={} D:{:.4} N:{}\n", i, (i as f64) * 0.0137 - 0.2, 1000 + 2 * i))
            .collect();
        let input = write_log(temp_dir.path(), "ramp.txt", &body);
        let mut config = test_config(ConversionMode::Relative, 5);
        config.conversion.sample_frequency_hz = 400.0;
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let job = convert_file(&input, &artifacts, &config).unwrap();
        let rows = read_rows(&artifacts.csv);

        assert_eq!(rows.len(), job.len());
        for (k, (row, sample)) in rows.iter().zip(&job.samples).enumerate() {
            assert!((row.0 - sample.time_ms).abs() <= 0.0005 + 1e-9);
            assert!((row.1 - sample.displacement_nm).abs() <= 0.0005 + 1e-9);
            assert!((sample.time_ms - (2 * k) as f64 * 2.5).abs() < 1e-9);
        }
        assert_eq!(job.zoom_count, 5);
    }

    #[test]
    fn test_reconversion_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_log(temp_dir.path(), "again.txt", EXAMPLE);
        let config = test_config(ConversionMode::Relative, 2);
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let first = convert_file(&input, &artifacts, &config).unwrap();
        let second = convert_file(&input, &artifacts, &config).unwrap();

        assert_eq!(first.samples, second.samples);
        assert_eq!(first.baseline, second.baseline);
    }

    #[test]
    fn test_zoom_clamped_to_sample_count() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_log(temp_dir.path(), "short.txt", EXAMPLE);
        let config = test_config(ConversionMode::Relative, 10_000);
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let job = convert_file(&input, &artifacts, &config).unwrap();

        assert_eq!(job.zoom_count, 3);
        assert!(artifacts.plot_zoom.exists());
    }

    #[test]
    fn test_file_without_records() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_log(temp_dir.path(), "empty.txt", "no data here\n");
        let config = test_config(ConversionMode::Relative, 100);
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let job = convert_file(&input, &artifacts, &config).unwrap();

        assert!(job.is_empty());
        assert!(!job.baseline.is_set());
        let content = fs::read_to_string(&artifacts.csv).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(artifacts.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_malformed_record_fails_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_log(
            temp_dir.path(),
            "bad.txt",
            "D:1.0 N:1\nD:1.0 N:123456789012345678901234567890\n",
        );
        let config = test_config(ConversionMode::Relative, 100);
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let result = convert_file(&input, &artifacts, &config);

        match result {
            Err(ConversionError::Malformed { path, source }) => {
                assert_eq!(path, input);
                assert!(matches!(source, ExtractError::Malformed { line: 2, .. }));
            }
            other => panic!("Expected Malformed error, got {:?}", other.map(|j| j.len())),
        }
    }

    #[test]
    fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("missing.txt");
        let config = test_config(ConversionMode::Relative, 100);
        let artifacts =
            ArtifactPaths::for_input(&input, temp_dir.path(), config.conversion.mode).unwrap();

        let result = convert_file(&input, &artifacts, &config);
        assert!(matches!(result, Err(ConversionError::Read { .. })));
        assert!(!artifacts.csv.exists());
    }
}
