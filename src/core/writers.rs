//! CSV output for calibrated traces.
//!
//! Rows are written as they are produced; only the `csv` writer's buffer sits
//! between the converter and the file.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConversionMode;

use super::transforms::CalibratedSample;

/// Header of the time column.
pub const TIME_COLUMN: &str = "Time_ms";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Format a value the way every numeric CSV field is written.
#[inline]
pub fn format_fixed(value: f64) -> String {
    format!("{:.3}", value)
}

/// Incremental writer for a `Time_ms,<mode>_Displacement_nm` table.
pub struct SampleCsvWriter {
    writer: csv::Writer<BufWriter<File>>,
    path: PathBuf,
    rows: usize,
}

impl SampleCsvWriter {
    /// Create the file (and its parent directories) and write the header.
    pub fn create(path: &Path, mode: ConversionMode) -> Result<Self> {
        ensure_parent_dirs(path)?;

        let file = File::create(path).map_err(|e| WriteError::CreateFile {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut writer = csv::Writer::from_writer(BufWriter::with_capacity(64 * 1024, file));

        writer
            .write_record([TIME_COLUMN, mode.column_header()])
            .map_err(|e| WriteError::CsvError {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    /// Append one sample as a row.
    pub fn write_sample(&mut self, sample: &CalibratedSample) -> Result<()> {
        self.writer
            .write_record(&[
                format_fixed(sample.time_ms),
                format_fixed(sample.displacement_nm),
            ])
            .map_err(|e| WriteError::CsvError {
                path: self.path.display().to_string(),
                source: e,
            })?;
        self.rows += 1;
        Ok(())
    }

    /// Number of data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered rows to disk and return the row count.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().map_err(|e| WriteError::WriteFile {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(self.rows)
    }
}
