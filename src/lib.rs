//! Batch converter for laser interferometer displacement logs.
//!
//! This crate provides tools for:
//! - Extracting `D:<displacement> N:<counter>` records from raw text logs
//! - Converting readings to nanometers against a per-file baseline
//! - Rebuilding a time axis from sample counters
//! - Writing CSV tables and full/zoomed PNG plots for a whole directory tree
//!
//! # Example
//!
//! ```no_run
//! use laser_pipeline::{run_batch, BatchRequest, PipelineConfig};
//!
//! let request = BatchRequest {
//!     input_root: "raw_logs".into(),
//!     output_root: "converted".into(),
//!     config: PipelineConfig::default(),
//! };
//! let report = run_batch(&request, |done, total, msg| println!("{msg} ({done}/{total})")).unwrap();
//! println!("{} file(s) converted", report.converted.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod platform;
pub mod processors;
pub mod visualization;

pub use config::{ConversionMode, FailurePolicy, PipelineConfig};
pub use core::{CalibratedSample, RawRecord};
pub use processors::{convert_file, run_batch, spawn_batch, BatchReport, BatchRequest};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
