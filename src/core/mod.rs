//! Core data types: record extraction, unit conversion and CSV output.

pub mod extractor;
pub mod transforms;
pub mod writers;

pub use extractor::{extract_records, ExtractError, RawRecord};
pub use transforms::{Baseline, CalibratedSample, SampleConverter};
pub use writers::{SampleCsvWriter, WriteError};
