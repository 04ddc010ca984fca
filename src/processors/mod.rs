//! Per-file conversion and directory batch processing.

pub mod batch;
pub mod conversion;
pub mod discovery;

// Re-export key types for convenience
pub use batch::{
    run_batch, run_batch_until, spawn_batch, BatchError, BatchEvent, BatchHandle, BatchReport,
    BatchRequest, BatchRun,
};
pub use conversion::{convert_file, ArtifactPaths, ConversionError, ConversionJob};
pub use discovery::{discover_inputs, is_valid_input, DiscoveryError};
