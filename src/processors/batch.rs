//! Batch conversion of a directory tree of raw logs.
//!
//! Inputs are discovered recursively, converted one after another and their
//! artifacts written under the output root at the same relative location.
//! [`run_batch`] is synchronous and reports progress through a callback;
//! [`spawn_batch`] runs the same loop on a background thread and streams
//! [`BatchEvent`]s over a channel for front-ends that must stay responsive.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{FailurePolicy, PipelineConfig};

use super::conversion::{convert_file, ArtifactPaths, ConversionError};
use super::discovery::{discover_inputs, DiscoveryError};

/// Errors that stop a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("No .txt input files found under {}", root.display())]
    EmptyInput { root: PathBuf },

    #[error("failed to create output directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to convert {}: {source}", relative_path.display())]
    Conversion {
        relative_path: PathBuf,
        #[source]
        source: ConversionError,
    },

    #[error("failed to start batch worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("batch worker panicked")]
    WorkerPanicked,
}

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Everything a batch needs to run.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub config: PipelineConfig,
}

/// Discovered inputs of a batch and how far it has come.
///
/// `total` is fixed at discovery; `done` only grows and never exceeds it.
#[derive(Debug, Clone)]
pub struct BatchRun {
    inputs: Vec<PathBuf>,
    done: usize,
}

impl BatchRun {
    /// Discover inputs under `input_root`, failing if there are none.
    pub fn discover(input_root: &Path) -> Result<Self> {
        let inputs: Vec<PathBuf> = discover_inputs(input_root)?
            .into_iter()
            .filter_map(|path| path.strip_prefix(input_root).ok().map(Path::to_path_buf))
            .collect();

        if inputs.is_empty() {
            return Err(BatchError::EmptyInput {
                root: input_root.to_path_buf(),
            });
        }

        Ok(Self { inputs, done: 0 })
    }

    /// Input paths relative to the input root, in processing order.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn total(&self) -> usize {
        self.inputs.len()
    }

    pub fn done(&self) -> usize {
        self.done
    }

    fn advance(&mut self) -> usize {
        self.done = (self.done + 1).min(self.total());
        self.done
    }
}

/// A file that was converted.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub relative_path: PathBuf,
    pub samples: usize,
    pub artifacts: ArtifactPaths,
}

/// A file that failed under [`FailurePolicy::Continue`].
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub relative_path: PathBuf,
    pub message: String,
}

/// Outcome of a batch that ran to its end (or was cancelled).
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub converted: Vec<ConvertedFile>,
    pub failures: Vec<FailedFile>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.converted.len() == self.total
    }
}

/// Convert every raw log under the request's input root.
///
/// `on_progress(done, total, message)` is called after each file.
///
/// # Errors
///
/// Returns [`BatchError::EmptyInput`] before touching the output root when
/// nothing qualifies. With [`FailurePolicy::Abort`] the first failing file
/// stops the batch; files converted before it stay on disk.
pub fn run_batch<F>(request: &BatchRequest, on_progress: F) -> Result<BatchReport>
where
    F: FnMut(usize, usize, &str),
{
    run_batch_until(request, &AtomicBool::new(false), on_progress)
}

/// Like [`run_batch`], stopping before the next file once `cancel` is set.
///
/// A file that has started converting is always finished.
pub fn run_batch_until<F>(
    request: &BatchRequest,
    cancel: &AtomicBool,
    mut on_progress: F,
) -> Result<BatchReport>
where
    F: FnMut(usize, usize, &str),
{
    let mut run = BatchRun::discover(&request.input_root)?;
    let total = run.total();
    let policy = request.config.conversion.failure_policy;

    info!(
        "Converting {} file(s) from {} to {} ({} mode)",
        total,
        request.input_root.display(),
        request.output_root.display(),
        request.config.conversion.mode
    );

    let mut report = BatchReport {
        total,
        ..BatchReport::default()
    };

    let inputs = run.inputs().to_vec();
    for relative_path in inputs {
        if cancel.load(Ordering::Relaxed) {
            info!("Batch cancelled after {}/{} file(s)", run.done(), total);
            report.cancelled = true;
            break;
        }

        match convert_one(request, &relative_path) {
            Ok(converted) => {
                let done = run.advance();
                on_progress(done, total, &format!("Processed: {}", relative_path.display()));
                report.converted.push(converted);
            }
            Err(e) if policy == FailurePolicy::Continue => {
                warn!("Skipping {}: {}", relative_path.display(), e);
                let message = e.to_string();
                let done = run.advance();
                on_progress(
                    done,
                    total,
                    &format!("Failed: {}: {}", relative_path.display(), message),
                );
                report.failures.push(FailedFile {
                    relative_path,
                    message,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

fn convert_one(request: &BatchRequest, relative_path: &Path) -> Result<ConvertedFile> {
    let input = request.input_root.join(relative_path);
    let out_dir = match relative_path.parent() {
        Some(parent) => request.output_root.join(parent),
        None => request.output_root.clone(),
    };

    fs::create_dir_all(&out_dir).map_err(|e| BatchError::CreateDirectory {
        path: out_dir.clone(),
        source: e,
    })?;

    let conversion_err = |e| BatchError::Conversion {
        relative_path: relative_path.to_path_buf(),
        source: e,
    };

    let artifacts = ArtifactPaths::for_input(&input, &out_dir, request.config.conversion.mode)
        .map_err(conversion_err)?;
    let job = convert_file(&input, &artifacts, &request.config).map_err(conversion_err)?;

    debug!("{}: {} samples", relative_path.display(), job.len());

    Ok(ConvertedFile {
        relative_path: relative_path.to_path_buf(),
        samples: job.len(),
        artifacts,
    })
}

/// Messages sent by a background batch.
#[derive(Debug)]
pub enum BatchEvent {
    Progress {
        done: usize,
        total: usize,
        message: String,
    },
    Finished(BatchReport),
    Failed(BatchError),
}

/// Handle to a batch running on a background thread.
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BatchHandle {
    /// Event stream; ends with exactly one `Finished` or `Failed`.
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Ask the worker to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| BatchError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

/// Run a batch on a dedicated thread named `"batch-worker"`.
pub fn spawn_batch(request: BatchRequest) -> Result<BatchHandle> {
    let (sender, events) = unbounded::<BatchEvent>();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let handle = thread::Builder::new()
        .name("batch-worker".to_string())
        .spawn(move || worker(request, &worker_cancel, sender))
        .map_err(BatchError::Spawn)?;

    Ok(BatchHandle {
        events,
        cancel,
        handle: Some(handle),
    })
}

fn worker(request: BatchRequest, cancel: &AtomicBool, sender: Sender<BatchEvent>) {
    // Send errors mean the receiver is gone; the batch still runs to completion.
    let result = run_batch_until(&request, cancel, |done, total, message| {
        let _ = sender.send(BatchEvent::Progress {
            done,
            total,
            message: message.to_string(),
        });
    });

    let _ = match result {
        Ok(report) => sender.send(BatchEvent::Finished(report)),
        Err(e) => sender.send(BatchEvent::Failed(e)),
    };
}
