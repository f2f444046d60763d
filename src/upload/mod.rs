pub mod graphql;
pub mod plan;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use crate::models::ClippingInput;
pub use graphql::GraphQlClient;
pub use plan::{plan, PlanError, UploadBatch};

pub const DEFAULT_CHUNK_SIZE: usize = 20;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Every way a single batch call can fail. All of them are local to the batch.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("server reported: {0}")]
    Remote(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("upload cancelled")]
    Cancelled,
    #[error("upload task aborted: {0}")]
    Aborted(String),
}

/// One network call carrying one batch. Returns how many rows the remote
/// side acknowledged.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    async fn send(&self, batch: &[ClippingInput]) -> Result<usize, UploadError>;
}

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    pub max_concurrency: usize,
    pub timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Nothing was dispatched.
    Empty,
    Success,
    Partial,
    Failed,
}

/// Aggregated result of one upload run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub attempted: usize,
    pub batches: usize,
    pub failed: Vec<usize>,
    pub first_error: Option<String>,
    pub acknowledged: usize,
}

impl UploadReport {
    pub fn outcome(&self) -> UploadOutcome {
        if self.batches == 0 {
            UploadOutcome::Empty
        } else if self.failed.is_empty() {
            UploadOutcome::Success
        } else if self.failed.len() < self.batches {
            UploadOutcome::Partial
        } else {
            UploadOutcome::Failed
        }
    }

    pub fn succeeded(&self) -> Vec<usize> {
        (1..=self.batches)
            .filter(|i| !self.failed.contains(i))
            .collect()
    }
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} clippings in {} batches, {} failed",
            self.attempted,
            self.batches,
            self.failed.len()
        )?;
        if let Some(err) = &self.first_error {
            write!(f, " (batches {:?}; first error: {})", self.failed, err)?;
        }
        Ok(())
    }
}

/// Upload every batch concurrently, at most `max_concurrency` in flight.
///
/// A failed batch never stops its siblings; all tasks are awaited before the
/// report is built. When `cancel` flips to `true`, queued batches never start
/// and in-flight calls are dropped; both are reported as failed.
///
/// # Panics
///
/// If `options.max_concurrency` is 0; `Settings::validate` rejects that before
/// any upload starts.
pub async fn upload<S: BatchSink>(
    batches: &[UploadBatch<'_>],
    sink: Arc<S>,
    options: UploadOptions,
    cancel: watch::Receiver<bool>,
) -> UploadReport {
    let attempted: usize = batches.iter().map(|b| b.clippings.len()).sum();
    let total = batches.len();
    assert!(options.max_concurrency > 0, "max_concurrency must be positive");
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency));
    let failures: Arc<Mutex<Vec<BatchFailure>>> = Arc::default();
    let acknowledged = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} batches")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    info!("Uploading {} clippings in {} batches", attempted, total);

    let mut handles = Vec::with_capacity(total);
    for batch in batches {
        let index = batch.index;
        let payload: Vec<ClippingInput> = batch.clippings.iter().map(ClippingInput::from).collect();
        let sink = Arc::clone(&sink);
        let sem = Arc::clone(&semaphore);
        let failures = Arc::clone(&failures);
        let acknowledged = Arc::clone(&acknowledged);
        let pb = pb.clone();
        let mut cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => Err(UploadError::Cancelled),
                r = send_gated(&*sink, &sem, &payload, options.timeout) => r,
            };
            match result {
                Ok(n) => {
                    acknowledged.fetch_add(n, std::sync::atomic::Ordering::Relaxed);
                    info!("Batch {}/{} completed: {} items", index, total, payload.len());
                }
                Err(e) => {
                    warn!("Batch {}/{} failed: {}", index, total, e);
                    record_failure(&failures, index, e.to_string());
                }
            }
            pb.inc(1);
        });
        handles.push((index, handle));
    }

    for (index, handle) in handles {
        if let Err(e) = handle.await {
            record_failure(&failures, index, UploadError::Aborted(e.to_string()).to_string());
        }
    }
    pb.finish_and_clear();

    let failures = failures.lock().unwrap_or_else(|p| p.into_inner()).clone();
    let first_error = failures
        .first()
        .map(|f| format!("batch {} failed: {}", f.index, f.message));
    let mut failed: Vec<usize> = failures.iter().map(|f| f.index).collect();
    failed.sort_unstable();
    failed.dedup();

    let report = UploadReport {
        attempted,
        batches: total,
        failed,
        first_error,
        acknowledged: acknowledged.load(std::sync::atomic::Ordering::Relaxed),
    };
    info!("Upload finished: {}", report);
    report
}

/// Wait for a permit, then make one call bounded by `timeout`.
async fn send_gated<S: BatchSink + ?Sized>(
    sink: &S,
    sem: &Semaphore,
    payload: &[ClippingInput],
    timeout: Duration,
) -> Result<usize, UploadError> {
    let _permit = sem.acquire().await.map_err(|_| UploadError::Cancelled)?;
    match tokio::time::timeout(timeout, sink.send(payload)).await {
        Ok(result) => result,
        Err(_) => Err(UploadError::Timeout(timeout)),
    }
}

/// Resolves once the signal reads `true`; never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn record_failure(failures: &Mutex<Vec<BatchFailure>>, index: usize, message: String) {
    let mut guard = failures.lock().unwrap_or_else(|p| p.into_inner());
    guard.push(BatchFailure { index, message });
}

// ── Tests ──
