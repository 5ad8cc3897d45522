use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::StorageError;
use crate::remote::RemoteError;

/// Errors that end a job as `failed`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read source file '{path}': {source}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload failed: {0}")]
    Upload(#[source] RemoteError),

    #[error("Signed URL request failed: {0}")]
    SignedUrl(#[source] RemoteError),

    #[error("OCR failed: {0}")]
    Ocr(#[source] RemoteError),

    #[error("Annotation failed: {0}")]
    Annotation(#[source] RemoteError),

    #[error("Persisting result failed: {0}")]
    Persist(#[from] StorageError),

    #[error("Job store update failed: {0}")]
    JobStore(#[from] DatabaseError),
}

/// Why an optional stage produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    RemoteFailed(String),
    EmptyResponse,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::RemoteFailed(e) => write!(f, "remote call failed: {}", e),
            SkipReason::EmptyResponse => f.write_str("empty response"),
        }
    }
}

/// Result of a stage whose failure does not fail the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    Done(T),
    Skipped(SkipReason),
}

/// An optional stage that was skipped, kept for the job report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStage {
    pub stage: &'static str,
    pub reason: SkipReason,
}
