use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job. Transitions are one-way: `Pending` to either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two statuses a terminal update may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
}

impl From<TerminalStatus> for JobStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Completed => JobStatus::Completed,
            TerminalStatus::Failed => JobStatus::Failed,
        }
    }
}

/// A job record as kept in the durable job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub title: Option<String>,
    pub original_filename: String,
    /// Local copy of the upload; `None` for jobs submitted by URL.
    pub stored_file_path: Option<PathBuf>,
    pub result_path: Option<PathBuf>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pages: Option<u32>,
    pub size_bytes: u64,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    /// Creates a fresh pending job record.
    pub fn pending(
        job_id: impl Into<String>,
        original_filename: impl Into<String>,
        stored_file_path: Option<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            title: None,
            original_filename: original_filename.into(),
            stored_file_path,
            result_path: None,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            pages: None,
            size_bytes,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Generates a new job id: a v4 UUID in 32-char lowercase hex.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
