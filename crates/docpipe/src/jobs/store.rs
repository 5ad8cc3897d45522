//! Durable job store backed by the SQLite `jobs` table.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::db::job_repo::{self, JobRow, TerminalUpdate};
use crate::db::{Database, DatabaseError};

use super::model::{Job, JobStatus, TerminalStatus};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn parse_status(s: Option<&str>, job_id: &str) -> JobStatus {
    match s {
        Some("pending") => JobStatus::Pending,
        Some("completed") => JobStatus::Completed,
        Some("failed") => JobStatus::Failed,
        None => JobStatus::Pending,
        Some(other) => {
            log::warn!(
                "Unknown job status '{}' for job {}, defaulting to pending",
                other,
                job_id
            );
            JobStatus::Pending
        }
    }
}

/// Parses RFC 3339, falling back to naive ISO-8601 (interpreted as UTC) as
/// written by older deployments.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            None
        }
    }
}

/// Fixed-width so lexical order in SQLite equals chronological order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_extra(raw: Option<&str>, job_id: &str) -> serde_json::Map<String, serde_json::Value> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return serde_json::Map::new();
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            log::warn!("Ignoring malformed extra metadata for job {}", job_id);
            serde_json::Map::new()
        }
    }
}

fn job_from_row(row: JobRow) -> Job {
    let status = parse_status(row.status.as_deref(), &row.job_id);
    let created_at = row
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_default();
    let completed_at = row.completed_at.as_deref().and_then(parse_timestamp);
    let extra = parse_extra(row.extra.as_deref(), &row.job_id);

    Job {
        title: row.title,
        original_filename: row.filename.unwrap_or_default(),
        stored_file_path: row.filepath.filter(|p| !p.is_empty()).map(PathBuf::from),
        result_path: row.resultpath.filter(|p| !p.is_empty()).map(PathBuf::from),
        status,
        created_at,
        completed_at,
        pages: row.pages.and_then(|p| u32::try_from(p).ok()),
        size_bytes: row.size_bytes.and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
        extra,
        job_id: row.job_id,
    }
}

fn row_from_job(job: &Job) -> JobRow {
    JobRow {
        job_id: job.job_id.clone(),
        title: job.title.clone(),
        filename: Some(job.original_filename.clone()),
        filepath: job
            .stored_file_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        resultpath: job
            .result_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        status: Some(job.status.as_str().to_string()),
        created_at: Some(format_timestamp(job.created_at)),
        completed_at: job.completed_at.map(format_timestamp),
        pages: job.pages.map(i64::from),
        size_bytes: Some(job.size_bytes.min(i64::MAX as u64) as i64),
        extra: Some(serde_json::Value::Object(job.extra.clone()).to_string()),
    }
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Persistent record of job metadata and lifecycle status.
///
/// Cloning is cheap; all clones share one database handle.
#[derive(Debug, Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Makes a job visible. This is the only way a job id enters the store.
    pub fn insert(&self, job: &Job) -> Result<(), DatabaseError> {
        job_repo::insert(&self.db, &row_from_job(job))
    }

    pub fn get(&self, job_id: &str) -> Result<Option<Job>, DatabaseError> {
        Ok(job_repo::find_by_id(&self.db, job_id)?.map(job_from_row))
    }

    /// Returns at most `limit` jobs, newest first.
    pub fn list(&self, limit: u64) -> Result<Vec<Job>, DatabaseError> {
        Ok(job_repo::list_recent(&self.db, limit)?
            .into_iter()
            .map(job_from_row)
            .collect())
    }

    /// Records the terminal outcome of a job.
    ///
    /// Returns `false` when the job is unknown or already terminal; the stored
    /// status is never rewritten.
    pub fn update_terminal(
        &self,
        job_id: &str,
        result_path: &Path,
        status: TerminalStatus,
        pages: Option<u32>,
        title: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result_path = result_path.to_string_lossy();
        let completed_at = format_timestamp(Utc::now());
        let update = TerminalUpdate {
            resultpath: &result_path,
            status: JobStatus::from(status).as_str(),
            completed_at: &completed_at,
            pages: pages.map(i64::from),
            title,
        };
        let changed = job_repo::update_terminal(&self.db, job_id, &update)?;
        if !changed {
            log::warn!(
                "Terminal update for job {} ignored (unknown or already finished)",
                job_id
            );
        }
        Ok(changed)
    }

    /// Sets the title independently of the status. Last writer wins.
    pub fn update_title(&self, job_id: &str, title: &str) -> Result<bool, DatabaseError> {
        job_repo::update_title(&self.db, job_id, title)
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        job_repo::count_by_status(&self.db, status.as_str())
    }
}
