//! Test harness for isolated test execution.
//!
//! Each `TestHarness` owns a temporary storage root and a `JobService`
//! wired to a `ScriptedRemote`.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use docpipe::config::Config;
use docpipe::{JobService, JobStatus, ResultStore, SubmitOptions};

use super::remote::ScriptedRemote;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const POLL_LIMIT: u32 = 500;

pub struct TestHarness {
    temp_dir: TempDir,
    pub service: JobService,
    pub remote: Arc<ScriptedRemote>,
}

impl TestHarness {
    /// Harness with a remote where every stage succeeds.
    pub fn new() -> Self {
        Self::with_remote(ScriptedRemote::default())
    }

    pub fn with_remote(remote: ScriptedRemote) -> Self {
        Self::with_workers(remote, 2)
    }

    /// Harness whose pool runs `max_workers` threads.
    pub fn with_workers(remote: ScriptedRemote, max_workers: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config {
            storage_path: temp_dir.path().join("data"),
            max_workers,
            ..Config::default()
        };

        let remote = Arc::new(remote);
        let service = JobService::with_remote(config, remote.clone())
            .expect("Failed to start job service");

        Self {
            temp_dir,
            service,
            remote,
        }
    }

    pub fn storage_root(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("data")
    }

    /// Direct access to the result documents, bypassing the service.
    pub fn results(&self) -> ResultStore {
        ResultStore::new(self.storage_root().join("results"))
    }

    pub fn upload_dir(&self) -> std::path::PathBuf {
        self.storage_root().join("uploads")
    }

    /// Submits `bytes` as an upload named `name`.
    pub async fn submit_bytes(&self, name: &str, bytes: &[u8], options: SubmitOptions) -> String {
        let mut reader = bytes;
        self.service
            .submit(&mut reader, name, options)
            .await
            .expect("submit failed")
    }

    /// Polls until the job leaves `pending`; returns its final status.
    pub async fn wait_for(&self, job_id: &str) -> JobStatus {
        for _ in 0..POLL_LIMIT {
            let report = self.service.status(job_id).await.expect("status failed");
            if report.status != JobStatus::Pending {
                return report.status;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        panic!("job {} still pending after polling", job_id);
    }

    pub fn path_exists(&self, relative: impl AsRef<Path>) -> bool {
        self.storage_root().join(relative).exists()
    }
}
