use tokio::io::AsyncRead;

use crate::error::ServiceError;
use crate::jobs::{new_job_id, Job, JobStore, TerminalStatus};
use crate::results::{ResultDocument, ResultStore};
use crate::storage::UploadStore;

use super::job::{JobSource, SubmitOptions, WorkItem};
use super::pool::WorkerPool;
use super::run_blocking;

/// Accepts new jobs: stores the upload, records the pending job and queues it.
///
/// Nothing here talks to the remote service.
pub struct Dispatcher {
    jobs: JobStore,
    results: ResultStore,
    uploads: UploadStore,
    pool: WorkerPool,
}

impl Dispatcher {
    pub fn new(jobs: JobStore, results: ResultStore, uploads: UploadStore, pool: WorkerPool) -> Self {
        Self {
            jobs,
            results,
            uploads,
            pool,
        }
    }

    /// Stores an uploaded document and queues it. Returns the new job id.
    ///
    /// The job is visible as `pending` by the time this returns.
    pub async fn submit<R>(
        &self,
        reader: &mut R,
        original_name: &str,
        options: SubmitOptions,
    ) -> Result<String, ServiceError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let job_id = new_job_id();
        let stored = self.uploads.save(&job_id, original_name, reader).await?;

        let job = Job::pending(
            &job_id,
            original_name,
            Some(stored.path.clone()),
            stored.size_bytes,
        );
        if let Err(e) = self.insert(job).await {
            if let Err(rm) = tokio::fs::remove_file(&stored.path).await {
                log::warn!("Failed to remove orphaned upload: {}", rm);
            }
            return Err(e);
        }

        log::info!(
            "Accepted job {} ({} bytes)",
            job_id,
            stored.size_bytes
        );
        self.enqueue(WorkItem::new(
            job_id.clone(),
            JobSource::LocalFile(stored.path),
            options,
        ))
        .await?;
        Ok(job_id)
    }

    /// Queues a document the remote service fetches by URL. No local copy is kept.
    pub async fn submit_url(&self, url: &str, options: SubmitOptions) -> Result<String, ServiceError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ServiceError::InvalidInput(
                "document url must be an http(s) URL".to_string(),
            ));
        }

        let job_id = new_job_id();
        let job = Job::pending(&job_id, url, None, 0)
            .with_extra("source_url", serde_json::Value::String(url.to_string()));
        self.insert(job).await?;

        log::info!("Accepted job {} from {}", job_id, crate::sanitize::redact_url(url));
        self.enqueue(WorkItem::new(
            job_id.clone(),
            JobSource::RemoteUrl(url.to_string()),
            options,
        ))
        .await?;
        Ok(job_id)
    }

    async fn insert(&self, job: Job) -> Result<(), ServiceError> {
        let jobs = self.jobs.clone();
        run_blocking(move || jobs.insert(&job).map_err(ServiceError::from)).await
    }

    /// Hands the item to the pool. If the pool is closed the job is failed
    /// right away so it never stays pending.
    async fn enqueue(&self, item: WorkItem) -> Result<(), ServiceError> {
        let job_id = item.job_id.clone();
        let Err(e) = self.pool.submit(item) else {
            return Ok(());
        };

        log::error!("Could not queue job {}: {}", job_id, e);
        let jobs = self.jobs.clone();
        let results = self.results.clone();
        let message = format!("Job could not be queued: {}", e);
        let failed_id = job_id.clone();
        run_blocking(move || {
            let doc = ResultDocument::failure(message);
            let path = results.write(&failed_id, &doc)?;
            jobs.update_terminal(&failed_id, &path, TerminalStatus::Failed, None, None)?;
            Ok(())
        })
        .await?;

        Err(ServiceError::Unavailable(format!(
            "worker pool is not accepting jobs (job {} marked failed)",
            job_id
        )))
    }

    pub fn queued(&self) -> usize {
        self.pool.queued()
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Drains the queue and joins the workers.
    pub fn wait(self) {
        self.pool.wait();
    }
}
