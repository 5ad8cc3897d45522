//! Client-facing job service: submission, status polling, results, QnA and export.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncRead;

use crate::config::Config;
use crate::db::Database;
use crate::error::{DocpipeError, ServiceError, StorageError};
use crate::export::{export_document, ExportFormat, ExportedDocument};
use crate::jobs::{Job, JobStatus, JobStore};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::remote::{extract, ChatMessage, MistralClient, RemoteError, RemoteService};
use crate::results::{ResultDocument, ResultStore};
use crate::sanitize;
use crate::secrets;
use crate::storage::UploadStore;
use crate::worker::{run_blocking, Dispatcher, SubmitOptions, WorkerPool};

/// Default page size for [`JobService::list_jobs`].
pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// What a status poll reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: JobStatus,
    /// Where the result can be fetched; `None` while pending.
    pub result_url: Option<String>,
}

fn result_url(job_id: &str) -> String {
    format!("/api/result/{}", job_id)
}

/// Job ids are generated hex strings; anything else is rejected before it
/// reaches a file path.
fn validate_job_id(job_id: &str) -> Result<(), ServiceError> {
    if job_id.is_empty() {
        return Err(ServiceError::InvalidInput("job_id is required".to_string()));
    }
    if !job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ServiceError::InvalidInput(format!(
            "invalid job_id: {}",
            job_id
        )));
    }
    Ok(())
}

pub struct JobService {
    jobs: JobStore,
    results: ResultStore,
    remote: Arc<dyn RemoteService>,
    pipeline_config: Arc<PipelineConfig>,
    dispatcher: Dispatcher,
}

impl JobService {
    /// Production constructor: resolves the API key and talks to the
    /// configured remote service.
    ///
    /// Builds a blocking HTTP client, so call it outside async code
    /// (e.g. via `spawn_blocking`).
    pub fn start(config: Config) -> Result<Self, DocpipeError> {
        let api_key = secrets::resolve_api_key(&config.remote)?;
        let remote = MistralClient::new(&config.remote, api_key)?;
        Self::with_remote(config, Arc::new(remote))
    }

    /// Builds the service around an injected remote service.
    pub fn with_remote(config: Config, remote: Arc<dyn RemoteService>) -> Result<Self, DocpipeError> {
        let paths = config.paths();
        paths.ensure()?;

        let db = Database::open(&paths.database)?;
        let jobs = JobStore::new(db);
        let results = ResultStore::new(&paths.results);
        let uploads = UploadStore::new(&paths.uploads);
        let pipeline_config = Arc::new(PipelineConfig::from_config(&config));

        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&pipeline_config),
            Arc::clone(&remote),
            jobs.clone(),
            results.clone(),
        ));
        let pool = WorkerPool::new(pipeline, config.max_workers)?;
        let dispatcher = Dispatcher::new(jobs.clone(), results.clone(), uploads, pool);

        log::info!(
            "Job service ready (storage: {}, workers: {})",
            paths.root.display(),
            config.max_workers
        );

        Ok(Self {
            jobs,
            results,
            remote,
            pipeline_config,
            dispatcher,
        })
    }

    /// Accepts an uploaded document. Returns as soon as the job is queued.
    pub async fn submit<R>(
        &self,
        reader: &mut R,
        original_name: &str,
        options: SubmitOptions,
    ) -> Result<String, ServiceError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.dispatcher.submit(reader, original_name, options).await
    }

    pub async fn submit_url(&self, url: &str, options: SubmitOptions) -> Result<String, ServiceError> {
        self.dispatcher.submit_url(url, options).await
    }

    /// Reports the job's status from its result document.
    ///
    /// No document means pending, provided the job exists at all. An
    /// unreadable document counts as completed.
    pub async fn status(&self, job_id: &str) -> Result<JobStatusReport, ServiceError> {
        validate_job_id(job_id)?;
        let job_id = job_id.to_string();
        let jobs = self.jobs.clone();
        let results = self.results.clone();

        run_blocking(move || {
            if results.exists(&job_id) {
                let status = match results.read(&job_id) {
                    Ok(Some(doc)) if doc.is_failed() => JobStatus::Failed,
                    Ok(_) => JobStatus::Completed,
                    Err(e) => {
                        log::warn!("Unreadable result document for job {}: {}", job_id, e);
                        JobStatus::Completed
                    }
                };
                return Ok(JobStatusReport {
                    result_url: Some(result_url(&job_id)),
                    job_id,
                    status,
                });
            }

            match jobs.get(&job_id)? {
                Some(_) => Ok(JobStatusReport {
                    job_id,
                    status: JobStatus::Pending,
                    result_url: None,
                }),
                None => Err(ServiceError::NotFound(job_id)),
            }
        })
        .await
    }

    /// Returns the result document once it exists.
    pub async fn result(&self, job_id: &str) -> Result<ResultDocument, ServiceError> {
        validate_job_id(job_id)?;
        let job_id = job_id.to_string();
        let results = self.results.clone();
        run_blocking(move || {
            results
                .read(&job_id)?
                .ok_or(ServiceError::NotReady(job_id))
        })
        .await
    }

    /// Most recent jobs first, at most `limit` (default 100).
    pub async fn list_jobs(&self, limit: Option<u64>) -> Result<Vec<Job>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let jobs = self.jobs.clone();
        run_blocking(move || Ok(jobs.list(limit)?)).await
    }

    /// Asks a free-form question about a processed document and records the
    /// exchange in the job's QnA history.
    pub async fn ask(&self, job_id: &str, question: &str) -> Result<String, ServiceError> {
        let question = question.trim();
        if job_id.is_empty() || question.is_empty() {
            return Err(ServiceError::InvalidInput(
                "job_id and question required".to_string(),
            ));
        }
        validate_job_id(job_id)?;

        let ctx = QnaContext {
            job_id: job_id.to_string(),
            jobs: self.jobs.clone(),
            results: self.results.clone(),
            remote: Arc::clone(&self.remote),
            config: Arc::clone(&self.pipeline_config),
        };
        let question = question.to_string();
        run_blocking(move || ctx.ask(&question)).await
    }

    /// Renders the result document as markdown or docx.
    pub async fn export(
        &self,
        job_id: &str,
        format: ExportFormat,
    ) -> Result<ExportedDocument, ServiceError> {
        let doc = self.result(job_id).await?;
        let job_id = job_id.to_string();
        run_blocking(move || Ok(export_document(&job_id, &doc, format)?)).await
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.dispatcher.queued()
    }

    /// Stops the workers after their current job; queued jobs stay pending.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }

    /// Finishes all queued jobs and stops the workers.
    pub fn wait(self) {
        self.dispatcher.wait();
    }
}

/// Everything an interactive question needs, owned so it can move to a
/// blocking thread.
struct QnaContext {
    job_id: String,
    jobs: JobStore,
    results: ResultStore,
    remote: Arc<dyn RemoteService>,
    config: Arc<PipelineConfig>,
}

impl QnaContext {
    fn ask(&self, question: &str) -> Result<String, ServiceError> {
        let doc = self
            .results
            .read(&self.job_id)?
            .ok_or_else(|| ServiceError::NotFound(self.job_id.clone()))?;

        let document_url = match doc.document_url.filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => self.recover_document_url()?,
        };

        let messages = [ChatMessage::user_with_document(question, &document_url)];
        let response = self.remote.chat(&self.config.chat_model, &messages)?;
        let answer = extract::chat_answer(&response).ok_or(RemoteError::Decode {
            operation: "chat completion",
            reason: "response has no message content".to_string(),
        })?;

        if let Err(e) = self.results.append_qna(&self.job_id, question, &answer) {
            log::warn!("Failed to record QnA for job {}: {}", self.job_id, e);
        }
        Ok(answer)
    }

    /// Finds a document URL for a job whose result lacks one: the submitted
    /// URL, or a fresh upload of the stored file. The URL is saved back.
    fn recover_document_url(&self) -> Result<String, ServiceError> {
        let job = self.jobs.get(&self.job_id)?.ok_or_else(|| {
            ServiceError::InvalidInput(
                "No job record found and no document_url in result".to_string(),
            )
        })?;

        let url = match job.extra.get("source_url").and_then(|v| v.as_str()) {
            Some(url) => url.to_string(),
            None => {
                let path = job
                    .stored_file_path
                    .filter(|p| p.is_file())
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(
                            "Document URL not available for QnA; resubmit the document"
                                .to_string(),
                        )
                    })?;
                self.upload_for_url(&path)?
            }
        };

        self.results.set_document_url(&self.job_id, &url)?;
        Ok(url)
    }

    fn upload_for_url(&self, path: &Path) -> Result<String, ServiceError> {
        let bytes = std::fs::read(path).map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let handle = self.remote.upload(bytes, &sanitize::redact_path(path))?;
        Ok(self
            .remote
            .signed_url(&handle, self.config.signed_url_expiry_hours)?)
    }
}
