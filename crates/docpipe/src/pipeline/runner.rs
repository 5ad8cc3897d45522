use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::jobs::{JobStore, TerminalStatus};
use crate::remote::{extract, ChatMessage, FileHandle, OcrRequest, RemoteService};
use crate::results::{ResultDocument, ResultStore, Step};
use crate::sanitize;
use crate::worker::job::{JobSource, WorkItem};

use super::config::PipelineConfig;
use super::context::{JobReport, PipelineContext};
use super::error::{PipelineError, SkipReason, StageOutcome};
use super::title::{self, SUMMARY_PROMPT, TITLE_PROMPT};

/// Runs the stage sequence for one job and records its terminal state.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    remote: Arc<dyn RemoteService>,
    jobs: JobStore,
    results: ResultStore,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        remote: Arc<dyn RemoteService>,
        jobs: JobStore,
        results: ResultStore,
    ) -> Self {
        Self {
            config,
            remote,
            jobs,
            results,
        }
    }

    /// Run the full pipeline for a single job.
    ///
    /// Any fatal error leaves a failure document and a `failed` job behind
    /// before it is returned.
    pub fn run(&self, job: WorkItem) -> Result<JobReport, PipelineError> {
        let source = job.source.describe();
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.job_id,
            source = %source,
        )
        .entered();

        let mut ctx = PipelineContext::new(job);

        let result_path = match self.execute(&mut ctx) {
            Ok(path) => path,
            Err(e) => {
                self.record_failure(&ctx, &e);
                return Err(e);
            }
        };

        // The success document is already on disk; a failed status update
        // must not replace it with a failure document.
        {
            let _step = info_span!("finalize").entered();
            self.step_finalize(&ctx, &result_path)?;
        }

        info!(
            pages = ?ctx.pages,
            skipped = ctx.skipped.len(),
            "Job completed"
        );

        Ok(JobReport {
            job_id: ctx.job.job_id.clone(),
            result_path,
            pages: ctx.pages,
            title: ctx.title.clone(),
            steps: ctx.steps.clone(),
            skipped: ctx.skipped.clone(),
        })
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<PathBuf, PipelineError> {
        // Step 1: Acquire a URL the remote service can read
        {
            let _step = info_span!("acquire_document").entered();
            self.step_acquire_document(ctx)?;
        }

        // Step 2: OCR
        {
            let _step = info_span!("ocr").entered();
            self.step_ocr(ctx)?;
        }

        // Step 3: Title
        {
            let _step = info_span!("title").entered();
            self.step_title(ctx);
        }

        // Step 4: Annotations
        if ctx.job.options.annotation_schema().is_some() {
            let _step = info_span!("annotate").entered();
            self.step_annotate(ctx)?;
        }

        // Step 5: Summary
        if ctx.job.options.do_qna {
            let _step = info_span!("qna_summary").entered();
            self.step_qna_summary(ctx);
        }

        // Step 6: Persist
        let _step = info_span!("persist").entered();
        let path = self.results.write(&ctx.job.job_id, &ctx.to_document())?;
        Ok(path)
    }

    fn step_acquire_document(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let url = match &ctx.job.source {
            JobSource::RemoteUrl(url) => url.clone(),
            JobSource::LocalFile(path) => self.upload_local(path)?,
        };
        debug!("Document URL: {}", sanitize::redact_url(&url));
        ctx.document_url = Some(url);
        Ok(())
    }

    fn upload_local(&self, path: &Path) -> Result<String, PipelineError> {
        let filename = sanitize::redact_path(path);
        let bytes = std::fs::read(path).map_err(|e| PipelineError::ReadSource {
            path: filename.clone(),
            source: e,
        })?;

        let handle: FileHandle = self
            .remote
            .upload(bytes, &filename)
            .map_err(PipelineError::Upload)?;
        self.remote
            .signed_url(&handle, self.config.signed_url_expiry_hours)
            .map_err(PipelineError::SignedUrl)
    }

    fn document_url(ctx: &PipelineContext) -> &str {
        ctx.document_url.as_deref().unwrap_or_default()
    }

    fn step_ocr(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let request = OcrRequest::new(&self.config.ocr_model, Self::document_url(ctx));
        let response = self.remote.ocr(&request).map_err(PipelineError::Ocr)?;

        ctx.steps.push(Step::OcrDone);
        ctx.pages = extract::pages_processed(&response);
        ctx.full_markdown = extract::extract_markdown(&response);
        if ctx.full_markdown.is_none() {
            warn!("OCR response contained no text");
        }
        ctx.ocr_response = Some(response);
        Ok(())
    }

    fn step_title(&self, ctx: &mut PipelineContext) {
        match self.generate_title(Self::document_url(ctx)) {
            StageOutcome::Done(title) => {
                ctx.title = Some(title);
                return;
            }
            StageOutcome::Skipped(reason) => ctx.skip("title", reason),
        }

        ctx.title = ctx
            .full_markdown
            .as_deref()
            .and_then(title::title_from_markdown);
        if ctx.title.is_some() {
            debug!("Title derived from markdown");
        }
    }

    fn generate_title(&self, document_url: &str) -> StageOutcome<String> {
        let messages = [ChatMessage::user_with_document(TITLE_PROMPT, document_url)];
        match self.remote.chat(&self.config.chat_model, &messages) {
            Ok(response) => match extract::chat_answer(&response)
                .as_deref()
                .and_then(title::clean_generated_title)
            {
                Some(title) => StageOutcome::Done(title),
                None => StageOutcome::Skipped(SkipReason::EmptyResponse),
            },
            Err(e) => StageOutcome::Skipped(SkipReason::RemoteFailed(e.to_string())),
        }
    }

    fn step_annotate(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(schema) = ctx.job.options.annotation_schema() else {
            return Ok(());
        };
        let request = OcrRequest::new(&self.config.ocr_model, Self::document_url(ctx))
            .with_annotation_schema(schema.clone());
        let response = self
            .remote
            .ocr(&request)
            .map_err(PipelineError::Annotation)?;

        ctx.annotations = Some(response);
        ctx.steps.push(Step::AnnotationsDone);
        Ok(())
    }

    fn step_qna_summary(&self, ctx: &mut PipelineContext) {
        let messages = [ChatMessage::user_with_document(
            SUMMARY_PROMPT,
            Self::document_url(ctx),
        )];
        let outcome = match self.remote.chat(&self.config.chat_model, &messages) {
            Ok(response) => match extract::chat_answer(&response) {
                Some(summary) if !summary.trim().is_empty() => StageOutcome::Done(summary),
                _ => StageOutcome::Skipped(SkipReason::EmptyResponse),
            },
            Err(e) => StageOutcome::Skipped(SkipReason::RemoteFailed(e.to_string())),
        };

        match outcome {
            StageOutcome::Done(summary) => {
                ctx.qna_summary = Some(summary);
                ctx.steps.push(Step::QnaDone);
            }
            StageOutcome::Skipped(reason) => ctx.skip("qna_summary", reason),
        }
    }

    fn step_finalize(&self, ctx: &PipelineContext, result_path: &Path) -> Result<(), PipelineError> {
        let job_id = &ctx.job.job_id;
        self.jobs.update_terminal(
            job_id,
            result_path,
            TerminalStatus::Completed,
            ctx.pages,
            ctx.title.as_deref(),
        )?;

        if let Some(title) = &ctx.title {
            if let Err(e) = self.jobs.update_title(job_id, title) {
                warn!("Title backfill failed: {}", e);
            }
        }
        Ok(())
    }

    /// Writes the failure document and marks the job failed. Errors here are
    /// logged; the original pipeline error is what the caller sees.
    fn record_failure(&self, ctx: &PipelineContext, err: &PipelineError) {
        error!("Job failed: {}", err);
        self.mark_failed(
            &ctx.job.job_id,
            err.to_string(),
            ctx.pages,
            ctx.title.as_deref(),
        );
    }

    /// Fails a job whose pipeline panicked, so it never stays pending.
    pub fn record_panic(&self, job_id: &str, message: &str) {
        self.mark_failed(job_id, format!("pipeline panicked: {}", message), None, None);
    }

    fn mark_failed(&self, job_id: &str, error: String, pages: Option<u32>, title: Option<&str>) {
        let doc = ResultDocument::failure(error);
        let result_path = match self.results.write(job_id, &doc) {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to write failure document: {}", e);
                self.results.path_for(job_id)
            }
        };

        if let Err(e) =
            self.jobs
                .update_terminal(job_id, &result_path, TerminalStatus::Failed, pages, title)
        {
            error!("Failed to mark job failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::jobs::{Job, JobStatus};
    use crate::remote::RemoteError;
    use crate::worker::job::SubmitOptions;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fake remote answering from fixed responses and recording calls.
    #[derive(Default)]
    struct FakeRemote {
        fail_upload: bool,
        ocr: Option<Value>,
        annotation: Option<Value>,
        title: Option<Value>,
        summary: Option<Value>,
        calls: Mutex<Vec<String>>,
    }

    fn unavailable(operation: &'static str) -> RemoteError {
        RemoteError::Status {
            operation,
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    impl RemoteService for FakeRemote {
        fn upload(&self, _bytes: Vec<u8>, filename: &str) -> Result<FileHandle, RemoteError> {
            self.calls.lock().unwrap().push(format!("upload:{}", filename));
            if self.fail_upload {
                return Err(unavailable("file upload"));
            }
            Ok(FileHandle {
                id: "file-1".to_string(),
            })
        }

        fn signed_url(&self, handle: &FileHandle, hours: u32) -> Result<String, RemoteError> {
            self.calls.lock().unwrap().push(format!("signed_url:{}", hours));
            Ok(format!("https://signed/{}?sig=x", handle.id))
        }

        fn ocr(&self, request: &OcrRequest) -> Result<Value, RemoteError> {
            if request.bbox_annotation_format.is_some() {
                self.calls.lock().unwrap().push("annotate".to_string());
                return self.annotation.clone().ok_or_else(|| unavailable("ocr"));
            }
            self.calls.lock().unwrap().push("ocr".to_string());
            self.ocr.clone().ok_or_else(|| unavailable("ocr"))
        }

        fn chat(&self, _model: &str, messages: &[ChatMessage]) -> Result<Value, RemoteError> {
            let is_title = serde_json::to_string(messages).unwrap().contains("title");
            self.calls
                .lock()
                .unwrap()
                .push(if is_title { "title" } else { "summary" }.to_string());
            let answer = if is_title { &self.title } else { &self.summary };
            answer.clone().ok_or_else(|| unavailable("chat completion"))
        }
    }

    fn chat(content: &str) -> Value {
        json!({"choices": [{"message": {"content": content}}]})
    }

    fn ocr_pages() -> Value {
        json!({
            "pages": [{"index": 0, "markdown": "# Invoice 42\n\nTotal: 10"}],
            "usage_info": {"pages_processed": 2}
        })
    }

    struct Harness {
        _temp: TempDir,
        pipeline: Pipeline,
        jobs: JobStore,
        results: ResultStore,
        remote: Arc<FakeRemote>,
        upload: PathBuf,
    }

    fn harness(remote: FakeRemote) -> Harness {
        let temp = TempDir::new().unwrap();
        let upload = temp.path().join("job1_scan.pdf");
        std::fs::write(&upload, b"%PDF-1.4").unwrap();

        let jobs = JobStore::new(Database::open_in_memory().unwrap());
        jobs.insert(&Job::pending("job1", "scan.pdf", Some(upload.clone()), 8))
            .unwrap();
        let results = ResultStore::new(temp.path().join("results"));
        let remote = Arc::new(remote);
        let pipeline = Pipeline::new(
            Arc::new(PipelineConfig::default()),
            remote.clone(),
            jobs.clone(),
            results.clone(),
        );
        Harness {
            _temp: temp,
            pipeline,
            jobs,
            results,
            remote,
            upload,
        }
    }

    fn local(h: &Harness, options: SubmitOptions) -> WorkItem {
        WorkItem::new("job1", JobSource::LocalFile(h.upload.clone()), options)
    }

    #[test]
    fn test_full_run_completes_job() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            title: Some(chat("\"Invoice from ACME\"")),
            summary: Some(chat("An invoice.")),
            ..Default::default()
        });
        let options = SubmitOptions {
            do_qna: true,
            ..Default::default()
        };

        let report = h.pipeline.run(local(&h, options)).unwrap();
        assert_eq!(report.pages, Some(2));
        assert_eq!(report.title.as_deref(), Some("Invoice from ACME"));
        assert!(report.skipped.is_empty());

        let doc = h.results.read("job1").unwrap().unwrap();
        assert_eq!(doc.steps, vec!["ocr_done", "qna_done"]);
        assert_eq!(doc.full_markdown.as_deref(), Some("# Invoice 42\n\nTotal: 10"));
        assert_eq!(doc.document_url.as_deref(), Some("https://signed/file-1?sig=x"));
        assert_eq!(doc.qna_summary.as_deref(), Some("An invoice."));
        assert!(doc.ocr.is_some());
        assert!(doc.status.is_none());

        let job = h.jobs.get("job1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages, Some(2));
        assert_eq!(job.title.as_deref(), Some("Invoice from ACME"));
        assert_eq!(job.result_path, Some(h.results.path_for("job1")));

        let calls = h.remote.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["upload:job1_scan.pdf", "signed_url:24", "ocr", "title", "summary"]
        );
    }

    #[test]
    fn test_ocr_failure_fails_job() {
        let h = harness(FakeRemote::default());

        let err = h
            .pipeline
            .run(local(&h, SubmitOptions::default()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(_)));

        let doc = h.results.read("job1").unwrap().unwrap();
        assert_eq!(doc.status.as_deref(), Some("failed"));
        assert!(!doc.error.as_deref().unwrap_or_default().is_empty());
        assert_eq!(h.jobs.get("job1").unwrap().unwrap().status, JobStatus::Failed);

        // Nothing after OCR was attempted.
        assert!(!h.remote.calls.lock().unwrap().contains(&"title".to_string()));
    }

    #[test]
    fn test_upload_failure_fails_job() {
        let h = harness(FakeRemote {
            fail_upload: true,
            ..Default::default()
        });
        let err = h
            .pipeline
            .run(local(&h, SubmitOptions::default()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)));
        assert_eq!(h.jobs.get("job1").unwrap().unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_title_falls_back_to_markdown() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            ..Default::default()
        });

        let report = h.pipeline.run(local(&h, SubmitOptions::default())).unwrap();
        assert_eq!(report.title.as_deref(), Some("Invoice 42"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].stage, "title");
        assert!(matches!(report.skipped[0].reason, SkipReason::RemoteFailed(_)));
    }

    #[test]
    fn test_empty_generated_title_falls_back() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            title: Some(chat("  ''  ")),
            ..Default::default()
        });
        let report = h.pipeline.run(local(&h, SubmitOptions::default())).unwrap();
        assert_eq!(report.title.as_deref(), Some("Invoice 42"));
        assert_eq!(report.skipped[0].reason, SkipReason::EmptyResponse);
    }

    #[test]
    fn test_no_text_and_no_title_still_completes() {
        let h = harness(FakeRemote {
            ocr: Some(json!({"pages": []})),
            ..Default::default()
        });
        let report = h.pipeline.run(local(&h, SubmitOptions::default())).unwrap();
        assert!(report.title.is_none());

        let doc = h.results.read("job1").unwrap().unwrap();
        assert!(doc.full_markdown.is_none());
        assert!(doc.title.is_none());
        assert_eq!(h.jobs.get("job1").unwrap().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_qna_failure_is_absorbed() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            title: Some(chat("Invoice")),
            ..Default::default()
        });
        let options = SubmitOptions {
            do_qna: true,
            ..Default::default()
        };

        let report = h.pipeline.run(local(&h, options)).unwrap();
        assert_eq!(report.skipped[0].stage, "qna_summary");

        let doc = h.results.read("job1").unwrap().unwrap();
        assert_eq!(doc.steps, vec!["ocr_done"]);
        assert!(doc.qna_summary.is_none());
        assert_eq!(h.jobs.get("job1").unwrap().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_annotations_recorded() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            title: Some(chat("Invoice")),
            annotation: Some(json!({"document_annotation": "{\"total\": 10}"})),
            ..Default::default()
        });
        let options = SubmitOptions {
            do_annotations: true,
            annotation_schema: Some(json!({"type": "object"})),
            do_qna: false,
        };

        h.pipeline.run(local(&h, options)).unwrap();
        let doc = h.results.read("job1").unwrap().unwrap();
        assert_eq!(doc.steps, vec!["ocr_done", "annotations_done"]);
        assert!(doc.annotations.is_some());
    }

    #[test]
    fn test_annotation_failure_is_fatal_and_keeps_title() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            title: Some(chat("Invoice")),
            ..Default::default()
        });
        let options = SubmitOptions {
            do_annotations: true,
            annotation_schema: Some(json!({"type": "object"})),
            do_qna: true,
        };

        let err = h.pipeline.run(local(&h, options)).unwrap_err();
        assert!(matches!(err, PipelineError::Annotation(_)));

        let job = h.jobs.get("job1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.title.as_deref(), Some("Invoice"));
        assert_eq!(job.pages, Some(2));
        assert!(!h.remote.calls.lock().unwrap().contains(&"summary".to_string()));
    }

    #[test]
    fn test_remote_url_skips_upload() {
        let h = harness(FakeRemote {
            ocr: Some(ocr_pages()),
            title: Some(chat("Doc")),
            ..Default::default()
        });
        let item = WorkItem::new(
            "job1",
            JobSource::RemoteUrl("https://example.test/doc.pdf".to_string()),
            SubmitOptions::default(),
        );

        h.pipeline.run(item).unwrap();
        let calls = h.remote.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["ocr", "title"]);
        let doc = h.results.read("job1").unwrap().unwrap();
        assert_eq!(doc.document_url.as_deref(), Some("https://example.test/doc.pdf"));
    }

    #[test]
    fn test_missing_source_file_fails_job() {
        let h = harness(FakeRemote::default());
        std::fs::remove_file(&h.upload).unwrap();

        let err = h
            .pipeline
            .run(local(&h, SubmitOptions::default()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ReadSource { .. }));
        assert!(h.remote.calls.lock().unwrap().is_empty());
    }
}
