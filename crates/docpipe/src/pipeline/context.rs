use std::path::PathBuf;

use serde_json::Value;

use crate::results::{ResultDocument, Step};
use crate::worker::job::WorkItem;

use super::error::{SkipReason, SkippedStage};

/// State accumulated while a job moves through the stages.
pub struct PipelineContext {
    // Input
    pub job: WorkItem,

    // Stage 1 result: guaranteed Some after step_acquire_document
    pub document_url: Option<String>,

    // Stage 2 results
    pub ocr_response: Option<Value>,
    pub full_markdown: Option<String>,
    pub pages: Option<u32>,

    // Stage 3 result
    pub title: Option<String>,

    // Stage 4 result
    pub annotations: Option<Value>,

    // Stage 5 result
    pub qna_summary: Option<String>,

    pub steps: Vec<Step>,
    pub skipped: Vec<SkippedStage>,
}

impl PipelineContext {
    pub fn new(job: WorkItem) -> Self {
        Self {
            job,
            document_url: None,
            ocr_response: None,
            full_markdown: None,
            pages: None,
            title: None,
            annotations: None,
            qna_summary: None,
            steps: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn skip(&mut self, stage: &'static str, reason: SkipReason) {
        tracing::warn!(stage, reason = %reason, "Stage skipped");
        self.skipped.push(SkippedStage { stage, reason });
    }

    /// Builds the success document from everything collected so far.
    pub fn to_document(&self) -> ResultDocument {
        let mut doc = ResultDocument::new(&self.job.job_id);
        doc.document_url = self.document_url.clone();
        for step in &self.steps {
            doc.mark(*step);
        }
        doc.ocr = self.ocr_response.clone();
        doc.full_markdown = self.full_markdown.clone();
        doc.title = self.title.clone();
        doc.annotations = self.annotations.clone();
        doc.qna_summary = self.qna_summary.clone();
        doc
    }
}

/// Summary of a successfully finished job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub result_path: PathBuf,
    pub pages: Option<u32>,
    pub title: Option<String>,
    pub steps: Vec<Step>,
    pub skipped: Vec<SkippedStage>,
}
