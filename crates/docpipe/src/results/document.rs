use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status value written into failure documents.
pub const FAILED_STATUS: &str = "failed";

/// Pipeline stage markers recorded in [`ResultDocument::steps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    OcrDone,
    AnnotationsDone,
    QnaDone,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::OcrDone => "ocr_done",
            Step::AnnotationsDone => "annotations_done",
            Step::QnaDone => "qna_done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaEntry {
    pub question: String,
    pub answer: String,
}

/// The persisted outcome of a job.
///
/// Every field is optional so partially populated and legacy documents load.
/// Keys this struct does not know about land in `extra` and are written back
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    /// Raw OCR response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qna_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qna_history: Vec<QnaEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultDocument {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            ..Default::default()
        }
    }

    /// A failure document carries nothing but the status and the error.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: Some(FAILED_STATUS.to_string()),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn mark(&mut self, step: Step) {
        self.steps.push(step.as_str().to_string());
    }

    pub fn has_step(&self, step: Step) -> bool {
        self.steps.iter().any(|s| s == step.as_str())
    }

    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some(FAILED_STATUS)
    }

    /// Status reported to clients. A document without a status is a success.
    pub fn effective_status(&self) -> &str {
        self.status.as_deref().unwrap_or("completed")
    }
}
