use std::path::PathBuf;

use serde_json::Value;

use crate::error::ServiceError;

/// Where the pipeline gets the document from.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSource {
    /// An upload stored on local disk.
    LocalFile(PathBuf),
    /// A document the remote service can fetch by itself.
    RemoteUrl(String),
}

impl JobSource {
    /// Log-safe description of the source.
    pub fn describe(&self) -> String {
        match self {
            JobSource::LocalFile(path) => crate::sanitize::redact_path(path),
            JobSource::RemoteUrl(url) => crate::sanitize::redact_url(url),
        }
    }
}

/// Enrichment switches chosen at submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitOptions {
    pub do_annotations: bool,
    pub annotation_schema: Option<Value>,
    pub do_qna: bool,
}

impl SubmitOptions {
    /// Builds options from raw client input.
    ///
    /// The annotation schema must be JSON and a valid JSON Schema; it is
    /// checked here, before anything is stored.
    pub fn parse(
        do_annotations: bool,
        annotation_schema: Option<&str>,
        do_qna: bool,
    ) -> Result<Self, ServiceError> {
        let annotation_schema = match annotation_schema.map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let schema: Value = serde_json::from_str(raw).map_err(|e| {
                    ServiceError::InvalidInput(format!("annotation_schema must be valid JSON: {}", e))
                })?;
                jsonschema::validator_for(&schema).map_err(|e| {
                    ServiceError::InvalidInput(format!(
                        "annotation_schema is not a valid JSON Schema: {}",
                        e
                    ))
                })?;
                Some(schema)
            }
        };

        Ok(Self {
            do_annotations,
            annotation_schema,
            do_qna,
        })
    }

    /// The schema to annotate with, if annotations were requested.
    pub fn annotation_schema(&self) -> Option<&Value> {
        if self.do_annotations {
            self.annotation_schema.as_ref()
        } else {
            None
        }
    }
}

/// One queued unit of work: a job id plus everything the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub job_id: String,
    pub source: JobSource,
    pub options: SubmitOptions,
}

impl WorkItem {
    pub fn new(job_id: impl Into<String>, source: JobSource, options: SubmitOptions) -> Self {
        Self {
            job_id: job_id.into(),
            source,
            options,
        }
    }
}
