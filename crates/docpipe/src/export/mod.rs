//! Rendering result documents for download.

mod docx;
mod markdown;

use std::str::FromStr;

use thiserror::Error;

use crate::results::ResultDocument;

pub use docx::render_docx;
pub use markdown::markdown_body;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to build document XML: {0}")]
    Xml(String),

    #[error("Failed to build document archive: {0}")]
    Zip(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported export format '{0}' (expected md or docx)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Docx => "docx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// A rendered export ready to be written or sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders a job's result document in the requested format.
pub fn export_document(
    job_id: &str,
    doc: &ResultDocument,
    format: ExportFormat,
) -> Result<ExportedDocument, ExportError> {
    let body = markdown_body(doc);
    let bytes = match format {
        ExportFormat::Markdown => body.into_bytes(),
        ExportFormat::Docx => render_docx(doc.title.as_deref(), &body)?,
    };

    Ok(ExportedDocument {
        filename: format!("{}.{}", job_id, format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}
