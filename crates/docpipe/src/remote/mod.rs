//! Adapter for the remote OCR/chat document service.
//!
//! The pipeline only sees the [`RemoteService`] trait; [`MistralClient`] is the
//! HTTP implementation. Responses stay as `serde_json::Value` and are read
//! through the helpers in [`extract`].

pub mod extract;
mod mistral;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use mistral::MistralClient;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("{operation} request failed: {reason}")]
    Request {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} failed ({status}): {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} returned an unexpected response: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },
}

/// Identifier of a file uploaded to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub id: String,
}

/// One OCR invocation against a document URL.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRequest {
    pub model: String,
    pub document_url: String,
    pub include_image_base64: bool,
    /// When set, asks the service for structured annotations in this shape.
    pub bbox_annotation_format: Option<Value>,
}

impl OcrRequest {
    pub fn new(model: impl Into<String>, document_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            document_url: document_url.into(),
            include_image_base64: false,
            bbox_annotation_format: None,
        }
    }

    /// Requests annotations conforming to the given JSON Schema.
    pub fn with_annotation_schema(mut self, schema: Value) -> Self {
        self.bbox_annotation_format = Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": schema,
        }));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentChunk {
    Text { text: String },
    DocumentUrl { document_url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentChunk>,
}

impl ChatMessage {
    /// A user turn carrying an instruction and the document it refers to.
    pub fn user_with_document(text: impl Into<String>, document_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![
                ContentChunk::Text { text: text.into() },
                ContentChunk::DocumentUrl {
                    document_url: document_url.into(),
                },
            ],
        }
    }
}

/// Blocking operations offered by the remote document service.
///
/// Implementations are shared across worker threads.
pub trait RemoteService: Send + Sync {
    fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<FileHandle, RemoteError>;

    fn signed_url(&self, handle: &FileHandle, expiry_hours: u32) -> Result<String, RemoteError>;

    fn ocr(&self, request: &OcrRequest) -> Result<Value, RemoteError>;

    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<Value, RemoteError>;
}
