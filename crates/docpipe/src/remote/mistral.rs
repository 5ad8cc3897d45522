use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::RemoteConfig;
use crate::sanitize::{redact_url, truncate_body};

use super::{ChatMessage, FileHandle, OcrRequest, RemoteError, RemoteService};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

/// HTTP client for the Mistral files, OCR and chat endpoints.
///
/// Uses a blocking reqwest client; call it from worker threads or
/// `spawn_blocking`, never directly from async code.
pub struct MistralClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for MistralClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MistralClient {
    pub fn new(config: &RemoteConfig, api_key: SecretString) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .map_err(|e| RemoteError::Request {
                operation,
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RemoteError::Status {
                operation,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        response.json::<Value>().map_err(|e| RemoteError::Decode {
            operation,
            reason: e.without_url().to_string(),
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    value: Value,
) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode {
        operation,
        reason: e.to_string(),
    })
}

impl RemoteService for MistralClient {
    fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<FileHandle, RemoteError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| RemoteError::Request {
                operation: "file upload",
                reason: e.to_string(),
            })?;
        let form = Form::new().text("purpose", "ocr").part("file", part);

        log::debug!("Uploading {} to remote file store", filename);
        let value = self.send(
            "file upload",
            self.client.post(self.url("/v1/files")).multipart(form),
        )?;
        let uploaded: UploadResponse = decode("file upload", value)?;
        Ok(FileHandle { id: uploaded.id })
    }

    fn signed_url(&self, handle: &FileHandle, expiry_hours: u32) -> Result<String, RemoteError> {
        let value = self.send(
            "signed url",
            self.client
                .get(self.url(&format!("/v1/files/{}/url", handle.id)))
                .query(&[("expiry", expiry_hours)]),
        )?;
        let signed: SignedUrlResponse = decode("signed url", value)?;
        log::debug!("Signed URL for file {}: {}", handle.id, redact_url(&signed.url));
        Ok(signed.url)
    }

    fn ocr(&self, request: &OcrRequest) -> Result<Value, RemoteError> {
        let mut body = json!({
            "model": request.model,
            "document": {
                "type": "document_url",
                "document_url": request.document_url,
            },
            "include_image_base64": request.include_image_base64,
        });
        if let Some(format) = &request.bbox_annotation_format {
            body["bbox_annotation_format"] = format.clone();
        }

        self.send("ocr", self.client.post(self.url("/v1/ocr")).json(&body))
    }

    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<Value, RemoteError> {
        let body = json!({
            "model": model,
            "messages": messages,
        });
        self.send(
            "chat completion",
            self.client
                .post(self.url("/v1/chat/completions"))
                .json(&body),
        )
    }
}
