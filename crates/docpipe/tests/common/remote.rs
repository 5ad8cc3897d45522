//! Scripted remote document service.
//!
//! Each operation answers from a canned response; `None` makes it fail with a
//! 503. Calls are recorded in order so tests can assert what was sent.

#![allow(dead_code)]

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde_json::{json, Value};

use docpipe::pipeline::title::{SUMMARY_PROMPT, TITLE_PROMPT};
use docpipe::remote::{ChatMessage, ContentChunk, FileHandle, OcrRequest};
use docpipe::{RemoteError, RemoteService};

/// A chat completion carrying `content` as the assistant message.
pub fn chat_reply(content: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

/// An OCR response with one markdown page per entry.
pub fn ocr_reply(pages: &[&str], pages_processed: u32) -> Value {
    let pages: Vec<Value> = pages
        .iter()
        .enumerate()
        .map(|(i, md)| json!({"index": i, "markdown": md}))
        .collect();
    json!({"pages": pages, "usage_info": {"pages_processed": pages_processed}})
}

fn unavailable(operation: &'static str) -> RemoteError {
    RemoteError::Status {
        operation,
        status: 503,
        body: "service unavailable".to_string(),
    }
}

pub struct ScriptedRemote {
    pub ocr: Mutex<Option<Value>>,
    pub annotation: Mutex<Option<Value>>,
    pub title: Mutex<Option<Value>>,
    pub summary: Mutex<Option<Value>>,
    pub answer: Mutex<Option<Value>>,
    pub fail_upload: Mutex<bool>,
    pub panic_on_ocr: Mutex<bool>,
    calls: Mutex<Vec<String>>,
    questions: Mutex<Vec<(String, String)>>,
    gate: Mutex<Option<Receiver<()>>>,
}

impl Default for ScriptedRemote {
    /// A remote where every stage succeeds.
    fn default() -> Self {
        Self {
            ocr: Mutex::new(Some(ocr_reply(&["# Quarterly Report\n\nRevenue grew."], 1))),
            annotation: Mutex::new(Some(json!({"document_annotation": {"kind": "report"}}))),
            title: Mutex::new(Some(chat_reply("Quarterly Revenue Report"))),
            summary: Mutex::new(Some(chat_reply("Revenue grew this quarter."))),
            answer: Mutex::new(Some(chat_reply("It grew."))),
            fail_upload: Mutex::new(false),
            panic_on_ocr: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }
}

impl ScriptedRemote {
    /// Blocks OCR until the returned sender is used or dropped.
    pub fn hold_ocr(&self) -> Sender<()> {
        let (tx, rx) = bounded(0);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// `(question, document_url)` pairs sent as free-form questions.
    pub fn questions(&self) -> Vec<(String, String)> {
        self.questions.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl RemoteService for ScriptedRemote {
    fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<FileHandle, RemoteError> {
        self.record(format!("upload:{}:{}", filename, bytes.len()));
        if *self.fail_upload.lock().unwrap() {
            return Err(unavailable("file upload"));
        }
        Ok(FileHandle {
            id: format!("file-{}", self.calls.lock().unwrap().len()),
        })
    }

    fn signed_url(&self, handle: &FileHandle, expiry_hours: u32) -> Result<String, RemoteError> {
        self.record(format!("signed_url:{}", expiry_hours));
        Ok(format!("https://files.test/{}?expires={}h", handle.id, expiry_hours))
    }

    fn ocr(&self, request: &OcrRequest) -> Result<Value, RemoteError> {
        if request.bbox_annotation_format.is_some() {
            self.record("annotate");
            return self
                .annotation
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| unavailable("ocr"));
        }

        let should_panic = *self.panic_on_ocr.lock().unwrap();
        if should_panic {
            panic!("ocr backend crashed");
        }

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        self.record("ocr");
        self.ocr
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| unavailable("ocr"))
    }

    fn chat(&self, _model: &str, messages: &[ChatMessage]) -> Result<Value, RemoteError> {
        let mut text = String::new();
        let mut url = String::new();
        for chunk in messages.iter().flat_map(|m| m.content.iter()) {
            match chunk {
                ContentChunk::Text { text: t } => text = t.clone(),
                ContentChunk::DocumentUrl { document_url } => url = document_url.clone(),
            }
        }

        let reply = if text == TITLE_PROMPT {
            self.record("title");
            self.title.lock().unwrap().clone()
        } else if text == SUMMARY_PROMPT {
            self.record("summary");
            self.summary.lock().unwrap().clone()
        } else {
            self.record("ask");
            self.questions.lock().unwrap().push((text, url));
            self.answer.lock().unwrap().clone()
        };
        reply.ok_or_else(|| unavailable("chat completion"))
    }
}
