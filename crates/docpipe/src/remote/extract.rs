//! Reading text out of remote responses.
//!
//! OCR markdown is extracted in two tiers: a typed read of `pages[].markdown`
//! (or `.text`), then a pattern scan over the serialized response for shapes
//! the typed read does not understand.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static RE_JSON_MARKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""markdown"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static RE_REPR_MARKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)markdown='([^']+)'|markdown="([^"]+)""#).unwrap());

#[derive(Debug, Deserialize)]
struct OcrPages {
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Extracts the document markdown from an OCR response.
///
/// Returns `None` when neither tier finds any text.
pub fn extract_markdown(response: &Value) -> Option<String> {
    markdown_from_pages(response).or_else(|| scan_markdown(&response.to_string()))
}

/// Typed read: every page's `markdown`, else its `text`, joined by blank lines.
pub fn markdown_from_pages(response: &Value) -> Option<String> {
    let parsed = OcrPages::deserialize(response).ok()?;
    let parts: Vec<String> = parsed
        .pages
        .into_iter()
        .filter_map(|page| {
            page.markdown
                .filter(|m| !m.is_empty())
                .or(page.text.filter(|t| !t.is_empty()))
        })
        .collect();
    join_parts(parts)
}

/// Pattern scan over a serialized response.
///
/// Understands JSON (`"markdown": "..."`) and `markdown='...'` renderings.
pub fn scan_markdown(rendered: &str) -> Option<String> {
    let mut parts: Vec<String> = RE_JSON_MARKDOWN
        .captures_iter(rendered)
        .filter_map(|caps| {
            let quoted = format!("\"{}\"", caps.get(1)?.as_str());
            serde_json::from_str::<String>(&quoted).ok()
        })
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        parts = RE_REPR_MARKDOWN
            .captures_iter(rendered)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();
    }
    join_parts(parts)
}

fn join_parts(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Reads `usage_info.pages_processed`.
pub fn pages_processed(response: &Value) -> Option<u32> {
    response
        .get("usage_info")?
        .get("pages_processed")?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
}

/// Reads the first choice's message content from a chat completion.
///
/// Content may be a plain string or a list of chunks; text chunks are concatenated.
pub fn chat_answer(response: &Value) -> Option<String> {
    let content = response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(chunks) => {
            let text: String = chunks
                .iter()
                .filter_map(|chunk| match chunk {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect();
            Some(text)
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
