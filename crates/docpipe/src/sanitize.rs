//! Helpers for sanitizing data before it enters logs and span attributes.
//!
//! Signed document URLs carry bearer-equivalent tokens in their query string
//! and upload paths reveal the local layout; neither belongs in a log line.

use std::path::Path;

/// Maximum length of a remote error body kept in error messages.
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Drops the query string and fragment of a URL.
///
/// - `https://files.example/doc?sig=abc` → `https://files.example/doc?****`
/// - `https://files.example/doc` → unchanged
pub fn redact_url(url: &str) -> String {
    let cut = url.find(['?', '#']);
    match cut {
        Some(pos) => format!("{}?****", &url[..pos]),
        None => url.to_string(),
    }
}

/// Truncates a remote response body on a char boundary.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

/// Reduces an uploaded filename to a safe single path component.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/srv/data/uploads/abc_invoice.pdf")),
            "abc_invoice.pdf"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_url_strips_signature() {
        assert_eq!(
            redact_url("https://files.example/doc.pdf?X-Sig=abc&exp=1"),
            "https://files.example/doc.pdf?****"
        );
    }

    #[test]
    fn test_redact_url_without_query() {
        assert_eq!(
            redact_url("https://files.example/doc.pdf"),
            "https://files.example/doc.pdf"
        );
    }

    #[test]
    fn test_truncate_body_multibyte() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("... (truncated)"));
        assert_eq!(
            truncated.chars().filter(|c| *c == 'é').count(),
            MAX_ERROR_BODY_LENGTH
        );
    }

    #[test]
    fn test_truncate_body_short() {
        assert_eq!(truncate_body("quota exceeded"), "quota exceeded");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report 2024.pdf"), "report_2024.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\scan.png"), "scan.png");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }
}
