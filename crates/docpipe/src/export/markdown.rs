use crate::results::ResultDocument;

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Picks the markdown body for an export.
///
/// Prefers the OCR markdown, then the summary, then a title/summary stub.
pub fn markdown_body(doc: &ResultDocument) -> String {
    if let Some(md) = non_empty(&doc.full_markdown).or_else(|| non_empty(&doc.qna_summary)) {
        return md.to_string();
    }
    format!(
        "{}\n\n{}",
        doc.title.as_deref().unwrap_or_default(),
        doc.qna_summary.as_deref().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_full_markdown() {
        let doc = ResultDocument {
            full_markdown: Some("# Body".to_string()),
            qna_summary: Some("Summary".to_string()),
            ..Default::default()
        };
        assert_eq!(markdown_body(&doc), "# Body");
    }

    #[test]
    fn test_falls_back_to_summary() {
        let doc = ResultDocument {
            full_markdown: Some(String::new()),
            qna_summary: Some("Summary".to_string()),
            ..Default::default()
        };
        assert_eq!(markdown_body(&doc), "Summary");
    }

    #[test]
    fn test_falls_back_to_title_stub() {
        let doc = ResultDocument {
            title: Some("Report".to_string()),
            ..Default::default()
        };
        assert_eq!(markdown_body(&doc), "Report\n\n");
        assert_eq!(markdown_body(&ResultDocument::default()), "\n\n");
    }
}
