//! Title derivation for processed documents.

use std::sync::LazyLock;

use regex::Regex;

/// Longest title kept, in characters.
pub const MAX_TITLE_CHARS: usize = 120;

pub const TITLE_PROMPT: &str = "Create a short descriptive title (max 8 words) for the following document. Return only the title as plain text.";

pub const SUMMARY_PROMPT: &str = "Provide a short summary of the document.";

static RE_HEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s*").unwrap());

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Cleans a model-generated title: trims whitespace, strips surrounding
/// quotes and caps the length. `None` if nothing is left.
pub fn clean_generated_title(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"').trim_matches('\'');
    let title = truncate_chars(cleaned, MAX_TITLE_CHARS);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Derives a title from the first markdown line that still has text once
/// heading markers are removed. Markdown made only of markers yields `None`.
pub fn title_from_markdown(markdown: &str) -> Option<String> {
    for line in markdown.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cleaned = RE_HEADING_MARKER.replace(line, "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            return Some(truncate_chars(cleaned, MAX_TITLE_CHARS));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_generated_title_strips_quotes() {
        assert_eq!(
            clean_generated_title("  \"Quarterly Sales Report\"\n").as_deref(),
            Some("Quarterly Sales Report")
        );
        assert_eq!(
            clean_generated_title("'Lease Agreement'").as_deref(),
            Some("Lease Agreement")
        );
    }

    #[test]
    fn test_clean_generated_title_empty() {
        assert!(clean_generated_title("").is_none());
        assert!(clean_generated_title("  \"\"  ").is_none());
    }

    #[test]
    fn test_clean_generated_title_caps_length_on_chars() {
        let long = "é".repeat(200);
        let title = clean_generated_title(&long).unwrap();
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_title_from_markdown_heading() {
        let md = "\n\n## Invoice 2024-001\n\nTotal: 100";
        assert_eq!(title_from_markdown(md).as_deref(), Some("Invoice 2024-001"));
    }

    #[test]
    fn test_title_from_markdown_plain_line() {
        assert_eq!(
            title_from_markdown("Meeting notes\nsecond").as_deref(),
            Some("Meeting notes")
        );
    }

    #[test]
    fn test_title_from_markdown_only_markers() {
        assert!(title_from_markdown("###\n#").is_none());
        assert!(title_from_markdown("#\n\n## \n").is_none());
        assert!(title_from_markdown("   \n ").is_none());
    }

    #[test]
    fn test_title_from_markdown_caps_length() {
        let md = format!("# {}", "a".repeat(300));
        assert_eq!(title_from_markdown(&md).unwrap().len(), MAX_TITLE_CHARS);
    }
}
