//! Text preparation for embedding and prompt input.

/// Maximum input length (characters, not tokens)
const MAX_CONTENT_LENGTH: usize = 512;

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Trim and truncate note text. `None` when nothing is left.
pub fn preprocess_content(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(truncate_content(text))
}

/// Truncate content to MAX_CONTENT_LENGTH characters, adding ellipsis if truncated.
fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_LENGTH {
        return content.to_string();
    }

    let max_chars = MAX_CONTENT_LENGTH - TRUNCATION_SUFFIX.len();
    let truncated: String = content.chars().take(max_chars).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_returns_none() {
        assert!(preprocess_content("").is_none());
        assert!(preprocess_content("  \n\t ").is_none());
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(preprocess_content("  note body \n"), Some("note body".to_string()));
    }

    #[test]
    fn test_truncation() {
        let content = preprocess_content(&"x".repeat(600)).unwrap();
        assert_eq!(content.chars().count(), MAX_CONTENT_LENGTH);
        assert!(content.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let content = preprocess_content(&"é".repeat(600)).unwrap();
        assert_eq!(content.chars().count(), MAX_CONTENT_LENGTH);
    }
}
