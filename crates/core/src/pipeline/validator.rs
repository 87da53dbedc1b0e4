//! Source URL validation.

use regex_lite::Regex;

use super::error::PipelineError;

/// Checks that a source URL has the expected shape before any slot is used.
#[derive(Debug, Clone)]
pub struct SourceValidator {
    pattern: Regex,
}

impl SourceValidator {
    /// Compiles `pattern`. Fails with the regex error text.
    pub fn new(pattern: &str) -> Result<Self, String> {
        Regex::new(pattern)
            .map(|pattern| Self { pattern })
            .map_err(|e| e.to_string())
    }

    /// Trims the URL and checks it against the pattern.
    pub fn validate<'a>(&self, source_url: &'a str) -> Result<&'a str, PipelineError> {
        let url = source_url.trim();
        if url.is_empty() {
            return Err(PipelineError::Validation("URL is required".to_string()));
        }
        if url.chars().any(char::is_whitespace) {
            return Err(PipelineError::Validation(
                "URL must not contain whitespace".to_string(),
            ));
        }
        if !self.pattern.is_match(url) {
            return Err(PipelineError::Validation(format!(
                "Unsupported source URL: {}",
                url
            )));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DEFAULT_SOURCE_PATTERN;

    fn validator() -> SourceValidator {
        SourceValidator::new(DEFAULT_SOURCE_PATTERN).unwrap()
    }

    #[test]
    fn test_accepts_youtube_shapes() {
        let v = validator();
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=abc",
            "https://m.youtube.com/watch?v=abc",
            "https://youtu.be/dQw4w9WgXcQ",
            "youtube.com/watch?v=abc",
            "  https://youtu.be/abc  ",
        ] {
            assert!(v.validate(url).is_ok(), "{} should be accepted", url);
        }
        assert_eq!(v.validate(" https://youtu.be/x ").unwrap(), "https://youtu.be/x");
    }

    #[test]
    fn test_rejects_other_input() {
        let v = validator();
        for url in [
            "",
            "   ",
            "https://vimeo.com/123",
            "https://youtube.com/",
            "ftp://youtube.com/watch?v=abc",
            "https://youtu.be/abc def",
            "https://evil.example/?q=youtube.com/watch",
        ] {
            assert!(
                matches!(v.validate(url), Err(PipelineError::Validation(_))),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(SourceValidator::new("(unclosed").is_err());
    }
}
