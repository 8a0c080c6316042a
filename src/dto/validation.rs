//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a quiz source is an absolute http(s) URL.
///
/// # Examples
///
/// ```ignore
/// validate_quiz_source("https://example.org/quiz.json") // Ok
/// validate_quiz_source("ftp://example.org/quiz.json")   // Err - scheme
/// validate_quiz_source("quiz.json")                     // Err - relative
/// ```
pub fn validate_quiz_source(url: &str) -> Result<(), ValidationError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        let mut err = ValidationError::new("quiz_source_scheme");
        err.message = Some("Quiz source must be an absolute http(s) URL".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that every answer option carries visible text.
pub fn validate_options(options: &[String; 4]) -> Result<(), ValidationError> {
    if options.iter().any(|option| option.trim().is_empty()) {
        let mut err = ValidationError::new("blank_option");
        err.message = Some("Answer options must not be blank".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quiz_source_valid() {
        assert!(validate_quiz_source("http://example.org/quiz.json").is_ok());
        assert!(validate_quiz_source("https://example.org/q/1.json").is_ok());
    }

    #[test]
    fn test_validate_quiz_source_invalid() {
        assert!(validate_quiz_source("ftp://example.org/quiz.json").is_err());
        assert!(validate_quiz_source("quiz.json").is_err());
        assert!(validate_quiz_source("").is_err());
    }

    #[test]
    fn test_validate_options() {
        let good: [String; 4] = ["a".into(), "b".into(), "c".into(), "d".into()];
        assert!(validate_options(&good).is_ok());

        let blank: [String; 4] = ["a".into(), "  ".into(), "c".into(), "d".into()];
        assert!(validate_options(&blank).is_err());
    }
}
