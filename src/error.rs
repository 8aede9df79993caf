use thiserror::Error;

/// Main error type for kgquiz
#[derive(Error, Debug)]
pub enum KgquizError {
    /// A backend service answered with an error payload or a non-success status
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Transport-level HTTP failures
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Operation not allowed in the current session state
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl KgquizError {
    /// True for failures that originate in a backend service, whether the
    /// transport broke or the service returned an error payload.
    pub fn is_upstream(&self) -> bool {
        matches!(self, KgquizError::Upstream(_) | KgquizError::Http(_))
    }
}

/// Convenient Result type using KgquizError
pub type Result<T> = std::result::Result<T, KgquizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KgquizError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KgquizError = io_err.into();
        assert!(matches!(err, KgquizError::Io(_)));
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: KgquizError = json_err.into();
        assert!(matches!(err, KgquizError::Json(_)));
    }

    #[test]
    fn test_upstream_classification() {
        assert!(KgquizError::Upstream("boom".to_string()).is_upstream());
        assert!(!KgquizError::InvalidInput("x".to_string()).is_upstream());
        assert!(!KgquizError::Conflict("x".to_string()).is_upstream());
    }
}
