//! Client error types

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Local file missing/unreadable, or a part, finalize or single-shot upload failed
    #[error("Upload failed for {file}: {message}")]
    Upload { file: String, message: String },

    /// Signed URL request failed
    #[error("Signing failed for {file}: {message}")]
    Signing { file: String, message: String },

    /// Job reached a terminal status carrying an error
    #[error("Job {job_id} failed: {message}")]
    Job { job_id: String, message: String },

    /// Poll loop exceeded its deadline
    #[error("Timed out after {elapsed:?} waiting for job {job_id}")]
    Timeout { job_id: String, elapsed: Duration },

    /// Caller-supplied cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Webhook signature mismatch or malformed headers
    #[error("Webhook verification failed: {0}")]
    Verification(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Build an upload error for the given logical file name
    pub fn upload(file: impl Into<String>, message: impl ToString) -> Self {
        Self::Upload {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Build a signing error for the given object name
    pub fn signing(file: impl Into<String>, message: impl ToString) -> Self {
        Self::Signing {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Parse a service error from a JSON response body
    pub fn from_api_body(body: &str, status: u16) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                ["message", "error", "detail"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        Self::Api { status, message }
    }

    /// Check if this error came from the caller's cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this is a poll deadline error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an upload failure the caller may resubmit
    pub fn is_upload_failure(&self) -> bool {
        matches!(self, Self::Upload { .. })
    }

    /// Check if this is a webhook verification failure
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_error_message() {
        let body = r#"{"error": "organization not found", "code": 404}"#;

        match ClientError::from_api_body(body, 404) {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "organization not found");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_api_error_plain_body() {
        match ClientError::from_api_body("", 502) {
            ClientError::Api { message, .. } => assert_eq!(message, "HTTP 502"),
            other => panic!("Expected Api error, got {other:?}"),
        }

        match ClientError::from_api_body("upstream exploded", 500) {
            ClientError::Api { message, .. } => assert_eq!(message, "upstream exploded"),
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_kinds_carry_identifiers() {
        let err = ClientError::upload("talk.mp4", "connection reset");
        assert!(err.is_upload_failure());
        assert!(err.to_string().contains("talk.mp4"));

        let err = ClientError::Job {
            job_id: "job-42".to_string(),
            message: "unsupported codec".to_string(),
        };
        assert!(err.to_string().contains("job-42"));
        assert!(err.to_string().contains("unsupported codec"));

        assert!(ClientError::Cancelled.is_cancelled());
        assert!(ClientError::Verification("missing header".into()).is_verification_failure());
    }
}
