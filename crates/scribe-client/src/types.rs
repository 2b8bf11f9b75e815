//! Common types for the client SDK

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Job lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted, not started
    Pending,
    /// Transcription in progress
    Running,
    /// Finished; output available
    Succeeded,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Status name as sent by the service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job output, present once the job is terminal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    /// The service reported a logical failure
    Error {
        /// Service-reported message
        error: String,
    },
    /// Inline transcript
    Text {
        /// Transcript text
        text: String,
    },
    /// Transcript stored as a file
    File {
        /// Where the result can be downloaded
        url: String,
    },
}

impl JobOutput {
    /// Error message carried by the output, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error } if !error.is_empty() => Some(error),
            _ => None,
        }
    }
}

/// Entry in a job's event history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// What happened
    pub action: String,
    /// When it happened
    pub time: DateTime<Utc>,
}

/// Options sent with a new transcription job
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionOptions {
    /// Media URL the service should fetch
    #[serde(default)]
    pub url: String,
    /// Spoken language hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Model to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// URL notified when the job finishes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Extra service-specific options passed through untouched
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TranscriptionOptions {
    /// Create new empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language hint
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the completion webhook
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }
}

/// Snapshot of a transcription job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionJob {
    /// Job ID
    pub id: String,
    /// Current status
    pub status: JobStatus,
    /// Options the job was created with
    #[serde(default)]
    pub input: Option<TranscriptionOptions>,
    /// Result, once terminal
    #[serde(default)]
    pub output: Option<JobOutput>,
    /// Ordered event history
    #[serde(default)]
    pub events: Vec<JobEvent>,
    /// Creation time
    pub create_time: Option<DateTime<Utc>>,
    /// Last update time
    pub update_time: Option<DateTime<Utc>>,
}

impl TranscriptionJob {
    /// Error message from the output, if the job reported one
    pub fn error_message(&self) -> Option<&str> {
        self.output.as_ref().and_then(JobOutput::error_message)
    }
}

/// Options for listing jobs
#[derive(Clone, Debug, Default)]
pub struct ListJobsOptions {
    /// Maximum jobs to return
    pub page_size: Option<u32>,
    /// Token from a previous page
    pub page_token: Option<String>,
}

/// Result of listing jobs
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsResult {
    /// Jobs on this page
    #[serde(default)]
    pub jobs: Vec<TranscriptionJob>,
    /// Token for fetching the next page
    pub next_page_token: Option<String>,
}

/// Part that finished uploading
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    /// 1-based part number
    pub part_number: u32,
    /// Completion token returned by the service
    pub etag: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionResponse {
    pub upload_id: String,
}

#[derive(Serialize)]
pub(crate) struct CompleteSessionRequest<'a> {
    pub parts: &'a [CompletedPart],
}

#[derive(Deserialize)]
pub(crate) struct UrlResponse {
    pub url: String,
}

#[derive(Serialize)]
pub(crate) struct SignFileRequest {
    pub method: &'static str,
    pub exp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_running_job() {
        let json = r#"{
            "id": "job-1",
            "status": "Running",
            "input": {"url": "https://cdn.example.com/a.wav", "language": "en"},
            "events": [{"action": "created", "time": "2024-01-01T00:00:00Z"}],
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:05Z"
        }"#;

        let job: TranscriptionJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.status.is_terminal());
        assert!(job.output.is_none());
        assert_eq!(job.events.len(), 1);
        assert_eq!(job.input.unwrap().language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_outputs() {
        let text: JobOutput = serde_json::from_str(r#"{"text": "hello world"}"#).unwrap();
        assert_eq!(text, JobOutput::Text { text: "hello world".into() });

        let file: JobOutput = serde_json::from_str(r#"{"url": "https://x/y.json"}"#).unwrap();
        assert!(matches!(file, JobOutput::File { .. }));

        let error: JobOutput = serde_json::from_str(r#"{"error": "bad audio"}"#).unwrap();
        assert_eq!(error.error_message(), Some("bad audio"));

        let blank: JobOutput = serde_json::from_str(r#"{"error": ""}"#).unwrap();
        assert_eq!(blank.error_message(), None);
    }

    #[test]
    fn test_completed_part_wire_format() {
        let part = CompletedPart { part_number: 2, etag: "abc".into() };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json, serde_json::json!({"partNumber": 2, "etag": "abc"}));
    }
}
