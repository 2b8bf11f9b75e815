//! # Scribe Client SDK
//!
//! A client SDK for a remote transcription service.
//!
//! ## Features
//!
//! - **Large uploads**: Local media above a threshold goes up as a multipart
//!   upload with a bounded number of parts in flight
//! - **Signed URLs**: Uploaded files are exchanged for time-limited URLs the
//!   service can fetch
//! - **Job polling**: Wait for a job with a deadline and cooperative cancellation
//! - **Webhooks**: HMAC-SHA256 verification of inbound notifications
//!
//! ## Example
//!
//! ```rust,ignore
//! use scribe_client::{Config, ScribeClient, TranscriptionOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ScribeClient::new(
//!         Config::new("https://api.example.com", "acme").with_api_key("your-api-key"),
//!     )?;
//!
//!     // Uploads the file if needed, submits the job and waits for it
//!     let job = client
//!         .transcribe(
//!             "~/recordings/standup.m4a",
//!             TranscriptionOptions::new().with_language("en"),
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("{}: {:?}", job.status, job.output);
//!     Ok(())
//! }
//! ```

mod chunker;
mod client;
mod config;
mod error;
mod limiter;
mod multipart;
mod poller;
mod source;
mod types;
mod upload;
mod webhook;

pub use chunker::{ByteRange, ChunkPlan, ChunkReader, FileChunk};
pub use client::ScribeClient;
pub use config::{
    Config, DEFAULT_MAX_CONCURRENT_PARTS, DEFAULT_MULTIPART_PART_SIZE, DEFAULT_MULTIPART_THRESHOLD,
    DEFAULT_SIGNED_URL_EXPIRY_SECS,
};
pub use error::{ClientError, Result};
pub use limiter::{ConcurrencyLimiter, LimiterPermit, OwnedLimiterPermit};
pub use multipart::{
    upload_large_file, MultipartUpload, PartUploader, ProgressCallback, UploadProgress,
    UploadSession, UploadState,
};
pub use poller::JobPoller;
pub use source::{resolve_local_path, Source, REMOTE_SCHEMES};
pub use types::*;
pub use webhook::{
    verify_webhook, WebhookEnvelope, WebhookVerifier, DEFAULT_TOLERANCE, WEBHOOK_ID_HEADER,
    WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER,
};

// Re-exported so callers can cancel without depending on tokio-util directly
pub use tokio_util::sync::CancellationToken;
