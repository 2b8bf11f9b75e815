//! Transcribe a local file or remote URL and wait for the result
//!
//! This example demonstrates:
//! - Building a client from environment variables
//! - Uploading local media (multipart above the threshold) behind the scenes
//! - Polling the job with Ctrl-C cancellation
//!
//! Run with:
//! SCRIBE_ENDPOINT=https://api.example.com SCRIBE_ORGANIZATION=acme SCRIBE_API_KEY=... \
//!     cargo run --example transcribe_file -- ~/recordings/standup.m4a

use scribe_client::{CancellationToken, ClientError, Config, ScribeClient, TranscriptionOptions};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("scribe_client=debug")
        .init();

    let source = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: transcribe_file <PATH|URL>"))?;

    let endpoint = std::env::var("SCRIBE_ENDPOINT").unwrap_or_else(|_| "http://localhost:8080".into());
    let organization = std::env::var("SCRIBE_ORGANIZATION").unwrap_or_else(|_| "default".into());
    let mut config = Config::new(endpoint, organization)
        .with_polling(Duration::from_secs(3), Duration::from_secs(600));
    if let Ok(key) = std::env::var("SCRIBE_API_KEY") {
        config = config.with_api_key(key);
    }
    let client = ScribeClient::new(config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        on_signal.cancel();
    });

    println!("Transcribing {}...", source);
    match client
        .transcribe(&source, TranscriptionOptions::new().with_language("en"), &cancel)
        .await
    {
        Ok(job) => {
            println!("Job {} finished: {}", job.id, job.status);
            println!("{}", serde_json::to_string_pretty(&job.output)?);
        }
        Err(ClientError::Cancelled) => println!("Cancelled"),
        Err(ClientError::Timeout { job_id, elapsed }) => {
            println!("Job {} still running after {:?}; check later with `scribe get`", job_id, elapsed);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
