//! Command line arguments

use crate::settings::Settings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(about = "Submit media for transcription and track the resulting jobs")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true, env = "SCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Service endpoint URL
    #[arg(long, global = true, env = "SCRIBE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Organization that owns files and jobs
    #[arg(short, long, global = true, env = "SCRIBE_ORGANIZATION")]
    pub organization: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, global = true, env = "SCRIBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "SCRIBE_DEBUG")]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transcribe a local file or remote URL
    Transcribe(TranscribeArgs),
    /// Upload a local file and print a signed URL for it
    Upload {
        /// Local path or file:// URL; `~` and `$VAR` are expanded
        source: String,
    },
    /// Show a job
    Get {
        job_id: String,
    },
    /// List jobs
    List {
        /// Maximum number of jobs to return
        #[arg(long)]
        page_size: Option<u32>,
        /// Token from a previous page
        #[arg(long)]
        page_token: Option<String>,
    },
    /// Stop a running job
    Stop {
        job_id: String,
    },
    /// Check the signature of a received webhook
    VerifyWebhook(VerifyWebhookArgs),
}

#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Local path, file:// URL or remote URL (http, https, s3, gs, ftp)
    pub source: String,

    /// Spoken language hint, e.g. "en"
    #[arg(short, long)]
    pub language: Option<String>,

    /// Model to run
    #[arg(short, long)]
    pub model: Option<String>,

    /// URL notified when the job finishes
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Submit the job and return without waiting for it
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Args, Debug)]
pub struct VerifyWebhookArgs {
    /// Shared secret, base64 with optional `whsec_` prefix
    #[arg(long, env = "SCRIBE_WEBHOOK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Value of the webhook-id header
    #[arg(long)]
    pub id: String,

    /// Value of the webhook-timestamp header
    #[arg(long)]
    pub timestamp: String,

    /// Value of the webhook-signature header
    #[arg(long)]
    pub signature: String,

    /// Accept payloads regardless of their timestamp
    #[arg(long)]
    pub ignore_timestamp: bool,

    /// File holding the raw request body
    pub payload: PathBuf,
}

impl Cli {
    /// Apply connection flags over loaded settings
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = Some(endpoint.clone());
        }
        if let Some(org) = &self.organization {
            settings.organization = Some(org.clone());
        }
        if let Some(key) = &self.api_key {
            settings.api_key = Some(key.clone());
        }
    }
}
