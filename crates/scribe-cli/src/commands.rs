//! Subcommand implementations

use crate::cli::{Command, TranscribeArgs, VerifyWebhookArgs};
use crate::settings::Settings;
use anyhow::{Context, Result};
use scribe_client::{
    CancellationToken, ListJobsOptions, ProgressCallback, ScribeClient, Source, TranscriptionJob,
    TranscriptionOptions, UploadProgress, WebhookEnvelope, WebhookVerifier,
};
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// Run one subcommand to completion
pub async fn run(command: Command, settings: &Settings, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Transcribe(args) => transcribe(&connect(settings)?, args, cancel).await,
        Command::Upload { source } => upload(&connect(settings)?, &source, cancel).await,
        Command::Get { job_id } => print_json(&connect(settings)?.get_job(&job_id).await?),
        Command::List { page_size, page_token } => {
            let page = connect(settings)?
                .list_jobs(&ListJobsOptions { page_size, page_token })
                .await?;
            print_json(&page.jobs)?;
            if let Some(token) = page.next_page_token {
                eprintln!("More jobs available: --page-token {}", token);
            }
            Ok(())
        }
        Command::Stop { job_id } => print_json(&connect(settings)?.stop_job(&job_id).await?),
        Command::VerifyWebhook(args) => verify_webhook(args, settings).await,
    }
}

fn connect(settings: &Settings) -> Result<ScribeClient> {
    ScribeClient::new(settings.client_config()?).context("failed to build client")
}

async fn upload(client: &ScribeClient, source: &str, cancel: &CancellationToken) -> Result<()> {
    let path = match Source::parse(source)? {
        Source::Local(path) => path,
        Source::Remote(url) => anyhow::bail!("{} is already remote; nothing to upload", url),
    };

    let progress: ProgressCallback = Box::new(log_progress);
    let name = client
        .upload_file(&path, cancel, Some(&progress))
        .await
        .with_context(|| format!("failed to upload {}", path.display()))?;
    let url = client.sign_file(&name).await?;
    println!("{}", url);
    Ok(())
}

async fn transcribe(
    client: &ScribeClient,
    args: TranscribeArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut options = TranscriptionOptions::new();
    if let Some(language) = args.language {
        options = options.with_language(language);
    }
    if let Some(model) = args.model {
        options = options.with_model(model);
    }
    if let Some(url) = args.webhook_url {
        options = options.with_webhook(url);
    }

    let job: TranscriptionJob = if args.no_wait {
        let url = client.resolve_source(&args.source, cancel).await?;
        client
            .create_job(&TranscriptionOptions { url, ..options })
            .await?
    } else {
        client
            .transcribe(&args.source, options, cancel)
            .await
            .with_context(|| format!("transcription of {} did not complete", args.source))?
    };

    info!(job_id = %job.id, status = %job.status, "Done");
    print_json(&job)
}

async fn verify_webhook(args: VerifyWebhookArgs, settings: &Settings) -> Result<()> {
    let secret = args
        .secret
        .as_deref()
        .or(settings.webhook_secret.as_deref())
        .context("no webhook secret (set --secret or SCRIBE_WEBHOOK_SECRET)")?;
    let payload = tokio::fs::read(&args.payload)
        .await
        .with_context(|| format!("failed to read {}", args.payload.display()))?;

    let mut verifier = WebhookVerifier::new(secret)?;
    if args.ignore_timestamp {
        verifier = verifier.with_tolerance(None);
    }
    let envelope = WebhookEnvelope::new(args.id, args.timestamp, args.signature, payload);
    verifier.verify(&envelope)?;

    println!("Signature valid");
    Ok(())
}

fn log_progress(progress: UploadProgress) {
    info!(
        parts_completed = progress.parts_completed,
        total_parts = progress.total_parts,
        percent = progress.percentage(),
        "Upload progress"
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
