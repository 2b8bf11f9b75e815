//! Multipart upload support for large files
//!
//! A session moves through `Created → PartsInFlight → Finalizing → Complete`,
//! or to `Failed` from any state. Parts are uploaded concurrently, bounded by
//! a [`ConcurrencyLimiter`], and handed to finalize in ascending part order
//! regardless of the order they finished in.
//!
//! A failed session is not aborted on the service side; the caller may
//! resubmit the whole file.

use crate::{
    chunker::{ChunkPlan, ChunkReader},
    limiter::ConcurrencyLimiter,
    types::{CompleteSessionRequest, CompletedPart, CreateSessionResponse},
    ClientError, Result, ScribeClient,
};
use bytes::Bytes;
use reqwest::header;
use serde::Deserialize;
use std::path::Path;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Upload progress information
#[derive(Clone, Debug)]
pub struct UploadProgress {
    /// Bytes uploaded so far
    pub bytes_uploaded: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
    /// Parts finished so far
    pub parts_completed: u32,
    /// Total number of parts
    pub total_parts: u32,
}

impl UploadProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_uploaded as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Lifecycle of a multipart session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    /// Session exists, no parts sent yet
    Created,
    /// Parts are being uploaded
    PartsInFlight,
    /// Finalize call in progress
    Finalizing,
    /// Service assembled the object
    Complete,
    /// Something went wrong; the session is abandoned
    Failed,
}

/// A successfully finalized multipart upload
#[derive(Clone, Debug)]
pub struct UploadSession {
    /// Session identifier issued by the service
    pub upload_id: String,
    /// Name of the object the parts were assembled into
    pub target_path: String,
    /// How the file was split
    pub plan: ChunkPlan,
}

/// Uploads single parts of a multipart session
#[derive(Clone, Debug)]
pub struct PartUploader {
    client: ScribeClient,
    file_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartResponse {
    etag: String,
    #[serde(default)]
    part_number: Option<u32>,
}

impl PartUploader {
    /// Create an uploader for parts of `file_name`
    pub fn new(client: ScribeClient, file_name: impl Into<String>) -> Self {
        Self {
            client,
            file_name: file_name.into(),
        }
    }

    /// Upload one part and return its completion token
    pub async fn upload(&self, upload_id: &str, part_number: u32, data: Bytes) -> Result<CompletedPart> {
        let url = self.client.config().org_url(&format!(
            "file_parts/{}",
            urlencoding::encode(&self.file_name)
        ));
        let size = data.len();

        let req = self
            .client
            .http()
            .put(&url)
            .query(&[("uploadId", upload_id.to_string()), ("partNumber", part_number.to_string())])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data);

        let response = self
            .client
            .send(req)
            .await
            .map_err(|e| ClientError::upload(&self.file_name, format!("part {}: {}", part_number, e)))?;

        let body: PartResponse = response.json().await.map_err(|e| {
            ClientError::upload(&self.file_name, format!("part {}: invalid response: {}", part_number, e))
        })?;

        if let Some(returned) = body.part_number {
            if returned != part_number {
                return Err(ClientError::upload(
                    &self.file_name,
                    format!("sent part {} but service acknowledged part {}", part_number, returned),
                ));
            }
        }

        debug!(file = %self.file_name, part_number, size, "Part uploaded");
        Ok(CompletedPart {
            part_number,
            etag: body.etag,
        })
    }
}

/// Multipart upload handle
pub struct MultipartUpload {
    client: ScribeClient,
    file_name: String,
    upload_id: String,
    state: UploadState,
    parts: Vec<CompletedPart>,
}

impl MultipartUpload {
    /// Start a new multipart upload session
    pub async fn create(client: &ScribeClient, file_name: &str) -> Result<Self> {
        let upload_id = initiate_upload(client, file_name).await?;
        debug!(file = %file_name, %upload_id, "Multipart session created");

        Ok(Self {
            client: client.clone(),
            file_name: file_name.to_string(),
            upload_id,
            state: UploadState::Created,
            parts: Vec::new(),
        })
    }

    /// Uploader bound to this session's file
    pub fn part_uploader(&self) -> PartUploader {
        PartUploader::new(self.client.clone(), self.file_name.clone())
    }

    /// Upload a part and record its completion token
    pub async fn upload_part(&mut self, part_number: u32, data: Bytes) -> Result<()> {
        self.transition(UploadState::PartsInFlight);
        let uploader = self.part_uploader();
        match uploader.upload(&self.upload_id, part_number, data).await {
            Ok(part) => {
                self.record_part(part);
                Ok(())
            }
            Err(e) => {
                self.transition(UploadState::Failed);
                Err(e)
            }
        }
    }

    /// Record a part uploaded elsewhere (e.g. by a spawned task)
    pub fn record_part(&mut self, part: CompletedPart) {
        self.parts.push(part);
    }

    /// Finalize the session with every recorded part, in ascending order
    pub async fn complete(&mut self) -> Result<()> {
        self.transition(UploadState::Finalizing);

        let parts = match ordered_parts(std::mem::take(&mut self.parts)) {
            Ok(parts) => parts,
            Err(msg) => {
                self.transition(UploadState::Failed);
                return Err(ClientError::upload(&self.file_name, msg));
            }
        };
        let result = complete_upload(&self.client, &self.file_name, &self.upload_id, &parts).await;
        self.parts = parts;

        match result {
            Ok(()) => {
                self.transition(UploadState::Complete);
                Ok(())
            }
            Err(e) => {
                self.transition(UploadState::Failed);
                Err(e)
            }
        }
    }

    /// Mark the session as abandoned
    pub fn fail(&mut self) {
        self.transition(UploadState::Failed);
    }

    /// Get the upload ID
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Get the number of completed parts
    pub fn completed_parts(&self) -> usize {
        self.parts.len()
    }

    fn transition(&mut self, next: UploadState) {
        if self.state != next {
            debug!(upload_id = %self.upload_id, from = ?self.state, to = ?next, "Multipart state change");
            self.state = next;
        }
    }
}

/// Upload a local file using a multipart session
///
/// Reads are sequential; each part upload runs as its own task holding a
/// limiter permit until the upload settles. The first failure (or the
/// cancellation token) stops the upload and aborts parts still in flight.
pub async fn upload_large_file(
    client: &ScribeClient,
    path: &Path,
    file_name: &str,
    cancel: &CancellationToken,
    progress: Option<&ProgressCallback>,
) -> Result<UploadSession> {
    let config = client.config();
    let file_size = tokio::fs::metadata(path)
        .await
        .map_err(|e| ClientError::upload(file_name, format!("cannot stat {}: {}", path.display(), e)))?
        .len();
    let plan = ChunkPlan::new(file_size, config.multipart_part_size)?;
    let limiter = ConcurrencyLimiter::new(config.max_concurrent_parts)?;
    let mut reader = ChunkReader::open(path, plan)
        .await
        .map_err(|e| relabel(e, file_name))?;

    let mut upload = MultipartUpload::create(client, file_name).await?;
    info!(
        file = %file_name,
        upload_id = %upload.upload_id(),
        file_size,
        parts = plan.num_chunks,
        chunk_size = plan.chunk_size,
        "Starting multipart upload"
    );

    let mut tracker = ProgressTracker::new(plan, progress);
    if let Err(e) = upload_parts(&mut upload, &mut reader, &limiter, cancel, &mut tracker).await {
        upload.fail();
        warn!(file = %file_name, upload_id = %upload.upload_id(), error = %e, "Multipart upload failed");
        return Err(e);
    }

    if let Err(e) = upload.complete().await {
        warn!(file = %file_name, upload_id = %upload.upload_id(), error = %e, "Multipart finalize failed");
        return Err(e);
    }

    info!(file = %file_name, upload_id = %upload.upload_id(), "Multipart upload complete");
    Ok(UploadSession {
        upload_id: upload.upload_id().to_string(),
        target_path: file_name.to_string(),
        plan,
    })
}

async fn upload_parts(
    upload: &mut MultipartUpload,
    reader: &mut ChunkReader,
    limiter: &ConcurrencyLimiter,
    cancel: &CancellationToken,
    tracker: &mut ProgressTracker<'_>,
) -> Result<()> {
    upload.transition(UploadState::PartsInFlight);
    let uploader = upload.part_uploader();
    let file_name = upload.file_name.clone();
    let mut tasks: JoinSet<Result<CompletedPart>> = JoinSet::new();

    loop {
        // Settle finished parts while waiting for a free slot.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            Some(joined) = tasks.join_next() => {
                let part = settle(&file_name, joined)?;
                tracker.part_done(&part);
                upload.record_part(part);
                continue;
            }
            permit = limiter.acquire_owned() => permit,
        };

        let next = reader.next_chunk(cancel).await.map_err(|e| relabel(e, &file_name))?;
        let Some(chunk) = next else {
            break;
        };

        let uploader = uploader.clone();
        let upload_id = upload.upload_id.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = cancel.cancelled() => Err(ClientError::Cancelled),
                part = uploader.upload(&upload_id, chunk.part_number, chunk.data) => part,
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let part = settle(&file_name, joined)?;
        tracker.part_done(&part);
        upload.record_part(part);
    }

    Ok(())
}

fn settle(
    file_name: &str,
    joined: std::result::Result<Result<CompletedPart>, JoinError>,
) -> Result<CompletedPart> {
    joined.map_err(|e| ClientError::upload(file_name, format!("part task failed: {}", e)))?
}

/// Report reader failures under the logical file name rather than the local path
fn relabel(err: ClientError, file_name: &str) -> ClientError {
    match err {
        ClientError::Upload { message, .. } => ClientError::upload(file_name, message),
        other => other,
    }
}

/// Sort parts ascending and check numbering is contiguous from 1
fn ordered_parts(mut parts: Vec<CompletedPart>) -> std::result::Result<Vec<CompletedPart>, String> {
    parts.sort_by_key(|p| p.part_number);
    for (index, part) in parts.iter().enumerate() {
        let expected = index as u32 + 1;
        if part.part_number != expected {
            return Err(format!(
                "parts are not contiguous: expected part {}, found {}",
                expected, part.part_number
            ));
        }
    }
    Ok(parts)
}

struct ProgressTracker<'a> {
    plan: ChunkPlan,
    callback: Option<&'a ProgressCallback>,
    bytes_uploaded: u64,
    parts_completed: u32,
}

impl<'a> ProgressTracker<'a> {
    fn new(plan: ChunkPlan, callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            plan,
            callback,
            bytes_uploaded: 0,
            parts_completed: 0,
        }
    }

    fn part_done(&mut self, part: &CompletedPart) {
        self.parts_completed += 1;
        self.bytes_uploaded += self.plan.range(part.part_number).map_or(0, |r| r.len());

        if let Some(cb) = self.callback {
            cb(UploadProgress {
                bytes_uploaded: self.bytes_uploaded,
                total_bytes: self.plan.file_size,
                parts_completed: self.parts_completed,
                total_parts: self.plan.num_chunks,
            });
        }
    }
}

// Helper functions for multipart operations

async fn initiate_upload(client: &ScribeClient, file_name: &str) -> Result<String> {
    let url = file_url(client, file_name);
    let response = client
        .send(client.http().put(&url).query(&[("action", "mpu-create")]))
        .await
        .map_err(|e| ClientError::upload(file_name, format!("create session: {}", e)))?;

    let body: CreateSessionResponse = response.json().await.map_err(|e| {
        ClientError::upload(file_name, format!("create session: invalid response: {}", e))
    })?;

    Ok(body.upload_id)
}

async fn complete_upload(
    client: &ScribeClient,
    file_name: &str,
    upload_id: &str,
    parts: &[CompletedPart],
) -> Result<()> {
    let url = file_url(client, file_name);
    let req = client
        .http()
        .put(&url)
        .query(&[("action", "mpu-complete"), ("uploadId", upload_id)])
        .json(&CompleteSessionRequest { parts });

    client
        .send(req)
        .await
        .map_err(|e| ClientError::upload(file_name, format!("finalize: {}", e)))?;

    Ok(())
}

pub(crate) fn file_url(client: &ScribeClient, file_name: &str) -> String {
    client
        .config()
        .org_url(&format!("files/{}", urlencoding::encode(file_name)))
}

/// Name under which a local file is stored remotely
pub(crate) fn object_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ClientError::upload(path.display().to_string(), "path has no file name"))
}
