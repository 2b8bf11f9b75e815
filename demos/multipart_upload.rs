//! Multipart upload example for large files
//!
//! This example demonstrates:
//! - Uploading a large file with bounded part concurrency
//! - Tracking upload progress
//! - Driving a multipart session by hand
//!
//! Run with: cargo run --example multipart_upload

use bytes::Bytes;
use scribe_client::{
    upload_large_file, CancellationToken, ChunkPlan, Config, MultipartUpload, ProgressCallback,
    ScribeClient, UploadProgress,
};
use std::io::Write;

const MIB: u64 = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("scribe_client=info").init();

    let endpoint = std::env::var("SCRIBE_ENDPOINT").unwrap_or_else(|_| "http://localhost:8080".into());
    let config = Config::new(endpoint, "acme")
        .with_multipart(8 * MIB, 5 * MIB)
        .with_max_concurrent_parts(4);
    let client = ScribeClient::new(config)?;

    // ==================== Planning ====================

    let plan = ChunkPlan::new(42 * MIB, 5 * MIB)?;
    println!("42 MiB in 5 MiB parts -> {} parts of {} bytes", plan.num_chunks, plan.chunk_size);
    for (part, range) in plan.ranges().take(3) {
        println!("   part {}: bytes {}..{}", part, range.start, range.end);
    }

    // ==================== Large File Upload ====================

    let mut file = tempfile::Builder::new().suffix(".wav").tempfile()?;
    let data: Vec<u8> = (0..42 * MIB).map(|i| (i % 256) as u8).collect();
    file.write_all(&data)?;

    let progress: ProgressCallback = Box::new(|progress: UploadProgress| {
        println!(
            "   Progress: {:.1}% - part {}/{}",
            progress.percentage(),
            progress.parts_completed,
            progress.total_parts
        );
    });

    let session = upload_large_file(
        &client,
        file.path(),
        "large-recording.wav",
        &CancellationToken::new(),
        Some(&progress),
    )
    .await?;
    println!("Upload complete: {} ({} parts)", session.upload_id, session.plan.num_chunks);

    // ==================== Manual Multipart Upload ====================

    let mut upload = MultipartUpload::create(&client, "chunked-recording.wav").await?;
    println!("Upload ID: {}", upload.upload_id());

    for part_number in 1..=3u32 {
        let chunk = vec![part_number as u8; (5 * MIB) as usize];
        upload.upload_part(part_number, Bytes::from(chunk)).await?;
    }
    upload.complete().await?;
    println!("Manual upload finished in state {:?}", upload.state());

    Ok(())
}
