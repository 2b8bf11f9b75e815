//! Minimal webhook receiver that checks signatures before trusting a payload
//!
//! Run with: SCRIBE_WEBHOOK_SECRET=whsec_... cargo run --example webhook_receiver
//! then point a job's `webhookUrl` at http://<host>:3000/webhooks/scribe

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use scribe_client::{WebhookEnvelope, WebhookVerifier};
use std::sync::Arc;

async fn receive(
    State(verifier): State<Arc<WebhookVerifier>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let envelope = match WebhookEnvelope::from_headers(&headers, body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected webhook");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) = verifier.verify(&envelope) {
        tracing::warn!(id = %envelope.id, error = %e, "Rejected webhook");
        return StatusCode::UNAUTHORIZED;
    }

    match serde_json::from_slice::<serde_json::Value>(&envelope.payload) {
        Ok(event) => {
            tracing::info!(id = %envelope.id, %event, "Webhook accepted");
            StatusCode::NO_CONTENT
        }
        Err(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let secret = std::env::var("SCRIBE_WEBHOOK_SECRET")?;
    let verifier = Arc::new(WebhookVerifier::new(&secret)?);

    let app = Router::new()
        .route("/webhooks/scribe", post(receive))
        .with_state(verifier);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
