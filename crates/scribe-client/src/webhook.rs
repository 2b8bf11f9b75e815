//! Webhook signature verification
//!
//! Inbound notifications carry three headers: an id, a unix timestamp in
//! seconds, and a space-separated list of `v1,<base64>` signatures. The
//! signed content is `{id}.{timestamp}.{payload}` under HMAC-SHA256 with the
//! shared secret.
//!
//! Verification fails closed: a missing header, a malformed signature entry
//! or a mismatch all surface as [`ClientError::Verification`].

use crate::{ClientError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the notification id
pub const WEBHOOK_ID_HEADER: &str = "webhook-id";
/// Header carrying the send time in unix seconds
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "webhook-timestamp";
/// Header carrying the signature list
pub const WEBHOOK_SIGNATURE_HEADER: &str = "webhook-signature";

/// Maximum accepted distance between the webhook timestamp and now
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5 * 60);

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// One inbound notification, consumed once by the verifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookEnvelope {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
    /// Raw request body, exactly as received
    pub payload: Bytes,
}

impl WebhookEnvelope {
    pub fn new(
        id: impl Into<String>,
        timestamp: impl Into<String>,
        signature: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            signature: signature.into(),
            payload: payload.into(),
        }
    }

    /// Build an envelope from request headers and the raw body
    pub fn from_headers(headers: &HeaderMap, payload: impl Into<Bytes>) -> Result<Self> {
        Ok(Self {
            id: header_value(headers, WEBHOOK_ID_HEADER)?,
            timestamp: header_value(headers, WEBHOOK_TIMESTAMP_HEADER)?,
            signature: header_value(headers, WEBHOOK_SIGNATURE_HEADER)?,
            payload: payload.into(),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String> {
    let value = headers
        .get(name)
        .ok_or_else(|| ClientError::Verification(format!("missing {} header", name)))?;
    value
        .to_str()
        .map(str::to_string)
        .map_err(|_| ClientError::Verification(format!("{} header is not valid text", name)))
}

/// Checks webhook signatures against a shared secret
#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
    tolerance: Option<Duration>,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier from a base64 secret, with or without the `whsec_` prefix
    pub fn new(secret: &str) -> Result<Self> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = BASE64
            .decode(encoded)
            .map_err(|e| ClientError::Config(format!("webhook secret is not valid base64: {}", e)))?;
        if key.is_empty() {
            return Err(ClientError::Config("webhook secret must not be empty".to_string()));
        }

        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| ClientError::Config(format!("invalid webhook secret: {}", e)))?;

        Ok(Self {
            mac,
            tolerance: Some(DEFAULT_TOLERANCE),
        })
    }

    /// Set the replay window; `None` accepts any timestamp
    pub fn with_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verify an envelope against the current time
    pub fn verify(&self, envelope: &WebhookEnvelope) -> Result<()> {
        self.verify_at(envelope, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, envelope: &WebhookEnvelope, now: i64) -> Result<()> {
        if envelope.id.is_empty() || envelope.signature.trim().is_empty() {
            return Err(ClientError::Verification("missing webhook id or signature".to_string()));
        }

        let sent_at: i64 = envelope.timestamp.trim().parse().map_err(|_| {
            ClientError::Verification(format!("invalid webhook timestamp: {}", envelope.timestamp))
        })?;
        if let Some(tolerance) = self.tolerance {
            let skew = now.abs_diff(sent_at);
            if skew > tolerance.as_secs() {
                debug!(id = %envelope.id, skew, "Webhook timestamp outside tolerance");
                return Err(ClientError::Verification(format!(
                    "webhook timestamp is {}s away from now",
                    skew
                )));
            }
        }

        let mac = self.signed_content(&envelope.id, &envelope.timestamp, &envelope.payload);
        for entry in envelope.signature.split_whitespace() {
            let Some((version, encoded)) = entry.split_once(',') else {
                continue;
            };
            if version != SIGNATURE_VERSION {
                continue;
            }
            let Ok(candidate) = BASE64.decode(encoded) else {
                continue;
            };
            if mac.clone().verify_slice(&candidate).is_ok() {
                return Ok(());
            }
        }

        debug!(id = %envelope.id, "Webhook signature mismatch");
        Err(ClientError::Verification("no matching signature".to_string()))
    }

    /// Produce a `v1,<base64>` signature for the given content
    pub fn sign(&self, id: &str, timestamp: &str, payload: &[u8]) -> String {
        let tag = self.signed_content(id, timestamp, payload).finalize().into_bytes();
        format!("{},{}", SIGNATURE_VERSION, BASE64.encode(tag))
    }

    fn signed_content(&self, id: &str, timestamp: &str, payload: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

/// Verify a webhook in one call with the default tolerance
pub fn verify_webhook(
    secret: &str,
    payload: &[u8],
    id: &str,
    timestamp: &str,
    signature: &str,
) -> Result<()> {
    let envelope = WebhookEnvelope::new(id, timestamp, signature, Bytes::copy_from_slice(payload));
    WebhookVerifier::new(secret)?.verify(&envelope)
}
