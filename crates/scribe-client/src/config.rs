//! Client configuration

use std::time::Duration;

/// Files larger than this go through multipart upload
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024; // 100 MiB

/// Maximum size of a single multipart part
pub const DEFAULT_MULTIPART_PART_SIZE: u64 = 20 * 1024 * 1024; // 20 MiB

/// Number of part uploads allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT_PARTS: usize = 3;

/// Validity of signed retrieval URLs, in seconds
pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Service endpoint URL
    pub endpoint: String,
    /// Organization the files and jobs belong to
    pub organization: String,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Multipart upload threshold (bytes)
    pub multipart_threshold: u64,
    /// Multipart part size (bytes)
    pub multipart_part_size: u64,
    /// Concurrent part uploads
    pub max_concurrent_parts: usize,
    /// Signed URL validity (seconds)
    pub signed_url_expiry_secs: u64,
    /// Delay between job status fetches
    pub poll_interval: Duration,
    /// Give up waiting for a job after this long
    pub poll_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            organization: "default".to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
            user_agent: format!("scribe-client/{}", env!("CARGO_PKG_VERSION")),
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_part_size: DEFAULT_MULTIPART_PART_SIZE,
            max_concurrent_parts: DEFAULT_MAX_CONCURRENT_PARTS,
            signed_url_expiry_secs: DEFAULT_SIGNED_URL_EXPIRY_SECS,
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint and organization
    pub fn new(endpoint: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            organization: organization.into(),
            ..Default::default()
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the multipart threshold and part size
    pub fn with_multipart(mut self, threshold: u64, part_size: u64) -> Self {
        self.multipart_threshold = threshold;
        self.multipart_part_size = part_size;
        self
    }

    /// Set how many parts may upload concurrently
    pub fn with_max_concurrent_parts(mut self, parts: usize) -> Self {
        self.max_concurrent_parts = parts;
        self
    }

    /// Set poll interval and overall poll timeout
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Build the base URL for API requests
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Build the URL for an organization-scoped path
    pub fn org_url(&self, path: &str) -> String {
        format!(
            "{}/organizations/{}/{}",
            self.base_url(),
            urlencoding::encode(&self.organization),
            path.trim_start_matches('/')
        )
    }
}
