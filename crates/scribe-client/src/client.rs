//! Main client implementation

use crate::{
    poller::JobPoller,
    source::Source,
    types::*,
    ClientError, Config, Result,
};
use reqwest::{header, Client, RequestBuilder, Response};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Transcription service client
///
/// Cheap to clone: the configuration and connection pool are shared.
#[derive(Clone, Debug)]
pub struct ScribeClient {
    config: Arc<Config>,
    http: Client,
}

impl ScribeClient {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        if config.organization.is_empty() {
            return Err(ClientError::Config("organization must not be empty".to_string()));
        }

        let mut headers = header::HeaderMap::new();
        let user_agent = config
            .user_agent
            .parse()
            .map_err(|_| ClientError::Config(format!("invalid user agent: {}", config.user_agent)))?;
        headers.insert(header::USER_AGENT, user_agent);

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Create with endpoint URL and organization
    pub fn with_endpoint(endpoint: &str, organization: &str) -> Result<Self> {
        Self::new(Config::new(endpoint, organization))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Sources ====================

    /// Turn a caller-supplied source into a URL the service can fetch
    ///
    /// Remote URIs pass through untouched. Local files are uploaded
    /// (multipart above the configured threshold) and exchanged for a
    /// signed URL.
    #[instrument(skip(self, cancel))]
    pub async fn resolve_source(&self, source: &str, cancel: &CancellationToken) -> Result<String> {
        match Source::parse(source)? {
            Source::Remote(url) => {
                debug!("Source is remote, skipping upload");
                Ok(url)
            }
            Source::Local(path) => self.upload_and_sign(&path, cancel).await,
        }
    }

    // ==================== Job Operations ====================

    /// Submit a transcription job
    #[instrument(skip(self, options), fields(url = %options.url))]
    pub async fn create_job(&self, options: &TranscriptionOptions) -> Result<TranscriptionJob> {
        let url = self.config.org_url("transcriptions");
        let response = self.send(self.http.post(&url).json(options)).await?;
        let job: TranscriptionJob = parse_json(response).await?;
        info!(job_id = %job.id, "Transcription job created");
        Ok(job)
    }

    /// Fetch the current snapshot of a job
    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str) -> Result<TranscriptionJob> {
        let url = self.job_url(job_id);
        let response = self.send(self.http.get(&url)).await?;
        parse_json(response).await
    }

    /// List jobs in the organization
    #[instrument(skip(self))]
    pub async fn list_jobs(&self, options: &ListJobsOptions) -> Result<ListJobsResult> {
        let mut query = Vec::new();
        if let Some(size) = options.page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = &options.page_token {
            query.push(("pageToken", token.clone()));
        }

        let url = self.config.org_url("transcriptions");
        let response = self.send(self.http.get(&url).query(&query)).await?;
        parse_json(response).await
    }

    /// Ask the service to stop a running job
    #[instrument(skip(self))]
    pub async fn stop_job(&self, job_id: &str) -> Result<TranscriptionJob> {
        let url = self.job_url(job_id);
        let response = self
            .send(self.http.post(&url).query(&[("action", "stop")]))
            .await?;
        parse_json(response).await
    }

    /// Poll a job until it reaches a terminal status
    #[instrument(skip(self, cancel))]
    pub async fn wait_for_job(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionJob> {
        JobPoller::from_config(&self.config)
            .poll(job_id, || self.get_job(job_id), cancel)
            .await
    }

    /// Resolve the source, submit a job and wait for it to finish
    #[instrument(skip(self, options, cancel))]
    pub async fn transcribe(
        &self,
        source: &str,
        options: TranscriptionOptions,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionJob> {
        let url = self.resolve_source(source, cancel).await?;
        let job = self
            .create_job(&TranscriptionOptions { url, ..options })
            .await?;
        self.wait_for_job(&job.id, cancel).await
    }

    // ==================== Helper Methods ====================

    fn job_url(&self, job_id: &str) -> String {
        self.config
            .org_url(&format!("transcriptions/{}", urlencoding::encode(job_id)))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Attach authorization, send, and turn non-success statuses into errors
    pub(crate) async fn send(&self, mut req: RequestBuilder) -> Result<Response> {
        if let Some(key) = &self.config.api_key {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Request failed");
            return Err(ClientError::from_api_body(&text, status.as_u16()));
        }

        Ok(response)
    }
}

pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
