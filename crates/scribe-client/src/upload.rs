//! Local file upload and signed URL issuance

use crate::{
    multipart::{file_url, object_name, upload_large_file, ProgressCallback},
    types::{SignFileRequest, UrlResponse},
    ClientError, Result, ScribeClient,
};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

impl ScribeClient {
    /// Upload a local file and return a signed URL for it
    pub async fn upload_and_sign(&self, path: &Path, cancel: &CancellationToken) -> Result<String> {
        let name = self.upload_file(path, cancel, None).await?;
        self.sign_file(&name).await
    }

    /// Upload a local file and return its remote object name
    ///
    /// Files above the multipart threshold are split into parts; smaller
    /// files go up in one request.
    #[instrument(skip(self, path, cancel, progress), fields(path = %path.display()))]
    pub async fn upload_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        let name = object_name(path)?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ClientError::upload(&name, format!("cannot read {}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(ClientError::upload(
                &name,
                format!("{} is not a regular file", path.display()),
            ));
        }

        if metadata.len() > self.config().multipart_threshold {
            upload_large_file(self, path, &name, cancel, progress).await?;
        } else {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                uploaded = self.upload_single(path, &name) => { uploaded?; }
            }
        }

        Ok(name)
    }

    /// Upload a file in a single request
    pub async fn upload_single(&self, path: &Path, name: &str) -> Result<String> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::upload(name, format!("cannot read {}: {}", path.display(), e)))?;
        let size = data.len();

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = Part::bytes(data)
            .file_name(name.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| ClientError::upload(name, e))?;
        let form = Form::new().part("file", part);

        let url = file_url(self, name);
        let response = self
            .send(self.http().put(&url).multipart(form))
            .await
            .map_err(|e| ClientError::upload(name, e))?;
        let body: UrlResponse = response
            .json()
            .await
            .map_err(|e| ClientError::upload(name, format!("invalid response: {}", e)))?;

        info!(file = %name, size, "File uploaded");
        Ok(body.url)
    }

    /// Exchange an uploaded object's name for a time-limited retrieval URL
    #[instrument(skip(self))]
    pub async fn sign_file(&self, name: &str) -> Result<String> {
        let url = self
            .config()
            .org_url(&format!("file_tokens/{}", urlencoding::encode(name)));
        let request = SignFileRequest {
            method: "GET",
            exp: self.config().signed_url_expiry_secs.to_string(),
        };

        let response = self
            .send(self.http().post(&url).json(&request))
            .await
            .map_err(|e| ClientError::signing(name, e))?;
        let body: UrlResponse = response
            .json()
            .await
            .map_err(|e| ClientError::signing(name, format!("invalid response: {}", e)))?;

        debug!(file = %name, "Signed URL issued");
        Ok(body.url)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ClientError, Config, ScribeClient};
    use std::io::Write;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ScribeClient {
        ScribeClient::new(Config::new(server.uri(), "acme").with_multipart(1024, 256)).unwrap()
    }

    fn named_file(dir: &tempfile::TempDir, name: &str, len: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![7u8; len]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_small_file_single_shot_then_sign() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/organizations/acme/files/clip.mp3"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": "store://clip.mp3"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/organizations/acme/file_tokens/clip.mp3"))
            .and(body_json(serde_json::json!({"method": "GET", "exp": "3600"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": "https://signed/clip"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = named_file(&dir, "clip.mp3", 100);

        let url = client_for(&server)
            .upload_and_sign(&file, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, "https://signed/clip");
    }

    #[tokio::test]
    async fn test_sign_failure_is_signing_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/organizations/acme/file_tokens/clip.mp3"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({"message": "forbidden"})))
            .mount(&server)
            .await;

        let err = client_for(&server).sign_file("clip.mp3").await.unwrap_err();
        match err {
            ClientError::Signing { file, message } => {
                assert_eq!(file, "clip.mp3");
                assert!(message.contains("forbidden"));
            }
            other => panic!("Expected Signing error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_directory_is_not_uploaded() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let err = client_for(&server)
            .upload_file(dir.path(), &CancellationToken::new(), None)
            .await
            .unwrap_err();

        assert!(err.is_upload_failure());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_shot_failure_names_file() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/organizations/acme/files/clip.mp3"))
            .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = named_file(&dir, "clip.mp3", 10);

        let err = client_for(&server)
            .upload_file(&file, &CancellationToken::new(), None)
            .await
            .unwrap_err();
        match err {
            ClientError::Upload { file, message } => {
                assert_eq!(file, "clip.mp3");
                assert!(message.contains("too large"));
            }
            other => panic!("Expected Upload error, got {other:?}"),
        }
    }
}
