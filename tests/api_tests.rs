//! Job lifecycle, webhook and CLI tests against a mock service

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue};
use scribe_cli::{commands, Command, Settings};
use scribe_client::{
    CancellationToken, ClientError, Config, JobStatus, ScribeClient, WebhookEnvelope,
    WebhookVerifier, WEBHOOK_ID_HEADER, WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER,
};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTERVAL: Duration = Duration::from_millis(50);

fn client_for(server: &MockServer, timeout: Duration) -> ScribeClient {
    let config = Config::new(server.uri(), "acme").with_polling(INTERVAL, timeout);
    ScribeClient::new(config).unwrap()
}

async fn mount_status(server: &MockServer, body: serde_json::Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/organizations/acme/transcriptions/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

#[test_log::test(tokio::test)]
async fn test_poll_pending_running_succeeded() {
    let server = MockServer::start().await;
    mount_status(&server, serde_json::json!({"id": "job-1", "status": "Pending"}), Some(1)).await;
    mount_status(&server, serde_json::json!({"id": "job-1", "status": "Running"}), Some(1)).await;
    mount_status(
        &server,
        serde_json::json!({"id": "job-1", "status": "Succeeded", "output": {"url": "https://out/job-1.json"}}),
        None,
    )
    .await;

    let started = Instant::now();
    let job = client_for(&server, Duration::from_secs(10))
        .wait_for_job("job-1", &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    // Two sleeps between three fetches
    assert!(elapsed >= INTERVAL * 2, "{elapsed:?}");
}

#[test_log::test(tokio::test)]
async fn test_succeeded_with_error_output_is_job_failure() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        serde_json::json!({"id": "job-1", "status": "Succeeded", "output": {"error": "no speech detected"}}),
        None,
    )
    .await;

    let err = client_for(&server, Duration::from_secs(10))
        .wait_for_job("job-1", &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ClientError::Job { job_id, message } => {
            assert_eq!(job_id, "job-1");
            assert_eq!(message, "no speech detected");
        }
        other => panic!("Expected Job error, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_poll_times_out() {
    let server = MockServer::start().await;
    mount_status(&server, serde_json::json!({"id": "job-1", "status": "Running"}), None).await;

    let err = client_for(&server, Duration::from_millis(200))
        .wait_for_job("job-1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[test_log::test(tokio::test)]
async fn test_cancel_stops_polling_promptly() {
    let server = MockServer::start().await;
    mount_status(&server, serde_json::json!({"id": "job-1", "status": "Running"}), None).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client_for(&server, Duration::from_secs(60))
        .wait_for_job("job-1", &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_webhook_from_received_headers() {
    let secret = format!("whsec_{}", BASE64.encode(b"endpoint-secret"));
    let verifier = WebhookVerifier::new(&secret).unwrap();
    let payload = br#"{"type":"transcription.succeeded","data":{"id":"job-1"}}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = verifier.sign("msg_2fYx", &timestamp, payload);

    let mut headers = HeaderMap::new();
    headers.insert(WEBHOOK_ID_HEADER, HeaderValue::from_static("msg_2fYx"));
    headers.insert(WEBHOOK_TIMESTAMP_HEADER, HeaderValue::from_str(&timestamp).unwrap());
    headers.insert(WEBHOOK_SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());

    let envelope = WebhookEnvelope::from_headers(&headers, payload.to_vec()).unwrap();
    verifier.verify(&envelope).unwrap();

    // Body altered in transit
    let tampered = WebhookEnvelope::from_headers(&headers, b"{}".to_vec()).unwrap();
    assert!(verifier.verify(&tampered).unwrap_err().is_verification_failure());

    // Any of the three headers stripped by a proxy
    for header in [WEBHOOK_ID_HEADER, WEBHOOK_TIMESTAMP_HEADER, WEBHOOK_SIGNATURE_HEADER] {
        let mut stripped = headers.clone();
        stripped.remove(header);
        assert!(
            WebhookEnvelope::from_headers(&stripped, payload.to_vec())
                .unwrap_err()
                .is_verification_failure(),
            "{header}"
        );
    }
}

#[test_log::test(tokio::test)]
async fn test_cli_stop_command_uses_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/organizations/acme/transcriptions/job-1"))
        .and(wiremock::matchers::query_param("action", "stop"))
        .and(wiremock::matchers::header("authorization", "Bearer from-settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "job-1", "status": "Failed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = Settings {
        endpoint: Some(server.uri()),
        organization: Some("acme".to_string()),
        api_key: Some("from-settings".to_string()),
        ..Settings::default()
    };

    commands::run(
        Command::Stop { job_id: "job-1".to_string() },
        &settings,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_cli_upload_resolves_file_url() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/organizations/acme/files/clip.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": "store://clip.wav"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/organizations/acme/file_tokens/clip.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": "https://storage.example.com/clip.wav?sig=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clip.wav");
    std::fs::write(&file, b"RIFF....WAVEfmt ").unwrap();
    let source = reqwest::Url::from_file_path(&file).unwrap().to_string();

    let settings = Settings {
        endpoint: Some(server.uri()),
        organization: Some("acme".to_string()),
        ..Settings::default()
    };

    commands::run(Command::Upload { source }, &settings, &CancellationToken::new())
        .await
        .unwrap();

    let uploaded = &server.received_requests().await.unwrap()[0];
    assert!(uploaded.body.windows(4).any(|w| w == b"WAVE"));
}

#[test_log::test(tokio::test)]
async fn test_cli_upload_rejects_remote_source() {
    let settings = Settings {
        endpoint: Some("http://127.0.0.1:9".to_string()),
        organization: Some("acme".to_string()),
        ..Settings::default()
    };

    let err = commands::run(
        Command::Upload { source: "https://cdn.example.com/a.mp3".to_string() },
        &settings,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("already remote"), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_cli_verify_webhook_command() {
    let raw_secret = BASE64.encode(b"cli-secret");
    let verifier = WebhookVerifier::new(&raw_secret).unwrap();
    let payload = br#"{"type":"transcription.failed"}"#;
    let signature = verifier.sign("msg_1", "1700000000", payload);

    let dir = tempfile::tempdir().unwrap();
    let body = dir.path().join("body.json");
    std::fs::write(&body, payload).unwrap();

    let settings = Settings {
        webhook_secret: Some(raw_secret),
        ..Settings::default()
    };
    let args = |ignore_timestamp| {
        Command::VerifyWebhook(scribe_cli::cli::VerifyWebhookArgs {
            secret: None,
            id: "msg_1".to_string(),
            timestamp: "1700000000".to_string(),
            signature: signature.clone(),
            ignore_timestamp,
            payload: body.clone(),
        })
    };

    // Old timestamp is rejected unless the window is disabled
    assert!(commands::run(args(false), &settings, &CancellationToken::new()).await.is_err());
    commands::run(args(true), &settings, &CancellationToken::new())
        .await
        .unwrap();
}
