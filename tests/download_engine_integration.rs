//! Integration tests for the download engine against a mock HTTP server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use comfyfetch_core::{
    CancellationToken, DownloadEngine, DownloadError, DownloadProgress, EngineConfig, HttpClient,
    RetryPolicy,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::FlakyResponder;

// ==================== Helper Functions ====================

/// Engine with three attempts and a short delay so retry tests stay fast.
fn test_engine() -> DownloadEngine {
    engine_with_attempts(3)
}

fn engine_with_attempts(max_attempts: u32) -> DownloadEngine {
    DownloadEngine::new(
        HttpClient::new(),
        EngineConfig {
            retry_policy: RetryPolicy::new(max_attempts, Duration::from_millis(10)),
            ..EngineConfig::default()
        },
    )
}

// ==================== Success Tests ====================

#[tokio::test]
async fn test_download_writes_body_to_destination() {
    let server = MockServer::start().await;
    let body = vec![7u8; 4096];
    Mock::given(method("GET"))
        .and(path("/model.safetensors"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("model.safetensors");
    let url = format!("{}/model.safetensors", server.uri());

    let report = test_engine().download(&url, &dest, None).await.unwrap();

    assert_eq!(report.bytes_written, 4096);
    assert_eq!(report.declared_size, Some(4096));
    assert_eq!(report.attempts, 1);
    assert!(!report.size_mismatch);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn test_download_follows_redirect_to_cdn() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolve/model.safetensors"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/cdn/blob"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weights".to_vec()))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("model.safetensors");
    let url = format!("{}/resolve/model.safetensors", server.uri());

    let report = test_engine().download(&url, &dest, None).await.unwrap();

    assert_eq!(report.effective_url, format!("{}/cdn/blob", server.uri()));
    assert_eq!(std::fs::read(&dest).unwrap(), b"weights");
}

#[tokio::test]
async fn test_download_creates_nested_directories_and_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 256 * 1024]))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("models/loras/deep/big.bin");
    let url = format!("{}/big.bin", server.uri());

    let seen: Mutex<Vec<DownloadProgress>> = Mutex::new(Vec::new());
    let on_progress = |p: &DownloadProgress| seen.lock().unwrap().push(*p);

    let report = test_engine()
        .download(&url, &dest, Some(&on_progress))
        .await
        .unwrap();

    assert!(dest.exists());
    assert_eq!(report.bytes_written, 256 * 1024);

    let seen = seen.into_inner().unwrap();
    assert!(!seen.is_empty());
    let last = seen.last().unwrap();
    assert_eq!(last.total, 256 * 1024);
    // Reports come at 10% steps, so the last one lands within a step of the end.
    assert!(last.percentage > 90.0, "{last:?}");
    assert!(
        seen.windows(2).all(|w| w[0].downloaded <= w[1].downloaded),
        "progress must be monotonic"
    );
}

// ==================== Retry Tests ====================

#[tokio::test]
async fn test_flaky_server_succeeds_on_third_attempt() {
    let server = MockServer::start().await;
    let request_count = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(FlakyResponder {
            request_count: Arc::clone(&request_count),
            fail_count: 2,
            success_body: b"finally".to_vec(),
        })
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("file.bin");
    let url = format!("{}/file", server.uri());

    let report = test_engine().download(&url, &dest, None).await.unwrap();

    assert_eq!(report.attempts, 3);
    assert_eq!(request_count.load(Ordering::SeqCst), 3);
    assert_eq!(std::fs::read(&dest).unwrap(), b"finally");
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_attempts_and_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(3)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("broken.bin");
    let url = format!("{}/broken", server.uri());

    let err = test_engine().download(&url, &dest, None).await.unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("upstream exploded"), "{err}");
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_not_found_is_retried_like_any_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("missing.bin");
    let url = format!("{}/missing", server.uri());

    let err = engine_with_attempts(2)
        .download(&url, &dest, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.last_error(),
        DownloadError::Transport { status: 404, .. }
    ));
}

// ==================== Integrity Tests ====================

#[tokio::test]
async fn test_empty_body_fails_integrity_and_removes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("empty.bin");
    let url = format!("{}/empty", server.uri());

    let err = test_engine().download(&url, &dest, None).await.unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    assert!(matches!(err.last_error(), DownloadError::Integrity { .. }));
    assert!(!dest.exists());
}

/// Raw HTTP server that promises `declared` bytes, sends `sent`, then
/// closes the connection. Serves `connections` requests and counts them.
fn spawn_truncating_server(
    declared: usize,
    sent: usize,
    connections: usize,
) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    std::thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            counter.fetch_add(1, Ordering::SeqCst);

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nContent-Type: application/octet-stream\r\n\r\n"
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&vec![1u8; sent]);
            let _ = stream.flush();
        }
    });

    (format!("http://{addr}/model.safetensors"), hits)
}

#[tokio::test]
async fn test_truncated_body_is_retried_and_partial_file_removed() {
    let (url, hits) = spawn_truncating_server(100_000, 5_000, 3);

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("truncated.safetensors");

    let err = test_engine().download(&url, &dest, None).await.unwrap_err();

    match &err {
        DownloadError::ExhaustedRetries { attempts, source } => {
            assert_eq!(*attempts, 3);
            assert!(
                matches!(**source, DownloadError::Stream { .. }),
                "unexpected last error: {source:?}"
            );
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(!dest.exists());
}

// ==================== Redirect Tests ====================

#[tokio::test]
async fn test_redirect_without_location_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nowhere"))
        .respond_with(ResponseTemplate::new(301))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("nowhere.bin");
    let url = format!("{}/nowhere", server.uri());

    let err = engine_with_attempts(1)
        .download(&url, &dest, None)
        .await
        .unwrap_err();

    assert!(matches!(err.last_error(), DownloadError::Redirect { .. }));
}

#[tokio::test]
async fn test_redirect_loop_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .expect(6)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("loop.bin");
    let url = format!("{}/loop", server.uri());

    let err = engine_with_attempts(1)
        .download(&url, &dest, None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("redirects"), "{err}");
}

// ==================== Cancellation Tests ====================

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("cancelled.bin");
    let url = format!("{}/file", server.uri());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = test_engine()
        .download_with_cancel(&url, &dest, None, Some(&cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_cancel_during_retry_delay_stops_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let engine = DownloadEngine::new(
        HttpClient::new(),
        EngineConfig {
            retry_policy: RetryPolicy::new(5, Duration::from_secs(30)),
            ..EngineConfig::default()
        },
    );
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("slow.bin");
    let url = format!("{}/slow", server.uri());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        engine.download_with_cancel(&url, &dest, None, Some(&cancel)),
    )
    .await
    .expect("cancellation should end the retry delay")
    .unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled { .. }));
}
