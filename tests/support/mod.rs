//! Shared helpers for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

/// Fails the first `fail_count` requests with 500, then serves `success_body`.
#[allow(dead_code)]
pub struct FlakyResponder {
    pub request_count: Arc<AtomicUsize>,
    pub fail_count: usize,
    pub success_body: Vec<u8>,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500).set_body_bytes(b"internal server error")
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.success_body.clone())
        }
    }
}

/// Mounts a hub metadata document for `model_id`.
#[allow(dead_code)]
pub async fn mount_model_info(server: &MockServer, model_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/models/{model_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a file served under the hub's resolve URL layout.
#[allow(dead_code)]
pub async fn mount_resolve_file(server: &MockServer, model_id: &str, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{model_id}/resolve/main/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}
