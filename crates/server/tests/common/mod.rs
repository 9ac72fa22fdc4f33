//! Common test utilities for API testing.
//!
//! This module provides a test fixture that creates an in-process server
//! with its download directory in a temporary directory, and a stand-in for
//! the chat client attached to the bridge.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tower::ServiceExt;

use bookhound_core::{ChatEvent, EventOutcome};
use bookhound_server::api::{create_router, BridgeHub, BridgeMessage};
use bookhound_server::state::AppState;

/// Re-export fixtures for test convenience
pub use bookhound_core::testing::fixtures;

const BOUNDARY: &str = "bookhound-test-boundary";

/// Test fixture driving the router in-process.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search_submission() {
///     let fixture = TestFixture::new();
///     let mut client = fixture.attach_client();
///
///     let response = fixture.post("/api/v1/searches", json!({ "query": "Dune" })).await;
///
///     assert_eq!(response.status, 201);
///     assert_eq!(sent_lines(&mut client), vec!["@searchook Dune epub rar"]);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub state: Arc<AppState>,
    /// Download directory
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// Parsed JSON body, `Null` when the body is not JSON.
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = fixtures::config(temp_dir.path());
        let state = Arc::new(AppState::new(config, BridgeHub::default()));
        let router = create_router(Arc::clone(&state));
        Self {
            router,
            state,
            temp_dir,
        }
    }

    /// Attach a stand-in chat client; it sees everything the bridge sends.
    pub fn attach_client(&self) -> broadcast::Receiver<BridgeMessage> {
        self.state.bridge().subscribe()
    }

    /// Deliver a chat event the way the bridge socket does.
    pub async fn chat(&self, event: ChatEvent) -> EventOutcome {
        let mut session = self.state.session().lock().await;
        let outcome = session.handle_event(event).expect("chat event");
        self.state.bridge().outcome(&session, &outcome);
        outcome
    }

    pub async fn join(&self, topic: &str) -> EventOutcome {
        self.chat(ChatEvent::Joined {
            topic: topic.to_string(),
        })
        .await
    }

    pub async fn reply(&self, from: &str, text: &str) -> EventOutcome {
        self.chat(ChatEvent::PrivateMessage {
            from: from.to_string(),
            text: text.to_string(),
        })
        .await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send(json_request("POST", path, body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.send(json_request("PUT", path, body)).await
    }

    /// Upload a received file through `POST /api/v1/bridge/files`.
    pub async fn upload_file(&self, from: Option<&str>, filename: &str, data: &[u8]) -> TestResponse {
        let mut body = Vec::new();
        if let Some(from) = from {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"from\"\r\n\r\n{}\r\n",
                    BOUNDARY, from
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::post("/api/v1/bridge/files")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body, text }
    }
}

fn json_request(method: &str, path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Drain the chat lines a client has been asked to send.
pub fn sent_lines(client: &mut broadcast::Receiver<BridgeMessage>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(msg) = client.try_recv() {
        if let BridgeMessage::Send { line, .. } = msg {
            lines.push(line);
        }
    }
    lines
}
