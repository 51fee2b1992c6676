// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process mock backend for tests.
//!
//! Speaks the real wire protocol (encrypted envelopes, Basic/Bearer headers)
//! on `127.0.0.1:0` so tests exercise the full reqwest path.
//!
//! Built-in routes:
//!
//! - `/auth/send-otp`: status 0 with a plain string in `data`
//! - `/auth/token`: `t1` as a temporary token; `f1`, inside encrypted `data`,
//!   right after a successful validation
//! - `/auth/validate-otp`: requires `Bearer t1`; [`VALID_OTP`] yields status 0
//!   with an encrypted user record, anything else status 1 `Invalid OTP`
//! - `/echo`: returns the decrypted request body, encrypted again
//!
//! Any other path answers `{"status": 0, "message": "ok"}` unless a
//! [`Reply`] was scripted for it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use url::Url;

use crate::envelope::{EnvelopeCodec, NoncePolicy};
use crate::gateway::GatewayClient;
use crate::models::EncryptedEnvelope;
use crate::storage::TokenStore;

pub const MOBILE: &str = "9876543210";
pub const VALID_OTP: &str = "123456";
pub const TEST_KEY: [u8; 32] = [7u8; 32];

/// Canned response for one path.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    content_type: &'static str,
    body: String,
    delay: Option<Duration>,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/html",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).unwrap();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Request as seen by the backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    pub body: String,
}

struct BackendState {
    codec: EnvelopeCodec,
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<HashMap<String, Reply>>,
    final_token_pending: AtomicBool,
    fail_final_token: AtomicBool,
}

impl BackendState {
    fn open(&self, body: &str) -> Value {
        let envelope: EncryptedEnvelope = serde_json::from_str(body).unwrap();
        self.codec.decrypt(&envelope).unwrap().into_value()
    }

    fn seal(&self, value: &Value) -> String {
        self.codec.encrypt(value).unwrap().enc_data
    }
}

pub struct MockBackend {
    addr: std::net::SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            codec: EnvelopeCodec::new(&TEST_KEY, NoncePolicy::Random).unwrap(),
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            final_token_pending: AtomicBool::new(false),
            fail_final_token: AtomicBool::new(false),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.state.codec
    }

    /// Gateway client sharing the backend's key.
    pub fn client(&self, store: TokenStore) -> GatewayClient {
        GatewayClient::new(&self.url(), self.codec().clone(), store, Duration::from_secs(5))
            .unwrap()
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(path.to_string(), reply);
    }

    /// Make the token endpoint fail whenever a final token is due.
    pub fn fail_final_token(&self) {
        self.state.fail_final_token.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self, path: &str) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.path == path)
            .cloned()
            .collect()
    }

    pub fn last_call(&self, path: &str) -> Option<RecordedCall> {
        self.calls(path).pop()
    }

    pub fn decrypt_body(&self, call: &RecordedCall) -> Value {
        self.state.open(&call.body)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let call = RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION.as_str()),
        request_id: header_value("x-request-id"),
        body,
    };
    state.calls.lock().unwrap().push(call.clone());

    let scripted = state.replies.lock().unwrap().get(&call.path).cloned();
    let reply = match scripted {
        Some(reply) => reply,
        None => default_reply(&state, &call),
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    (
        reply.status,
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
        .into_response()
}

fn default_reply(state: &BackendState, call: &RecordedCall) -> Reply {
    match call.path.as_str() {
        "/auth/send-otp" => {
            let request = state.open(&call.body);
            assert!(request["mobileNumber"].is_string());
            Reply::json(json!({
                "status": 0,
                "message": "OTP sent",
                "data": "OTP sent successfully",
            }))
        }
        "/auth/token" => {
            if !state.final_token_pending.swap(false, Ordering::SeqCst) {
                return Reply::json(json!({ "access_token": "t1" }));
            }
            if state.fail_final_token.load(Ordering::SeqCst) {
                return Reply::text("token service unavailable").with_http_status(503);
            }
            Reply::json(json!({
                "status": 0,
                "data": state.seal(&json!({ "token": "f1" })),
            }))
        }
        "/auth/validate-otp" => {
            if call.authorization.as_deref() != Some("Bearer t1") {
                return Reply::json(json!({ "status": 401, "message": "Unauthorized" }));
            }
            let credential = state.open(&call.body);
            if credential["otpCode"] != VALID_OTP {
                return Reply::json(json!({ "status": 1, "message": "Invalid OTP", "data": null }));
            }
            state.final_token_pending.store(true, Ordering::SeqCst);
            let user = json!({
                "id": 7,
                "name": "Asha Rao",
                "mobileNumber": credential["mobileNumber"],
                "userTypeId": credential["userTypeId"],
            });
            Reply::json(json!({
                "status": 0,
                "message": "Login successful",
                "data": state.seal(&user),
            }))
        }
        "/echo" => {
            let request = state.open(&call.body);
            Reply::json(json!({ "status": 0, "message": "ok", "data": state.seal(&request) }))
        }
        _ => Reply::json(json!({ "status": 0, "message": "ok" })),
    }
}
