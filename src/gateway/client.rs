// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for encrypted backend calls.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::decode::decode_data;
use super::error::GatewayError;
use super::GatewayResult;
use crate::auth::token::bearer_authorization;
use crate::config::ClientConfig;
use crate::envelope::{CodecError, EnvelopeCodec};
use crate::models::{EncryptedEnvelope, RawResponse};
use crate::storage::TokenStore;

/// Header carrying a per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// One HTTP round trip, before the body is interpreted.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub request_id: Uuid,
    pub http_status: StatusCode,
    pub body: String,
}

/// Client for every call the console makes to the backend.
///
/// Cloning is cheap; clones share the connection pool, the codec and the
/// token store.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    http: Client,
    codec: EnvelopeCodec,
    store: TokenStore,
}

impl GatewayClient {
    pub fn new(
        base_url: &Url,
        codec: EnvelopeCodec,
        store: TokenStore,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            http,
            codec,
            store,
        })
    }

    pub fn from_config(config: &ClientConfig, store: TokenStore) -> Result<Self, GatewayError> {
        Self::new(&config.base_url, config.codec()?, store, config.timeout)
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Call `endpoint` with the current session's bearer token.
    ///
    /// Without a session the call still goes out, with an empty bearer.
    pub async fn call<B>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<GatewayResult, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let bearer = self.store.bearer();
        self.call_with_authorization(endpoint, method, body, bearer_authorization(bearer.as_deref()))
            .await
    }

    pub async fn get(&self, endpoint: &str) -> Result<GatewayResult, GatewayError> {
        self.call::<Value>(endpoint, Method::GET, None).await
    }

    pub async fn post<B>(&self, endpoint: &str, body: &B) -> Result<GatewayResult, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        self.call(endpoint, Method::POST, Some(body)).await
    }

    pub async fn put<B>(&self, endpoint: &str, body: &B) -> Result<GatewayResult, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        self.call(endpoint, Method::PUT, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<GatewayResult, GatewayError> {
        self.call::<Value>(endpoint, Method::DELETE, None).await
    }

    /// Encrypted call with an explicit `Authorization` value.
    ///
    /// Used by the handshake, which authenticates with tokens that never
    /// enter the token store.
    pub(crate) async fn call_with_authorization<B>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
        authorization: String,
    ) -> Result<GatewayResult, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let envelope = body.map(|body| self.codec.encrypt(body)).transpose()?;
        let exchange = self
            .execute(endpoint, &method, authorization, envelope.as_ref())
            .await?;

        let raw = self.parse_response(endpoint, &method, &exchange)?;
        let (data, decoding) = decode_data(&self.codec, raw.data);

        info!(
            request_id = %exchange.request_id,
            method = %method,
            endpoint,
            http_status = exchange.http_status.as_u16(),
            status = raw.status,
            decoding = ?decoding,
            "Gateway call completed"
        );

        Ok(GatewayResult {
            status: raw.status,
            message: raw.message,
            data,
            decoding,
        })
    }

    /// Send a request and read the whole body.
    pub(crate) async fn execute(
        &self,
        endpoint: &str,
        method: &Method,
        authorization: String,
        body: Option<&EncryptedEnvelope>,
    ) -> Result<Exchange, GatewayError> {
        let request_id = Uuid::new_v4();
        let mut request = self
            .http
            .request(method.clone(), self.url(endpoint))
            .header(AUTHORIZATION, authorization)
            .header(REQUEST_ID_HEADER, request_id.to_string());

        if let Some(envelope) = body {
            request = request.json(envelope);
        }

        debug!(
            request_id = %request_id,
            method = %method,
            endpoint,
            encrypted_body = body.is_some(),
            "Gateway request"
        );

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::transport(method, endpoint, describe(&e)))?;

        let http_status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::transport(method, endpoint, describe(&e)))?;

        Ok(Exchange {
            request_id,
            http_status,
            body,
        })
    }

    /// Parse a response body into `{status, message, data}`.
    ///
    /// A body that is itself an envelope is opened first; a failure to open
    /// it is returned as an error rather than treated as plaintext.
    fn parse_response(
        &self,
        endpoint: &str,
        method: &Method,
        exchange: &Exchange,
    ) -> Result<RawResponse, GatewayError> {
        let http_status = exchange.http_status;
        let value: Value = serde_json::from_str(&exchange.body).map_err(|e| {
            let message = if http_status.is_success() {
                format!("response is not JSON: {e}")
            } else {
                format!("HTTP {http_status} with unparsable body")
            };
            GatewayError::transport(method, endpoint, message)
        })?;

        let value = open_body(&self.codec, value)?;

        let raw: RawResponse = serde_json::from_value(value).map_err(|e| {
            GatewayError::transport(
                method,
                endpoint,
                format!("HTTP {http_status}: unexpected response shape: {e}"),
            )
        })?;

        if !http_status.is_success() {
            warn!(
                request_id = %exchange.request_id,
                endpoint,
                http_status = http_status.as_u16(),
                status = raw.status,
                "Backend returned an error status with a response envelope"
            );
        }

        Ok(raw)
    }
}

/// Open `value` if the whole body is an envelope, else return it unchanged.
pub(crate) fn open_body(codec: &EnvelopeCodec, value: Value) -> Result<Value, CodecError> {
    match whole_body_envelope(&value) {
        Some(enc_data) => Ok(codec.decrypt_str(enc_data)?.into_value()),
        None => Ok(value),
    }
}

/// `enc_data` of a body shaped `{"enc_data": "..."}` with no `status`.
fn whole_body_envelope(value: &Value) -> Option<&str> {
    if value.get("status").is_some() {
        return None;
    }
    value.get("enc_data").and_then(Value::as_str)
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}
