// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OTP login handshake.
//!
//! ```text
//! Unauthenticated --request_otp--> OtpRequested --issue_temporary_token--> TempTokenIssued
//!     TempTokenIssued --validate_otp--> Validating --> Authenticated | Rejected
//! ```
//!
//! The temporary token lives only inside [`OtpLogin`] and is consumed by the
//! validation call. Only the final token reaches the [`TokenStore`].
//!
//! [`TokenStore`]: crate::storage::TokenStore

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::error::AuthError;
use super::session::{Session, UserInfo};
use super::token::{basic_authorization, bearer_authorization, Credential, Token};
use crate::config::AuthEndpoints;
use crate::envelope::EnvelopeCodec;
use crate::gateway::client::open_body;
use crate::gateway::{decode_data, DataDecoding, GatewayClient, GatewayError, GatewayResult, Method};

/// JSON pointers searched, in order, for the issued token.
const TOKEN_POINTERS: &[&str] = &["/access_token", "/token", "/data/access_token", "/data/token"];

/// Position in the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthState {
    Unauthenticated,
    OtpRequested,
    TempTokenIssued,
    Validating,
    Authenticated,
    Rejected,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtpRequestBody<'a> {
    mobile_number: &'a str,
}

/// Drives one login attempt at a time against the backend.
#[derive(Debug)]
pub struct OtpLogin {
    gateway: GatewayClient,
    endpoints: AuthEndpoints,
    state: AuthState,
    temp_token: Option<Token>,
}

impl OtpLogin {
    pub fn new(gateway: GatewayClient, endpoints: AuthEndpoints) -> Self {
        let state = if gateway.store().get().is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };

        Self {
            gateway,
            endpoints,
            state,
            temp_token: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    /// Ask the backend to send an OTP to `mobile_number`.
    ///
    /// Accepted in every state. Once the backend accepts the request, a
    /// pending temporary token and any earlier session are discarded, so a
    /// failed re-login never leaves the previous user's bearer in use.
    pub async fn request_otp(&mut self, mobile_number: &str) -> Result<GatewayResult, AuthError> {
        let body = OtpRequestBody { mobile_number };
        let result = self
            .gateway
            .call_with_authorization(
                &self.endpoints.request_otp,
                Method::POST,
                Some(&body),
                bearer_authorization(None),
            )
            .await
            .map_err(|e| AuthError::OtpRequest(e.to_string()))?
            .into_success()
            .map_err(|e| AuthError::OtpRequest(e.to_string()))?;

        self.temp_token = None;
        if self.gateway.store().get().is_some() {
            info!("New login started, dropping the current session");
        }
        self.gateway.store().clear()?;
        self.state = AuthState::OtpRequested;
        info!(endpoint = %self.endpoints.request_otp, "OTP requested");
        Ok(result)
    }

    /// Exchange mobile number and OTP for a temporary token.
    pub async fn issue_temporary_token(
        &mut self,
        mobile_number: &str,
        otp_code: &str,
    ) -> Result<Token, AuthError> {
        if !matches!(self.state, AuthState::OtpRequested | AuthState::TempTokenIssued) {
            return Err(AuthError::OutOfOrder {
                expected: "OtpRequested",
                actual: self.state,
            });
        }

        let value = issue_token(&self.gateway, &self.endpoints.token, mobile_number, otp_code).await?;
        let token = Token::temporary(value);
        self.temp_token = Some(token.clone());
        self.state = AuthState::TempTokenIssued;
        Ok(token)
    }

    /// Validate the OTP with the temporary token and establish the session.
    ///
    /// On success the final token and the decoded user record are stored
    /// together. Every failure leaves the token store untouched.
    pub async fn validate_otp(
        &mut self,
        mobile_number: &str,
        otp_code: &str,
        user_type_id: i64,
    ) -> Result<GatewayResult, AuthError> {
        let temp_token = match (self.state, self.temp_token.take()) {
            (AuthState::TempTokenIssued, Some(token)) => token,
            (actual, _) => {
                return Err(AuthError::OutOfOrder {
                    expected: "TempTokenIssued",
                    actual,
                })
            }
        };

        self.state = AuthState::Validating;
        let credential = Credential::new(mobile_number, otp_code, user_type_id);
        let endpoint = self.endpoints.validate_otp.clone();

        let result = match self
            .gateway
            .call_with_authorization(
                &endpoint,
                Method::POST,
                Some(&credential),
                bearer_authorization(Some(&temp_token.value)),
            )
            .await
        {
            Ok(result) => result,
            Err(e) => return Err(self.reject(AuthError::Transport(e))),
        };

        if !result.is_success() {
            return Err(self.reject(AuthError::OtpValidation {
                status: result.status,
                message: result.message,
            }));
        }

        if result.decoding == DataDecoding::Raw {
            return Err(self.reject(AuthError::Transport(GatewayError::transport(
                &Method::POST,
                &endpoint,
                "user record could not be decoded",
            ))));
        }

        let final_token =
            match issue_token(&self.gateway, &self.endpoints.token, mobile_number, otp_code).await {
                Ok(token) => token,
                Err(e) => return Err(self.reject(e)),
            };

        let session = Session::new(final_token, UserInfo(result.data.clone()));
        if let Err(e) = self.gateway.store().set(session) {
            return Err(self.reject(e.into()));
        }

        self.state = AuthState::Authenticated;
        info!(user_type_id, "OTP validated, session established");
        Ok(result)
    }

    /// Issue the temporary token and validate in one go.
    pub async fn submit_otp(
        &mut self,
        mobile_number: &str,
        otp_code: &str,
        user_type_id: i64,
    ) -> Result<GatewayResult, AuthError> {
        self.issue_temporary_token(mobile_number, otp_code).await?;
        self.validate_otp(mobile_number, otp_code, user_type_id).await
    }

    /// Drop the session and return to the start of the handshake.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.temp_token = None;
        self.state = AuthState::Unauthenticated;
        self.gateway.store().clear()?;
        info!("Logged out");
        Ok(())
    }

    fn reject(&mut self, error: AuthError) -> AuthError {
        warn!(code = error.error_code(), error = %error, "OTP validation rejected");
        self.temp_token = None;
        self.state = AuthState::Rejected;
        error
    }
}

/// POST to the token endpoint with `Basic base64(mobile:otp)` and no body.
///
/// Returns the bare token value. Whether it is temporary or final is decided
/// by the caller from where it is in the handshake.
pub async fn issue_token(
    gateway: &GatewayClient,
    endpoint: &str,
    mobile_number: &str,
    otp_code: &str,
) -> Result<String, AuthError> {
    let exchange = gateway
        .execute(endpoint, &Method::POST, basic_authorization(mobile_number, otp_code), None)
        .await
        .map_err(|e| AuthError::TokenIssuance(e.to_string()))?;

    if !exchange.http_status.is_success() {
        return Err(AuthError::TokenIssuance(format!(
            "POST {endpoint} returned HTTP {}",
            exchange.http_status
        )));
    }

    let body: Value = serde_json::from_str(&exchange.body).map_err(|e| {
        AuthError::TokenIssuance(format!("POST {endpoint} returned invalid JSON: {e}"))
    })?;
    let body = open_body(gateway.codec(), body).map_err(|e| {
        AuthError::TokenIssuance(format!("POST {endpoint} returned an unreadable envelope: {e}"))
    })?;

    extract_access_token(gateway.codec(), body).ok_or_else(|| {
        AuthError::TokenIssuance(format!("POST {endpoint} response carries no access token"))
    })
}

/// First non-empty token string in a token response.
///
/// An encrypted `data` field is decoded before it is searched.
pub fn extract_access_token(codec: &EnvelopeCodec, mut body: Value) -> Option<String> {
    if let Some(data) = body.get_mut("data") {
        if data.is_string() {
            let (decoded, _) = decode_data(codec, data.take());
            *data = decoded;
        }
    }

    TOKEN_POINTERS.iter().find_map(|pointer| {
        body.pointer(pointer)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::NoncePolicy;
    use crate::storage::{SessionFile, TokenStore, DEFAULT_SESSION_TTL};
    use crate::test_support::{MockBackend, Reply, MOBILE, VALID_OTP};
    use serde_json::json;
    use tempfile::TempDir;

    fn login(backend: &MockBackend, store: TokenStore) -> OtpLogin {
        OtpLogin::new(backend.client(store), AuthEndpoints::default())
    }

    #[tokio::test]
    async fn full_handshake_establishes_session() {
        let backend = MockBackend::start().await;
        let store = TokenStore::default();
        let mut login = login(&backend, store.clone());
        assert_eq!(login.state(), AuthState::Unauthenticated);

        login.request_otp(MOBILE).await.unwrap();
        assert_eq!(login.state(), AuthState::OtpRequested);

        let temp = login.issue_temporary_token(MOBILE, VALID_OTP).await.unwrap();
        assert_eq!(temp, Token::temporary("t1"));
        assert_eq!(login.state(), AuthState::TempTokenIssued);
        assert!(store.get().is_none());

        let result = login.validate_otp(MOBILE, VALID_OTP, 1).await.unwrap();
        assert_eq!(result.status, 0);
        assert_eq!(login.state(), AuthState::Authenticated);

        let session = store.get().unwrap();
        assert_eq!(session.bearer(), "f1");
        assert!(session.access_token.is_final());
        assert_eq!(session.user.display_name(), Some("Asha Rao"));
        assert_eq!(session.user.field("userTypeId"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn handshake_sends_expected_headers_and_bodies() {
        let backend = MockBackend::start().await;
        let mut login = login(&backend, TokenStore::default());

        login.request_otp(MOBILE).await.unwrap();
        login.submit_otp(MOBILE, VALID_OTP, 2).await.unwrap();

        let otp_call = backend.last_call("/auth/send-otp").unwrap();
        assert_eq!(backend.decrypt_body(&otp_call), json!({ "mobileNumber": MOBILE }));

        let token_calls = backend.calls("/auth/token");
        assert_eq!(token_calls.len(), 2);
        for call in &token_calls {
            assert_eq!(
                call.authorization.as_deref(),
                Some("Basic OTg3NjU0MzIxMDoxMjM0NTY=")
            );
            assert!(call.body.is_empty());
        }

        let validate = backend.last_call("/auth/validate-otp").unwrap();
        assert_eq!(validate.authorization.as_deref(), Some("Bearer t1"));
        assert_eq!(
            backend.decrypt_body(&validate),
            json!({ "mobileNumber": MOBILE, "otpCode": VALID_OTP, "userTypeId": 2 })
        );
    }

    #[tokio::test]
    async fn later_calls_use_the_final_token() {
        let backend = MockBackend::start().await;
        let mut login = login(&backend, TokenStore::default());

        login.request_otp(MOBILE).await.unwrap();
        login.submit_otp(MOBILE, VALID_OTP, 1).await.unwrap();
        login.gateway().get("/candidates").await.unwrap();

        let call = backend.last_call("/candidates").unwrap();
        assert_eq!(call.authorization.as_deref(), Some("Bearer f1"));
    }

    #[tokio::test]
    async fn wrong_otp_is_rejected_without_session() {
        let backend = MockBackend::start().await;
        let store = TokenStore::default();
        let mut login = login(&backend, store.clone());

        login.request_otp(MOBILE).await.unwrap();
        login.issue_temporary_token(MOBILE, "000000").await.unwrap();
        let error = login.validate_otp(MOBILE, "000000", 1).await.unwrap_err();

        match error {
            AuthError::OtpValidation { status, message } => {
                assert_eq!(status, 1);
                assert_eq!(message, "Invalid OTP");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(login.state(), AuthState::Rejected);
        assert!(store.get().is_none());
        assert_eq!(backend.calls("/auth/token").len(), 1);
    }

    #[tokio::test]
    async fn rejected_only_accepts_a_new_otp_request() {
        let backend = MockBackend::start().await;
        let mut login = login(&backend, TokenStore::default());

        login.request_otp(MOBILE).await.unwrap();
        login.submit_otp(MOBILE, "000000", 1).await.unwrap_err();

        let error = login.issue_temporary_token(MOBILE, VALID_OTP).await.unwrap_err();
        assert!(matches!(
            error,
            AuthError::OutOfOrder {
                actual: AuthState::Rejected,
                ..
            }
        ));

        login.request_otp(MOBILE).await.unwrap();
        login.submit_otp(MOBILE, VALID_OTP, 1).await.unwrap();
        assert_eq!(login.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn validation_requires_a_temporary_token() {
        let backend = MockBackend::start().await;
        let mut login = login(&backend, TokenStore::default());

        let error = login.validate_otp(MOBILE, VALID_OTP, 1).await.unwrap_err();
        assert!(matches!(
            error,
            AuthError::OutOfOrder {
                expected: "TempTokenIssued",
                actual: AuthState::Unauthenticated,
            }
        ));

        login.request_otp(MOBILE).await.unwrap();
        let error = login.validate_otp(MOBILE, VALID_OTP, 1).await.unwrap_err();
        assert!(matches!(error, AuthError::OutOfOrder { .. }));
        assert!(backend.calls("/auth/validate-otp").is_empty());
    }

    #[tokio::test]
    async fn temporary_token_is_single_use() {
        let backend = MockBackend::start().await;
        let mut login = login(&backend, TokenStore::default());

        login.request_otp(MOBILE).await.unwrap();
        login.submit_otp(MOBILE, VALID_OTP, 1).await.unwrap();

        let error = login.validate_otp(MOBILE, VALID_OTP, 1).await.unwrap_err();
        assert!(matches!(
            error,
            AuthError::OutOfOrder {
                actual: AuthState::Authenticated,
                ..
            }
        ));
        assert_eq!(backend.calls("/auth/validate-otp").len(), 1);
    }

    #[tokio::test]
    async fn final_token_failure_leaves_no_session() {
        let backend = MockBackend::start().await;
        backend.fail_final_token();
        let store = TokenStore::default();
        let mut login = login(&backend, store.clone());

        login.request_otp(MOBILE).await.unwrap();
        let error = login.submit_otp(MOBILE, VALID_OTP, 1).await.unwrap_err();

        assert!(matches!(error, AuthError::TokenIssuance(_)), "{error:?}");
        assert_eq!(login.state(), AuthState::Rejected);
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn otp_request_failures_are_reported() {
        let backend = MockBackend::start().await;
        backend.reply(
            "/auth/send-otp",
            Reply::json(json!({ "status": 3, "message": "Mobile number not registered" })),
        );
        let mut login = login(&backend, TokenStore::default());

        let error = login.request_otp(MOBILE).await.unwrap_err();
        match error {
            AuthError::OtpRequest(message) => {
                assert!(message.contains("Mobile number not registered"), "{message}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(login.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn token_response_without_token_fails_issuance() {
        let backend = MockBackend::start().await;
        backend.reply("/auth/token", Reply::json(json!({ "status": 0, "data": { "token": "" } })));
        let mut login = login(&backend, TokenStore::default());

        login.request_otp(MOBILE).await.unwrap();
        let error = login.issue_temporary_token(MOBILE, VALID_OTP).await.unwrap_err();
        assert!(matches!(error, AuthError::TokenIssuance(_)));
        assert_eq!(login.state(), AuthState::OtpRequested);
    }

    #[tokio::test]
    async fn token_endpoint_http_error_fails_issuance() {
        let backend = MockBackend::start().await;
        backend.reply(
            "/auth/token",
            Reply::json(json!({ "access_token": "t9" })).with_http_status(401),
        );

        let error = issue_token(&backend.client(TokenStore::default()), "/auth/token", MOBILE, VALID_OTP)
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::TokenIssuance(_)));
    }

    #[tokio::test]
    async fn logout_clears_persisted_session() {
        let backend = MockBackend::start().await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = TokenStore::persistent(SessionFile::new(&path), DEFAULT_SESSION_TTL);
        let mut login = login(&backend, store.clone());

        login.request_otp(MOBILE).await.unwrap();
        login.submit_otp(MOBILE, VALID_OTP, 1).await.unwrap();
        assert!(path.exists());

        let reopened = TokenStore::persistent(SessionFile::new(&path), DEFAULT_SESSION_TTL);
        assert_eq!(reopened.init().unwrap().unwrap().bearer(), "f1");

        login.logout().unwrap();
        assert_eq!(login.state(), AuthState::Unauthenticated);
        assert!(store.get().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn new_handshake_drops_earlier_session() {
        let backend = MockBackend::start().await;
        let store = TokenStore::default();
        store
            .set(Session::new("old", UserInfo(json!({ "id": 1 }))))
            .unwrap();
        let mut login = login(&backend, store.clone());

        login.request_otp(MOBILE).await.unwrap();
        assert!(store.get().is_none());

        login.submit_otp(MOBILE, "000000", 1).await.unwrap_err();
        assert_eq!(login.state(), AuthState::Rejected);
        assert!(store.bearer().is_none());

        login.gateway().get("/candidates").await.unwrap();
        let call = backend.last_call("/candidates").unwrap();
        assert_eq!(call.authorization.as_deref().map(str::trim_end), Some("Bearer"));
    }

    #[tokio::test]
    async fn failed_otp_request_keeps_current_session() {
        let backend = MockBackend::start().await;
        backend.reply("/auth/send-otp", Reply::json(json!({ "status": 2, "message": "Try later" })));
        let store = TokenStore::default();
        store
            .set(Session::new("old", UserInfo(json!({ "id": 1 }))))
            .unwrap();
        let mut login = login(&backend, store.clone());

        login.request_otp(MOBILE).await.unwrap_err();
        assert_eq!(login.state(), AuthState::Authenticated);
        assert_eq!(store.bearer().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn sealed_token_response_is_opened() {
        let backend = MockBackend::start().await;
        let sealed = backend.codec().encrypt(&json!({ "access_token": "t7" })).unwrap();
        backend.reply("/auth/token", Reply::json(json!({ "enc_data": sealed.enc_data })));

        let token = issue_token(&backend.client(TokenStore::default()), "/auth/token", MOBILE, VALID_OTP)
            .await
            .unwrap();
        assert_eq!(token, "t7");
    }

    #[tokio::test]
    async fn forged_sealed_token_response_fails_issuance() {
        let backend = MockBackend::start().await;
        let other = EnvelopeCodec::new(&[0xAA; 32], NoncePolicy::Random).unwrap();
        let sealed = other.encrypt(&json!({ "access_token": "t7" })).unwrap();
        backend.reply("/auth/token", Reply::json(json!({ "enc_data": sealed.enc_data })));

        let error = issue_token(&backend.client(TokenStore::default()), "/auth/token", MOBILE, VALID_OTP)
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::TokenIssuance(_)), "{error:?}");
    }

    #[tokio::test]
    async fn starts_authenticated_with_existing_session() {
        let backend = MockBackend::start().await;
        let store = TokenStore::default();
        store
            .set(Session::new("f0", UserInfo(json!({ "id": 1 }))))
            .unwrap();

        let login = login(&backend, store);
        assert_eq!(login.state(), AuthState::Authenticated);
    }

    #[test]
    fn token_is_found_at_any_known_location() {
        let codec = EnvelopeCodec::new(&[1u8; 32], NoncePolicy::Random).unwrap();

        let cases = [
            (json!({ "access_token": "a" }), "a"),
            (json!({ "token": "b" }), "b"),
            (json!({ "data": { "access_token": "c" } }), "c"),
            (json!({ "data": { "token": "d" } }), "d"),
            (json!({ "access_token": "", "token": "e" }), "e"),
        ];
        for (body, expected) in cases {
            assert_eq!(
                extract_access_token(&codec, body).as_deref(),
                Some(expected)
            );
        }

        assert_eq!(extract_access_token(&codec, json!({ "status": 0 })), None);
        assert_eq!(extract_access_token(&codec, json!({ "token": 5 })), None);
    }

    #[test]
    fn token_inside_encrypted_data_is_found() {
        let codec = EnvelopeCodec::new(&[1u8; 32], NoncePolicy::Random).unwrap();
        let enc = codec.encrypt(&json!({ "access_token": "f1" })).unwrap();

        let body = json!({ "status": 0, "data": enc.enc_data });
        assert_eq!(extract_access_token(&codec, body).as_deref(), Some("f1"));
    }
}
