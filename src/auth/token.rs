// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer tokens and login credentials.

use std::fmt;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

/// Scope of a bearer token, decided by where it was issued in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Authorizes exactly one OTP validation call.
    Temporary,
    /// Authorizes every call after a successful OTP validation.
    Final,
}

/// Opaque bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn temporary(value: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Temporary,
            value: value.into(),
        }
    }

    pub fn final_token(value: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Final,
            value: value.into(),
        }
    }

    pub fn is_final(&self) -> bool {
        self.kind == TokenKind::Final
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Login credential, held only for the duration of one attempt.
///
/// Serializes to the body the validation endpoint expects.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub mobile_number: String,
    pub otp_code: String,
    pub user_type_id: i64,
}

impl Credential {
    pub fn new(mobile_number: impl Into<String>, otp_code: impl Into<String>, user_type_id: i64) -> Self {
        Self {
            mobile_number: mobile_number.into(),
            otp_code: otp_code.into(),
            user_type_id,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("mobile_number", &self.mobile_number)
            .field("otp_code", &"<redacted>")
            .field("user_type_id", &self.user_type_id)
            .finish()
    }
}

/// `Authorization` value for the token endpoint: `Basic base64(mobile:otp)`.
pub fn basic_authorization(mobile_number: &str, otp_code: &str) -> String {
    let pair = format!("{mobile_number}:{otp_code}");
    format!("Basic {}", Base64::encode_string(pair.as_bytes()))
}

/// `Authorization` value for gateway calls. An absent token yields an empty
/// bearer, which unauthenticated endpoints accept.
pub fn bearer_authorization(token: Option<&str>) -> String {
    format!("Bearer {}", token.unwrap_or_default())
}
