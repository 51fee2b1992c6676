// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated session: final bearer token plus the user record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::token::Token;

/// User record returned by a successful OTP validation.
///
/// The backend owns the shape; the client only reads a few well-known
/// fields for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInfo(pub Value);

impl UserInfo {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Display name, if the record carries one.
    pub fn display_name(&self) -> Option<&str> {
        ["name", "fullName", "userName"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }
}

/// Established session.
///
/// Built from a bearer value rather than a [`Token`], so a session can only
/// ever carry a [`TokenKind::Final`] token.
///
/// [`TokenKind::Final`]: super::token::TokenKind::Final
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Token,
    pub user: UserInfo,
}

impl Session {
    pub fn new(final_bearer: impl Into<String>, user: UserInfo) -> Self {
        Self {
            access_token: Token::final_token(final_bearer),
            user,
        }
    }

    pub fn bearer(&self) -> &str {
        &self.access_token.value
    }
}
