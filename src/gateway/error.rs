// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway errors.

use crate::envelope::CodecError;

/// Failure of a gateway call.
///
/// A backend `status != 0` is a normal [`GatewayResult`], not an error,
/// unless the caller opts in through [`GatewayResult::into_success`].
///
/// [`GatewayResult`]: super::GatewayResult
/// [`GatewayResult::into_success`]: super::GatewayResult::into_success
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network failure, timeout, or a body that is not a response envelope.
    #[error("{method} {endpoint} failed: {message}")]
    Transport {
        method: String,
        endpoint: String,
        message: String,
    },

    /// Request body could not be sealed, or a fully encrypted response body
    /// failed to open.
    #[error("envelope error: {0}")]
    Codec(#[from] CodecError),

    /// Backend answered with a non-zero status.
    #[error("backend returned status {status}: {message}")]
    Application { status: i64, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl GatewayError {
    pub(crate) fn transport(
        method: &reqwest::Method,
        endpoint: &str,
        message: impl Into<String>,
    ) -> Self {
        GatewayError::Transport {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport { .. })
    }

    /// True when an encrypted body failed authentication.
    pub fn is_decryption(&self) -> bool {
        matches!(self, GatewayError::Codec(CodecError::Decryption))
    }
}
