// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use crate::gateway::GatewayError;
use crate::storage::StorageError;

use super::otp::AuthState;

/// Failure of a step of the OTP handshake.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The OTP could not be requested.
    #[error("OTP request failed: {0}")]
    OtpRequest(String),

    /// No usable token came back from the token endpoint.
    #[error("token issuance failed: {0}")]
    TokenIssuance(String),

    /// The backend rejected the OTP.
    #[error("OTP validation rejected with status {status}: {message}")]
    OtpValidation { status: i64, message: String },

    /// A step was called before the step it depends on.
    #[error("{actual:?} cannot be followed by this step, expected {expected}")]
    OutOfOrder {
        expected: &'static str,
        actual: AuthState,
    },

    /// The validation call itself failed.
    #[error("OTP validation failed: {0}")]
    Transport(#[source] GatewayError),

    /// The session could not be persisted.
    #[error("session could not be stored: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Stable code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::OtpRequest(_) => "otp_request_failed",
            AuthError::TokenIssuance(_) => "token_issuance_failed",
            AuthError::OtpValidation { .. } => "otp_rejected",
            AuthError::OutOfOrder { .. } => "out_of_order",
            AuthError::Transport(_) => "transport_error",
            AuthError::Storage(_) => "storage_error",
        }
    }
}
