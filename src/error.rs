// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::envelope::CodecError;
use crate::gateway::GatewayError;
use crate::logging::LoggingError;
use crate::storage::StorageError;

/// Any failure surfaced by the console client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("invalid input: {0}")]
    Input(String),
}

impl Error {
    /// Stable code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Codec(CodecError::Decryption) => "decryption_failed",
            Error::Codec(_) => "codec_error",
            Error::Gateway(GatewayError::Transport { .. }) => "transport_error",
            Error::Gateway(GatewayError::Application { .. }) => "application_error",
            Error::Gateway(_) => "gateway_error",
            Error::Auth(e) => e.error_code(),
            Error::Storage(_) => "storage_error",
            Error::Logging(_) => "logging_error",
            Error::Input(_) => "invalid_input",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
