// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Secure API Gateway
//!
//! Every backend call from the console goes through [`GatewayClient`]:
//!
//! 1. the bearer token of the current session is attached (an empty bearer
//!    when there is no session),
//! 2. the request body is sealed into `{"enc_data": "..."}`,
//! 3. the response `{status, message, data}` is parsed and `data` is run
//!    through the decode sequence in [`decode`],
//! 4. a [`GatewayResult`] is returned.
//!
//! `status != 0` is an application result, not an error. Only transport
//! and envelope failures are `Err`.

pub mod client;
pub mod decode;
pub mod error;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::models::STATUS_OK;

pub use client::GatewayClient;
pub use decode::{decode_data, DataDecoding};
pub use error::GatewayError;
pub use reqwest::Method;

/// Normalized outcome of a gateway call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResult {
    pub status: i64,
    pub message: String,
    pub data: Value,
    pub decoding: DataDecoding,
}

impl GatewayResult {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Turn a non-zero status into [`GatewayError::Application`].
    pub fn into_success(self) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GatewayError::Application {
                status: self.status,
                message: self.message,
            })
        }
    }

    /// Deserialize `data` into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}
