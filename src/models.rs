// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types shared by the codec, the gateway and the handshake.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Encrypted request or response body.
///
/// Substituted for the whole plaintext body on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub enc_data: String,
}

impl From<String> for EncryptedEnvelope {
    fn from(enc_data: String) -> Self {
        Self { enc_data }
    }
}

/// Response body as returned by the backend, before `data` is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub status: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Status value the backend uses for success.
pub const STATUS_OK: i64 = 0;
