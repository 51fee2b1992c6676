// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoding of the `data` field of a response.
//!
//! Some endpoints encrypt `data`, others return plain JSON or a plain
//! string, and the client cannot tell in advance. Decoding is therefore an
//! ordered sequence of attempts, and the attempt that succeeded is reported
//! alongside the value:
//!
//! 1. not a string: passed through ([`DataDecoding::Structured`] / [`DataDecoding::Empty`])
//! 2. decrypts to JSON ([`DataDecoding::Decrypted`])
//! 3. decrypts to non-JSON text ([`DataDecoding::DecryptedText`])
//! 4. does not decrypt, parses as JSON ([`DataDecoding::PlainJson`])
//! 5. otherwise the original string ([`DataDecoding::Raw`])

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{CodecError, Decrypted, EnvelopeCodec};

/// Which decoding step produced a response's `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataDecoding {
    /// `data` was `null` or absent.
    Empty,
    /// `data` was already structured JSON; no decryption attempted.
    Structured,
    /// `data` was an envelope whose plaintext is JSON.
    Decrypted,
    /// `data` was an envelope whose plaintext is a plain string.
    DecryptedText,
    /// `data` was not an envelope but a JSON document in a string.
    PlainJson,
    /// `data` was a string that neither decrypted nor parsed.
    Raw,
}

/// Decode `data` according to the sequence described in the module docs.
pub fn decode_data(codec: &EnvelopeCodec, data: Value) -> (Value, DataDecoding) {
    let text = match data {
        Value::Null => return (Value::Null, DataDecoding::Empty),
        Value::String(text) => text,
        structured => return (structured, DataDecoding::Structured),
    };

    match decrypt_step(codec, &text) {
        Ok(Decrypted::Json(value)) => return (value, DataDecoding::Decrypted),
        Ok(Decrypted::Text(plain)) => return (Value::String(plain), DataDecoding::DecryptedText),
        Err(CodecError::Decryption) => {
            warn!(len = text.len(), "Response data failed authentication, treating as plaintext");
        }
        Err(e) => {
            debug!(error = %e, "Response data is not an envelope");
        }
    }

    if let Some(value) = plain_json_step(&text) {
        return (value, DataDecoding::PlainJson);
    }

    (Value::String(text), DataDecoding::Raw)
}

fn decrypt_step(codec: &EnvelopeCodec, text: &str) -> Result<Decrypted, CodecError> {
    codec.decrypt_str(text)
}

fn plain_json_step(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}
