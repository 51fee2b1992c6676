// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-GCM envelope codec.
//!
//! Every request and response body exchanged with the backend is replaced
//! by a single `enc_data` string. The string is standard padded base64 of:
//!
//! ```text
//! NoncePolicy::Random      nonce (12) || ciphertext || tag (16)
//! NoncePolicy::Fixed(iv)   ciphertext || tag (16)
//! ```
//!
//! The fixed-IV layout only exists for backends that still expect the IV to
//! be configured out of band. Reusing a GCM nonce under one key leaks the
//! XOR of plaintexts and allows tag forgery, so new deployments should stay
//! on [`NoncePolicy::Random`].

use std::fmt;
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::models::EncryptedEnvelope;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Errors produced by the envelope codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Authentication tag did not verify. The ciphertext was tampered with,
    /// truncated, or sealed under a different key or nonce.
    #[error("envelope failed authentication")]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// How nonces are chosen for each sealed envelope.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum NoncePolicy {
    /// Fresh random nonce per envelope, carried in front of the ciphertext.
    #[default]
    Random,
    /// One configured IV for every envelope, never transmitted.
    Fixed([u8; NONCE_LEN]),
}

impl fmt::Debug for NoncePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoncePolicy::Random => write!(f, "Random"),
            NoncePolicy::Fixed(_) => write!(f, "Fixed(<redacted>)"),
        }
    }
}

/// Recovered plaintext of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Decrypted {
    /// Plaintext parsed as JSON.
    Json(Value),
    /// Plaintext that is valid UTF-8 but not JSON.
    Text(String),
}

impl Decrypted {
    /// Collapse into a JSON value, wrapping plain text as a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Decrypted::Json(value) => value,
            Decrypted::Text(text) => Value::String(text),
        }
    }
}

struct CodecInner {
    key: LessSafeKey,
    rng: SystemRandom,
    policy: NoncePolicy,
}

/// Symmetric authenticated-encryption codec for request/response bodies.
///
/// Cheap to clone. The key is shared behind an `Arc` and the codec holds no
/// other mutable state, so one instance serves all in-flight requests.
#[derive(Clone)]
pub struct EnvelopeCodec {
    inner: Arc<CodecInner>,
}

impl fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("algorithm", self.inner.key.algorithm())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl EnvelopeCodec {
    /// Build a codec from raw key bytes.
    ///
    /// 16-byte keys select AES-128-GCM, 32-byte keys AES-256-GCM.
    pub fn new(key: &[u8], policy: NoncePolicy) -> Result<Self, CodecError> {
        let algorithm = match key.len() {
            16 => &AES_128_GCM,
            32 => &AES_256_GCM,
            other => {
                return Err(CodecError::InvalidKey(format!(
                    "expected 16 or 32 bytes, got {other}"
                )))
            }
        };

        let unbound = UnboundKey::new(algorithm, key)
            .map_err(|_| CodecError::InvalidKey("key rejected by AEAD".to_string()))?;

        if matches!(policy, NoncePolicy::Fixed(_)) {
            warn!("envelope codec configured with a fixed IV; nonces repeat across requests");
        }

        Ok(Self {
            inner: Arc::new(CodecInner {
                key: LessSafeKey::new(unbound),
                rng: SystemRandom::new(),
                policy,
            }),
        })
    }

    pub fn policy(&self) -> NoncePolicy {
        self.inner.policy
    }

    /// Serialize `plaintext` to JSON and seal it into an envelope.
    pub fn encrypt<T: Serialize + ?Sized>(
        &self,
        plaintext: &T,
    ) -> Result<EncryptedEnvelope, CodecError> {
        self.seal_bytes(serde_json::to_vec(plaintext)?)
    }

    /// Seal an already encoded payload.
    ///
    /// Some backend endpoints answer with sealed plain text rather than
    /// sealed JSON; [`EnvelopeCodec::decrypt`] returns those as
    /// [`Decrypted::Text`].
    pub fn seal_bytes(&self, plaintext: impl Into<Vec<u8>>) -> Result<EncryptedEnvelope, CodecError> {
        let mut in_out = plaintext.into();

        let (nonce_bytes, prefix) = match self.inner.policy {
            NoncePolicy::Random => {
                let mut nonce = [0u8; NONCE_LEN];
                self.inner
                    .rng
                    .fill(&mut nonce)
                    .map_err(|_| CodecError::Encryption("nonce generation failed".to_string()))?;
                (nonce, true)
            }
            NoncePolicy::Fixed(iv) => (iv, false),
        };

        self.inner
            .key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CodecError::Encryption("seal failed".to_string()))?;

        let wire = if prefix {
            let mut wire = Vec::with_capacity(NONCE_LEN + in_out.len());
            wire.extend_from_slice(&nonce_bytes);
            wire.extend_from_slice(&in_out);
            wire
        } else {
            in_out
        };

        Ok(EncryptedEnvelope {
            enc_data: Base64::encode_string(&wire),
        })
    }

    /// Open an envelope and recover its plaintext.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Decrypted, CodecError> {
        self.decrypt_str(&envelope.enc_data)
    }

    /// Open a raw `enc_data` string.
    pub fn decrypt_str(&self, enc_data: &str) -> Result<Decrypted, CodecError> {
        let wire = Base64::decode_vec(enc_data.trim())
            .map_err(|e| CodecError::Malformed(format!("invalid base64: {e}")))?;

        let (nonce_bytes, mut in_out) = match self.inner.policy {
            NoncePolicy::Random => {
                if wire.len() < NONCE_LEN + TAG_LEN {
                    return Err(CodecError::Malformed(format!(
                        "envelope too short: {} bytes",
                        wire.len()
                    )));
                }
                let (nonce, rest) = wire.split_at(NONCE_LEN);
                let mut nonce_bytes = [0u8; NONCE_LEN];
                nonce_bytes.copy_from_slice(nonce);
                (nonce_bytes, rest.to_vec())
            }
            NoncePolicy::Fixed(iv) => {
                if wire.len() < TAG_LEN {
                    return Err(CodecError::Malformed(format!(
                        "envelope too short: {} bytes",
                        wire.len()
                    )));
                }
                (iv, wire)
            }
        };

        let plaintext = self
            .inner
            .key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CodecError::Decryption)?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|e| CodecError::Malformed(format!("plaintext is not UTF-8: {e}")))?;

        Ok(match serde_json::from_str::<Value>(text) {
            Ok(value) => Decrypted::Json(value),
            Err(_) => Decrypted::Text(text.to_string()),
        })
    }
}
