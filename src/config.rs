// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once, when the client is
//! built. Key material is consumed only by the envelope codec and is never
//! printed.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GATEWAY_BASE_URL` | Backend base URL | Required |
//! | `GATEWAY_ENC_KEY` | Base64 AES key (16 or 32 bytes) | Required |
//! | `GATEWAY_ENC_IV` | Base64 12-byte IV, enables fixed-IV envelopes | Unset |
//! | `GATEWAY_TIMEOUT_SECS` | Per-call timeout in seconds | `15` |
//! | `GATEWAY_OTP_PATH` | OTP request endpoint | `/auth/send-otp` |
//! | `GATEWAY_TOKEN_PATH` | Token issuance endpoint | `/auth/token` |
//! | `GATEWAY_VALIDATE_PATH` | OTP validation endpoint | `/auth/validate-otp` |
//! | `SESSION_FILE` | Session persistence file (memory only when unset) | Unset |
//! | `SESSION_TTL_HOURS` | Session lifetime in hours | `24` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use ring::aead::NONCE_LEN;
use url::Url;

use crate::envelope::{CodecError, EnvelopeCodec, NoncePolicy};
use crate::storage::{SessionFile, TokenStore};

pub const BASE_URL_ENV: &str = "GATEWAY_BASE_URL";
pub const ENC_KEY_ENV: &str = "GATEWAY_ENC_KEY";
pub const ENC_IV_ENV: &str = "GATEWAY_ENC_IV";
pub const TIMEOUT_ENV: &str = "GATEWAY_TIMEOUT_SECS";
pub const OTP_PATH_ENV: &str = "GATEWAY_OTP_PATH";
pub const TOKEN_PATH_ENV: &str = "GATEWAY_TOKEN_PATH";
pub const VALIDATE_PATH_ENV: &str = "GATEWAY_VALIDATE_PATH";
pub const SESSION_FILE_ENV: &str = "SESSION_FILE";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_HOURS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_OTP_PATH: &str = "/auth/send-otp";
pub const DEFAULT_TOKEN_PATH: &str = "/auth/token";
pub const DEFAULT_VALIDATE_PATH: &str = "/auth/validate-otp";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration missing: {0}")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Backend paths used by the OTP handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub request_otp: String,
    pub token: String,
    pub validate_otp: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            request_otp: DEFAULT_OTP_PATH.to_string(),
            token: DEFAULT_TOKEN_PATH.to_string(),
            validate_otp: DEFAULT_VALIDATE_PATH.to_string(),
        }
    }
}

/// Everything needed to build a gateway client and a token store.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    key: Vec<u8>,
    pub nonce_policy: NoncePolicy,
    pub timeout: Duration,
    pub endpoints: AuthEndpoints,
    pub session_file: Option<PathBuf>,
    pub session_ttl: chrono::Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("key", &"<redacted>")
            .field("nonce_policy", &self.nonce_policy)
            .field("timeout", &self.timeout)
            .field("endpoints", &self.endpoints)
            .field("session_file", &self.session_file)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the URL and key.
    pub fn new(base_url: &str, key: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            key: key.into(),
            nonce_policy: NoncePolicy::Random,
            timeout: DEFAULT_TIMEOUT,
            endpoints: AuthEndpoints::default(),
            session_file: None,
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        })
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = var(BASE_URL_ENV).ok_or(ConfigError::Missing(BASE_URL_ENV))?;
        let key = var(ENC_KEY_ENV)
            .ok_or(ConfigError::Missing(ENC_KEY_ENV))
            .and_then(|v| decode_base64(ENC_KEY_ENV, &v))?;
        if key.len() != 16 && key.len() != 32 {
            return Err(ConfigError::Invalid {
                name: ENC_KEY_ENV,
                reason: format!("expected 16 or 32 bytes, got {}", key.len()),
            });
        }

        let mut config = Self::new(&base_url, key)?;

        if let Some(iv) = var(ENC_IV_ENV) {
            let iv = decode_base64(ENC_IV_ENV, &iv)?;
            let iv: [u8; NONCE_LEN] = iv.as_slice().try_into().map_err(|_| ConfigError::Invalid {
                name: ENC_IV_ENV,
                reason: format!("expected {NONCE_LEN} bytes, got {}", iv.len()),
            })?;
            config.nonce_policy = NoncePolicy::Fixed(iv);
        }

        if let Some(secs) = var(TIMEOUT_ENV) {
            let secs = parse_positive(TIMEOUT_ENV, &secs)?;
            config.timeout = Duration::from_secs(secs.unsigned_abs());
        }

        if let Some(hours) = var(SESSION_TTL_ENV) {
            let hours = parse_positive(SESSION_TTL_ENV, &hours)?;
            config.session_ttl =
                chrono::Duration::try_hours(hours).ok_or_else(|| ConfigError::Invalid {
                    name: SESSION_TTL_ENV,
                    reason: format!("{hours} hours is out of range"),
                })?;
        }

        if let Some(path) = var(OTP_PATH_ENV) {
            config.endpoints.request_otp = path;
        }
        if let Some(path) = var(TOKEN_PATH_ENV) {
            config.endpoints.token = path;
        }
        if let Some(path) = var(VALIDATE_PATH_ENV) {
            config.endpoints.validate_otp = path;
        }

        config.session_file = var(SESSION_FILE_ENV).map(PathBuf::from);

        Ok(config)
    }

    pub fn with_nonce_policy(mut self, policy: NoncePolicy) -> Self {
        self.nonce_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Build the envelope codec from the configured key material.
    pub fn codec(&self) -> Result<EnvelopeCodec, CodecError> {
        EnvelopeCodec::new(&self.key, self.nonce_policy)
    }

    /// Build a token store, file-backed when `session_file` is set.
    pub fn token_store(&self) -> TokenStore {
        match &self.session_file {
            Some(path) => TokenStore::persistent(SessionFile::new(path), self.session_ttl),
            None => TokenStore::in_memory(self.session_ttl),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: BASE_URL_ENV,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name: BASE_URL_ENV,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn decode_base64(name: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    Base64::decode_vec(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("not valid base64: {e}"),
    })
}

fn parse_positive(name: &'static str, value: &str) -> Result<i64, ConfigError> {
    match value.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a positive integer, got '{value}'"),
        }),
    }
}
