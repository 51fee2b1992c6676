// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Interview Console Client - secure transport and authentication
//!
//! This crate provides the client side of the interview-management admin
//! console's backend protocol: encrypted request/response envelopes, the
//! mobile-number/OTP login handshake and bearer-token session handling.
//!
//! ## Modules
//!
//! - `envelope` - AES-GCM envelope codec (`{"enc_data": ...}`)
//! - `gateway` - HTTP client attaching tokens and decoding responses
//! - `auth` - OTP login state machine, tokens and sessions
//! - `storage` - Token store with optional file persistence
//! - `config` - Environment configuration

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
