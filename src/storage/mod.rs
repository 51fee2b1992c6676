// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Storage
//!
//! Holds the authenticated session (final bearer token and user record).
//!
//! - [`TokenStore`] is the in-process handle shared by the handshake and the
//!   gateway client.
//! - [`SessionFile`] optionally persists the session across runs, with the
//!   same fixed expiry as the in-memory copy.
//!
//! Token and user record are one value everywhere: in memory, on disk, and
//! in every snapshot handed to readers.

pub mod session_file;
pub mod token_store;

pub use session_file::{SessionFile, StorageError, StorageResult, StoredSession};
pub use token_store::{TokenStore, DEFAULT_SESSION_TTL};
