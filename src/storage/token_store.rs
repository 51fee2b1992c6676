// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single source of truth for the current session.
//!
//! The store hands out `Arc<Session>` snapshots. A snapshot always pairs the
//! bearer token with the user record it was issued for, because both are
//! swapped in and out as one value.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::session_file::{SessionFile, StorageResult, StoredSession};
use crate::auth::Session;

/// Default session lifetime (one calendar day).
pub const DEFAULT_SESSION_TTL: Duration = Duration::days(1);

#[derive(Debug)]
struct Current {
    session: Arc<Session>,
    expires_at: DateTime<Utc>,
}

/// Shared handle to the current session.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone)]
pub struct TokenStore {
    current: Arc<RwLock<Option<Current>>>,
    /// Serializes `set`/`clear` so the file and memory never disagree.
    writer: Arc<Mutex<()>>,
    file: Option<SessionFile>,
    ttl: Duration,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory(DEFAULT_SESSION_TTL)
    }
}

impl TokenStore {
    /// Store that keeps the session in process memory only.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            writer: Arc::new(Mutex::new(())),
            file: None,
            ttl,
        }
    }

    /// Store backed by a session file.
    ///
    /// Call [`TokenStore::init`] to pick up a session left by a previous run.
    pub fn persistent(file: SessionFile, ttl: Duration) -> Self {
        Self {
            file: Some(file),
            ..Self::in_memory(ttl)
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Load a persisted session, discarding it if it has expired or does not
    /// carry a final token.
    pub fn init(&self) -> StorageResult<Option<Arc<Session>>> {
        let Some(file) = &self.file else {
            return Ok(self.get());
        };

        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(stored) = file.load()? else {
            return Ok(None);
        };

        if stored.is_expired_at(Utc::now()) {
            info!(path = %file.path().display(), "Persisted session expired, removing");
            file.remove()?;
            return Ok(None);
        }

        if !stored.session.access_token.is_final() {
            warn!(path = %file.path().display(), "Persisted session holds a non-final token, removing");
            file.remove()?;
            return Ok(None);
        }

        let session = Arc::new(stored.session);
        self.replace(Some(Current {
            session: session.clone(),
            expires_at: stored.expires_at,
        }));
        debug!(expires_at = %stored.expires_at, "Restored persisted session");
        Ok(Some(session))
    }

    /// Install a new session, replacing any previous one.
    pub fn set(&self, session: Session) -> StorageResult<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let expires_at = Utc::now() + self.ttl;
        if let Some(file) = &self.file {
            file.save(&StoredSession {
                session: session.clone(),
                expires_at,
            })?;
        }

        self.replace(Some(Current {
            session: Arc::new(session),
            expires_at,
        }));
        info!(expires_at = %expires_at, "Session stored");
        Ok(())
    }

    /// Current session, or `None` if absent or expired.
    pub fn get(&self) -> Option<Arc<Session>> {
        let (session, expires_at) = {
            let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
            let current = current.as_ref()?;
            (current.session.clone(), current.expires_at)
        };

        if Utc::now() >= expires_at {
            if let Err(e) = self.expire(&session) {
                warn!(error = %e, "Failed to remove expired session");
            }
            return None;
        }

        Some(session)
    }

    /// Bearer value of the current session.
    pub fn bearer(&self) -> Option<String> {
        self.get().map(|session| session.bearer().to_string())
    }

    /// Expiry of the current session.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.as_ref().map(|current| current.expires_at)
    }

    /// Drop the token and the user record together.
    pub fn clear(&self) -> StorageResult<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        self.replace(None);
        if let Some(file) = &self.file {
            file.remove()?;
        }
        debug!("Session cleared");
        Ok(())
    }

    /// Drop `observed`, unless a writer has already replaced it.
    fn expire(&self, observed: &Arc<Session>) -> StorageResult<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let unchanged = matches!(
                current.as_ref(),
                Some(existing) if Arc::ptr_eq(&existing.session, observed)
            );
            if !unchanged {
                return Ok(());
            }
            *current = None;
        }

        if let Some(file) = &self.file {
            file.remove()?;
        }
        info!("Session expired");
        Ok(())
    }

    fn replace(&self, next: Option<Current>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = next;
    }
}
