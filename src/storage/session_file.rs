// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable session record on the local filesystem.
//!
//! The bearer token and the user record live in a single JSON file so that
//! writing or removing one always writes or removes the other.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Session;

/// Error type for session persistence.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Session together with the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: Session,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// JSON file holding at most one [`StoredSession`].
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is `Ok(None)`.
    pub fn load(&self) -> StorageResult<Option<StoredSession>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(stored))
    }

    /// Write the session (atomic write via rename).
    pub fn save(&self, stored: &StoredSession) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        remove_if_present(&temp_path)?;
        {
            let file = create_private(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, stored)?;
            writer.flush()?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Delete the file. Deleting a missing file is not an error.
    pub fn remove(&self) -> StorageResult<()> {
        remove_if_present(&self.path)
    }
}

/// Create a new file readable and writable by the owner only.
fn create_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn remove_if_present(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
