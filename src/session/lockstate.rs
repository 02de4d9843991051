//! Persisted failed-attempt counter and lockout deadline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use crate::errors::{LockboxError, Result};
use crate::vault::storage::write_atomic;

/// File name of the lock state inside the vault directory.
pub const LOCK_FILE: &str = "lock.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    #[serde(default)]
    pub failed_attempts: u32,

    /// Epoch seconds until which unlocking is refused; 0 when not locked out.
    #[serde(default)]
    pub lockout_until: u64,
}

impl LockState {
    pub fn is_locked_out(&self, now: u64) -> bool {
        now < self.lockout_until
    }

    /// Whole seconds left in the lockout, 0 if none is active.
    pub fn remaining(&self, now: u64) -> u64 {
        self.lockout_until.saturating_sub(now)
    }
}

/// `lock.json` in the vault directory.
#[derive(Debug, Clone)]
pub struct LockStateFile {
    path: PathBuf,
}

impl LockStateFile {
    pub fn new(vault_dir: &Path) -> Self {
        Self {
            path: vault_dir.join(LOCK_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the lock state.  A missing file is a clean state; a file
    /// that does not parse is an `InvalidFormat` error, which the session
    /// turns into a full lockout.
    pub fn load(&self) -> Result<LockState> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LockState::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| {
            LockboxError::InvalidFormat(format!("{}: {e}", self.path.display()))
        })
    }

    pub fn store(&self, state: &LockState) -> Result<()> {
        let json = serde_json::to_vec(state)
            .map_err(|e| LockboxError::SerializationError(format!("lock state: {e}")))?;
        write_atomic(&self.path, &json)
    }
}
