//! Rollback protection.
//!
//! Every envelope carries a monotonically increasing revision.  The
//! highest revision ever committed is also recorded in a trust anchor
//! that lives *outside* the vault directory (the OS keyring by default).
//! Opening a vault whose revision is lower than the anchor means an old
//! copy of the file was restored, and the unlock is refused.

mod stores;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{LockboxError, Result};

pub use stores::{FileTrustStore, MemoryTrustStore};

/// Narrow capability for reading and writing trust anchors.
///
/// Implementations must be safe to share across threads; the session
/// loop and the CLI both hold one behind an `Arc`.
pub trait TrustStore: Send + Sync {
    /// Read the anchor stored under `name`, `None` if there is none yet.
    fn get(&self, name: &str) -> Result<Option<u64>>;

    /// Overwrite the anchor stored under `name`.
    fn set(&self, name: &str, revision: u64) -> Result<()>;
}

/// Compute the revision that follows `current`.
pub fn next_revision(current: u64) -> Result<u64> {
    current.checked_add(1).ok_or(LockboxError::Overflow)
}

/// Checks envelope revisions against the trust anchor of one vault.
#[derive(Clone)]
pub struct RollbackGuard {
    store: Arc<dyn TrustStore>,
    name: String,
}

impl RollbackGuard {
    pub fn new(store: Arc<dyn TrustStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    /// Guard for the vault in `vault_dir`, keyed by its canonical path so
    /// that different spellings of the same directory share an anchor.
    pub fn for_vault(store: Arc<dyn TrustStore>, vault_dir: &Path) -> Self {
        // Before `init` the directory does not exist yet; resolve its
        // parent so the name matches the one used once it does.
        let canonical = vault_dir.canonicalize().unwrap_or_else(|_| {
            match (vault_dir.parent(), vault_dir.file_name()) {
                (Some(parent), Some(name)) => parent
                    .canonicalize()
                    .map(|p| p.join(name))
                    .unwrap_or_else(|_| vault_dir.to_path_buf()),
                _ => vault_dir.to_path_buf(),
            }
        });
        Self::new(store, format!("vault:{}", canonical.display()))
    }

    /// Name of the anchor this guard reads and writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The currently trusted revision, if any.
    pub fn trusted(&self) -> Result<Option<u64>> {
        self.store.get(&self.name)
    }

    /// Accept or reject an envelope revision read from disk.
    ///
    /// A revision below the anchor is a rollback.  A revision above it
    /// (or a missing anchor) raises the anchor to match.
    pub fn verify(&self, found: u64) -> Result<()> {
        match self.trusted()? {
            Some(trusted) if found < trusted => {
                warn!(found, trusted, anchor = %self.name, "vault revision is older than trust anchor");
                Err(LockboxError::RollbackDetected { found, trusted })
            }
            Some(trusted) if found == trusted => Ok(()),
            previous => {
                debug!(found, ?previous, "raising trust anchor to vault revision");
                self.store.set(&self.name, found)
            }
        }
    }

    /// Record a durably written revision.  The anchor never moves down.
    pub fn commit(&self, revision: u64) -> Result<u64> {
        let anchored = match self.trusted()? {
            Some(trusted) => trusted.max(revision),
            None => revision,
        };
        self.store.set(&self.name, anchored)?;
        debug!(revision = anchored, "trust anchor committed");
        Ok(anchored)
    }

    /// Unconditionally set the anchor.  Only used when a new vault is
    /// created in place of whatever was there before.
    pub fn reset(&self, revision: u64) -> Result<()> {
        info!(revision, anchor = %self.name, "trust anchor reset");
        self.store.set(&self.name, revision)
    }
}

impl std::fmt::Debug for RollbackGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackGuard")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
