//! Trust-anchor backends that do not need the OS keyring.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use super::TrustStore;
use crate::errors::{LockboxError, Result};
use crate::vault::storage::write_atomic;

/// In-process anchor store.  Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrustStore {
    anchors: Arc<Mutex<HashMap<String, u64>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail, to simulate an unavailable keyring.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl TrustStore for MemoryTrustStore {
    fn get(&self, name: &str) -> Result<Option<u64>> {
        let anchors = self
            .anchors
            .lock()
            .map_err(|_| LockboxError::TrustAnchor("anchor map poisoned".into()))?;
        Ok(anchors.get(name).copied())
    }

    fn set(&self, name: &str, revision: u64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LockboxError::TrustAnchor("anchor store is read-only".into()));
        }
        let mut anchors = self
            .anchors
            .lock()
            .map_err(|_| LockboxError::TrustAnchor("anchor map poisoned".into()))?;
        anchors.insert(name.to_string(), revision);
        Ok(())
    }
}

/// Anchors kept as small files in a directory outside the vault.
///
/// Each anchor is one file named after the SHA-256 of the anchor name,
/// holding the revision as decimal text.  It offers less protection than
/// the keyring (an attacker who can roll back the vault directory may
/// also reach this one) and is meant for headless machines.
#[derive(Debug, Clone)]
pub struct FileTrustStore {
    dir: PathBuf,
}

impl FileTrustStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn anchor_path(&self, name: &str) -> PathBuf {
        let digest = Sha256::digest(name.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{hex}.anchor"))
    }
}

impl TrustStore for FileTrustStore {
    fn get(&self, name: &str) -> Result<Option<u64>> {
        let path = self.anchor_path(name);
        match fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<u64>().map(Some).map_err(|e| {
                LockboxError::TrustAnchor(format!("corrupt anchor {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockboxError::TrustAnchor(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, name: &str, revision: u64) -> Result<()> {
        write_atomic(&self.anchor_path(name), revision.to_string().as_bytes())
            .map_err(|e| LockboxError::TrustAnchor(format!("cannot write anchor: {e}")))
    }
}
