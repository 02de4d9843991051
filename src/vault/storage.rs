//! On-disk persistence: atomic writes, owner-only permissions, and the
//! `VaultFile` handle that loads and saves envelopes.
//!
//! Every write goes to a uniquely named temp file in the destination
//! directory, is flushed with `fsync`, and is then renamed over the
//! target.  A reader sees either the old file or the new one, never a
//! partial write.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::format::{self, Envelope};
use super::migrate::LegacyFile;
use crate::errors::{LockboxError, Result};

/// File name of the current-format envelope.
pub const VAULT_FILE: &str = "vault.lbx";

/// File name used by the JSON formats (v1, v2).
pub const LEGACY_VAULT_FILE: &str = "vault.json";

/// What `VaultFile::load` found on disk.
#[derive(Debug)]
pub enum StoredVault {
    Current(Envelope),
    Legacy(LegacyFile),
}

/// Handle to the vault files inside a vault directory.
#[derive(Debug, Clone)]
pub struct VaultFile {
    dir: PathBuf,
}

impl VaultFile {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the current-format envelope.
    pub fn path(&self) -> PathBuf {
        self.dir.join(VAULT_FILE)
    }

    /// Path of a legacy JSON vault, if one was ever written here.
    pub fn legacy_path(&self) -> PathBuf {
        self.dir.join(LEGACY_VAULT_FILE)
    }

    /// Returns `true` if either a current or a legacy vault exists.
    pub fn exists(&self) -> bool {
        self.path().exists() || self.legacy_path().exists()
    }

    /// Read and structurally validate whatever vault is on disk.
    ///
    /// The current envelope takes precedence over a leftover legacy file.
    pub fn load(&self) -> Result<StoredVault> {
        let path = self.path();
        if path.exists() {
            let data = fs::read(&path)?;
            debug!(path = %path.display(), bytes = data.len(), "read vault envelope");
            return Envelope::from_bytes(&data).map(StoredVault::Current);
        }

        let legacy = self.legacy_path();
        if legacy.exists() {
            let data = fs::read(&legacy)?;
            debug!(path = %legacy.display(), "read legacy vault file");
            return LegacyFile::parse(&data).map(StoredVault::Legacy);
        }

        Err(LockboxError::VaultNotFound(path))
    }

    /// Read only the current envelope (no legacy fallback).
    pub fn load_current(&self) -> Result<Envelope> {
        match self.load()? {
            StoredVault::Current(envelope) => Ok(envelope),
            StoredVault::Legacy(_) => Err(LockboxError::Migration(
                "vault is still in a legacy format — unlock it once to migrate".into(),
            )),
        }
    }

    /// Atomically write `envelope`.
    ///
    /// `expected_revision` is the revision the caller believes is on disk;
    /// `None` means no envelope may exist yet.  A mismatch is a
    /// `Conflict` and nothing is written.  Only one save per vault file
    /// may be in flight inside this process.
    pub fn save(&self, envelope: &Envelope, expected_revision: Option<u64>) -> Result<()> {
        let path = self.path();
        let _in_flight = InFlight::acquire(&path)?;

        match (expected_revision, path.exists()) {
            (None, true) => return Err(LockboxError::VaultAlreadyExists(path)),
            (Some(expected), true) => {
                let found = format::peek_revision(&fs::read(&path)?)?;
                if found != expected {
                    warn!(expected, found, "refusing to overwrite a newer vault revision");
                    return Err(LockboxError::Conflict { expected, found });
                }
            }
            (Some(_), false) => {
                return Err(LockboxError::VaultNotFound(path));
            }
            (None, false) => {}
        }

        write_atomic(&path, &envelope.to_bytes())?;
        debug!(path = %path.display(), revision = envelope.revision, "committed vault envelope");
        Ok(())
    }

    /// Remove the legacy file once its migrated replacement is committed.
    pub fn remove_legacy(&self) -> Result<()> {
        let legacy = self.legacy_path();
        if legacy.exists() {
            fs::remove_file(&legacy)?;
            sync_dir(&self.dir);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// One save in flight per path
// ---------------------------------------------------------------------------

fn in_flight() -> &'static Mutex<HashSet<PathBuf>> {
    static SAVES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    SAVES.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Registration of a running save; released on drop.
struct InFlight {
    path: PathBuf,
}

impl InFlight {
    fn acquire(path: &Path) -> Result<Self> {
        let mut saves = in_flight()
            .lock()
            .map_err(|_| LockboxError::Persistence("save registry poisoned".into()))?;
        if !saves.insert(path.to_path_buf()) {
            return Err(LockboxError::SaveInProgress);
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut saves) = in_flight().lock() {
            saves.remove(&self.path);
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` atomically with owner-only permissions.
///
/// 1. Create the parent directory (0700) if needed.
/// 2. Write to a temp file in the same directory and `fsync` it.
/// 3. Rename the temp file over `path`, then `fsync` the directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    ensure_private_dir(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    restrict_file(temp.path())?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| LockboxError::Persistence(format!("atomic rename failed: {}", e.error)))?;

    sync_dir(parent);
    Ok(())
}

/// Create `dir` (and parents) and restrict it to the owner.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    restrict_dir(dir)
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<()> {
    // No portable owner-only mode here; rely on the user profile ACLs.
    Ok(())
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Flush directory metadata so the rename itself is durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "could not fsync directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn files_and_dirs_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("vault");
        let path = dir.join("data.bin");
        write_atomic(&path, b"x").unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn second_concurrent_save_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(VAULT_FILE);

        let first = InFlight::acquire(&path).unwrap();
        assert!(matches!(
            InFlight::acquire(&path),
            Err(LockboxError::SaveInProgress)
        ));
        drop(first);
        assert!(InFlight::acquire(&path).is_ok());
    }

    #[test]
    fn load_missing_vault_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let file = VaultFile::new(tmp.path());
        assert!(matches!(file.load(), Err(LockboxError::VaultNotFound(_))));
        assert!(!file.exists());
    }
}
