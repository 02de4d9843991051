use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in Lockbox.
#[derive(Debug, Error)]
pub enum LockboxError {
    // --- Crypto errors ---
    /// Wrong passphrase or corrupted ciphertext. Deliberately carries no
    /// detail about which of the two happened.
    #[error("Authentication failed — wrong passphrase or corrupted vault")]
    Authentication,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Rollback guard ---
    #[error("Rollback detected — vault revision {found} is older than trusted revision {trusted}")]
    RollbackDetected { found: u64, trusted: u64 },

    #[error("Revision counter exhausted — the vault cannot be saved again")]
    Overflow,

    #[error("Trust anchor error: {0}")]
    TrustAnchor(String),

    // --- Session errors ---
    #[error("Vault is locked out after repeated failures — try again in {0} seconds")]
    LockedOut(u64),

    #[error("Vault is locked — unlock it first")]
    NotUnlocked,

    // --- Vault file errors ---
    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    #[error("Invalid vault format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported vault format version {0} — upgrade lockbox to open it")]
    UnsupportedVersion(u8),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Another save is already in progress for this vault")]
    SaveInProgress,

    #[error("Vault changed on disk (expected revision {expected}, found {found}) — reopen it")]
    Conflict { expected: u64, found: u64 },

    #[error("Persistence error: {0}")]
    Persistence(String),

    // --- Vault content errors ---
    #[error("No credentials stored for service '{0}'")]
    ServiceNotFound(String),

    #[error("Note '{0}' not found")]
    NoteNotFound(String),

    #[error("Note '{0}' already exists")]
    NoteAlreadyExists(String),

    // --- Clipboard errors ---
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl LockboxError {
    /// Whether this failure counts against the failed-attempt limit.
    ///
    /// Only outcomes of the cryptographic pipeline do; a missing file or
    /// an I/O error says nothing about the passphrase.
    pub fn counts_as_failed_attempt(&self) -> bool {
        matches!(
            self,
            LockboxError::Authentication | LockboxError::RollbackDetected { .. }
        )
    }
}

/// Convenience type alias for Lockbox results.
pub type Result<T> = std::result::Result<T, LockboxError>;
