//! OS keyring backend for the rollback trust anchor.
//!
//! Stores the highest committed revision of each vault in the operating
//! system's secure credential store:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)
//!
//! Errors are returned as `TrustAnchor`; the caller decides whether to
//! fall back to the file store.

use crate::errors::{LockboxError, Result};
use crate::rollback::TrustStore;

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "lockbox";

/// Trust store backed by the OS keyring.
#[derive(Debug, Clone, Default)]
pub struct KeyringTrustStore;

impl KeyringTrustStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(name: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE_NAME, name).map_err(|e| {
            LockboxError::TrustAnchor(format!("failed to create keyring entry: {e}"))
        })
    }
}

impl TrustStore for KeyringTrustStore {
    fn get(&self, name: &str) -> Result<Option<u64>> {
        match Self::entry(name)?.get_password() {
            Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|e| {
                LockboxError::TrustAnchor(format!("keyring holds a corrupt anchor: {e}"))
            }),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(LockboxError::TrustAnchor(format!(
                "failed to read from keyring: {e}"
            ))),
        }
    }

    fn set(&self, name: &str, revision: u64) -> Result<()> {
        Self::entry(name)?
            .set_password(&revision.to_string())
            .map_err(|e| {
                LockboxError::TrustAnchor(format!("failed to store anchor in keyring: {e}"))
            })
    }
}
