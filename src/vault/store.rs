//! High-level vault operations used by the session and CLI commands.
//!
//! `VaultStore` ties the crypto layer, the envelope format, the file
//! layer and the rollback guard together.  An open store holds the
//! decrypted `Vault` and the unwrapped DEK; both are zeroized when the
//! store is dropped.

use subtle::ConstantTimeEq;
use tracing::{debug, info};

use crate::crypto::kdf::SALT_LEN;
use crate::crypto::{
    decrypt_vault, derive_kek, encrypt_vault, generate_salt, unwrap_dek, wrap_dek, DataKey,
    KdfParams, WrappedKey,
};
use crate::errors::{LockboxError, Result};
use crate::rollback::{next_revision, RollbackGuard};

use super::format::{self, Envelope, CURRENT_VERSION};
use super::migrate;
use super::model::Vault;
use super::storage::{ensure_private_dir, StoredVault, VaultFile};

/// An unlocked vault.  Create one with `VaultStore::create` or
/// `VaultStore::open`.
pub struct VaultStore {
    file: VaultFile,

    /// KDF parameters and salt of the KEK the DEK is currently wrapped under.
    kdf: KdfParams,
    salt: [u8; SALT_LEN],
    wrapped_dek: WrappedKey,

    dek: DataKey,
    vault: Vault,

    /// Revision of the envelope this store last read or wrote.
    committed_revision: u64,

    /// Set by `vault_mut`, cleared by a successful `save`.
    dirty: bool,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a new, empty vault at revision 0 and reset its trust anchor.
    pub fn create(
        file: VaultFile,
        passphrase: &[u8],
        params: &KdfParams,
        guard: &RollbackGuard,
    ) -> Result<Self> {
        if file.exists() {
            return Err(LockboxError::VaultAlreadyExists(file.dir().to_path_buf()));
        }
        ensure_private_dir(file.dir())?;

        let salt = generate_salt();
        let kek = derive_kek(passphrase, &salt, params)?;
        let dek = DataKey::generate();
        let wrapped_dek = wrap_dek(&dek, &kek, CURRENT_VERSION)?;

        let vault = Vault::new();
        let payload = encrypt_vault(
            &vault.to_payload()?,
            &dek,
            &format::associated_data(CURRENT_VERSION, 0),
        )?;
        let envelope = Envelope {
            version: CURRENT_VERSION,
            revision: 0,
            kdf: *params,
            salt,
            wrapped_dek: wrapped_dek.clone(),
            payload,
        };
        file.save(&envelope, None)?;
        guard.reset(0)?;

        info!(dir = %file.dir().display(), "created vault");
        Ok(Self {
            file,
            kdf: *params,
            salt,
            wrapped_dek,
            dek,
            vault,
            committed_revision: 0,
            dirty: false,
        })
    }

    /// Run the unlock pipeline.
    ///
    /// Load the envelope, derive the KEK, unwrap the DEK, decrypt the
    /// payload, and only then check the (now authenticated) revision
    /// against the trust anchor.  A legacy vault is migrated in memory,
    /// checked against the anchor at its legacy revision, written out in
    /// the current format and the legacy file removed before the anchor
    /// is advanced.
    ///
    /// `params` are only used for the envelope a migration produces.
    pub fn open(
        file: VaultFile,
        passphrase: &[u8],
        params: &KdfParams,
        guard: &RollbackGuard,
    ) -> Result<Self> {
        match file.load()? {
            StoredVault::Current(envelope) => Self::open_current(file, envelope, passphrase, guard),
            StoredVault::Legacy(legacy) => Self::open_legacy(file, legacy, passphrase, params, guard),
        }
    }

    fn open_current(
        file: VaultFile,
        envelope: Envelope,
        passphrase: &[u8],
        guard: &RollbackGuard,
    ) -> Result<Self> {
        let kek = derive_kek(passphrase, &envelope.salt, &envelope.kdf)?;
        let dek = unwrap_dek(&envelope.wrapped_dek, &kek, envelope.version)?;
        let plaintext = decrypt_vault(&envelope.payload, &dek, &envelope.associated_data())?;
        let vault = Vault::from_payload(&plaintext, envelope.revision)?;

        guard.verify(envelope.revision)?;
        // A migration interrupted after the envelope was committed can
        // leave the superseded JSON file behind.
        file.remove_legacy()?;

        debug!(revision = envelope.revision, "vault unlocked");
        Ok(Self {
            file,
            kdf: envelope.kdf,
            salt: envelope.salt,
            wrapped_dek: envelope.wrapped_dek,
            dek,
            vault,
            committed_revision: envelope.revision,
            dirty: false,
        })
    }

    fn open_legacy(
        file: VaultFile,
        legacy: migrate::LegacyFile,
        passphrase: &[u8],
        params: &KdfParams,
        guard: &RollbackGuard,
    ) -> Result<Self> {
        let from = legacy.version();
        let migrated = migrate::migrate(legacy, passphrase, params)?;

        guard.verify(migrated.legacy_revision)?;

        let envelope = migrated.envelope;
        file.save(&envelope, None)?;
        file.remove_legacy()?;
        guard.commit(envelope.revision)?;

        info!(
            from,
            to = CURRENT_VERSION,
            revision = envelope.revision,
            "legacy vault migrated"
        );
        Ok(Self {
            file,
            kdf: envelope.kdf,
            salt: envelope.salt,
            wrapped_dek: envelope.wrapped_dek,
            dek: migrated.dek,
            vault: migrated.vault,
            committed_revision: envelope.revision,
            dirty: false,
        })
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Encrypt and atomically write the vault under the next revision,
    /// then advance the trust anchor.
    ///
    /// If the write fails nothing changes, and a retry uses the same
    /// revision.  If only the anchor update fails the envelope is already
    /// committed; the error is returned and the next unlock catches the
    /// anchor up.
    pub fn save(&mut self, guard: &RollbackGuard) -> Result<u64> {
        let revision = next_revision(self.committed_revision)?;
        let payload = encrypt_vault(
            &self.vault.to_payload()?,
            &self.dek,
            &format::associated_data(CURRENT_VERSION, revision),
        )?;
        let envelope = Envelope {
            version: CURRENT_VERSION,
            revision,
            kdf: self.kdf,
            salt: self.salt,
            wrapped_dek: self.wrapped_dek.clone(),
            payload,
        };

        self.file.save(&envelope, Some(self.committed_revision))?;
        self.committed_revision = revision;
        self.vault.set_revision(revision);
        self.dirty = false;
        debug!(revision, "vault saved");

        guard.commit(revision)?;
        Ok(revision)
    }

    /// Re-wrap the DEK under a KEK derived from `new` with a fresh salt.
    ///
    /// The payload ciphertext and the revision on disk stay as they are;
    /// only the KDF block and the wrapped DEK are replaced.  Unsaved
    /// in-memory edits are not written by this call.
    pub fn change_passphrase(&mut self, old: &[u8], new: &[u8], params: &KdfParams) -> Result<()> {
        let mut envelope = self.file.load_current()?;
        if envelope.revision != self.committed_revision {
            return Err(LockboxError::Conflict {
                expected: self.committed_revision,
                found: envelope.revision,
            });
        }

        let old_kek = derive_kek(old, &envelope.salt, &envelope.kdf)?;
        let on_disk = unwrap_dek(&envelope.wrapped_dek, &old_kek, envelope.version)?;
        if !bool::from(on_disk.as_bytes().ct_eq(self.dek.as_bytes())) {
            return Err(LockboxError::Authentication);
        }

        let salt = generate_salt();
        let kek = derive_kek(new, &salt, params)?;
        let wrapped_dek = wrap_dek(&self.dek, &kek, CURRENT_VERSION)?;

        envelope.kdf = *params;
        envelope.salt = salt;
        envelope.wrapped_dek = wrapped_dek.clone();
        self.file.save(&envelope, Some(self.committed_revision))?;

        self.kdf = *params;
        self.salt = salt;
        self.wrapped_dek = wrapped_dek;
        info!(revision = self.committed_revision, "passphrase changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Mutable access; marks the store as having unsaved changes.
    pub fn vault_mut(&mut self) -> &mut Vault {
        self.dirty = true;
        &mut self.vault
    }

    /// Revision of the last committed envelope.
    pub fn revision(&self) -> u64 {
        self.committed_revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn file(&self) -> &VaultFile {
        &self.file
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("dir", &self.file.dir())
            .field("revision", &self.committed_revision)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
