//! Passphrase-based key derivation using Argon2id.
//!
//! The derived key is the KEK (key-encrypting key).  It never encrypts
//! vault data directly; it only wraps the DEK.  Parameters are stored in
//! the envelope header so the exact same settings are used on unlock.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::{LockboxError, Result};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Largest memory cost we accept from a file (1 GiB).
pub const MAX_MEMORY_KIB: u32 = 1_048_576;

/// Largest iteration count we accept from a file.
pub const MAX_ITERATIONS: u32 = 64;

/// Largest lane count we accept from a file.
pub const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters.
///
/// These map 1:1 to the fields in `Settings` and to the KDF block of
/// the envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Check the parameters against the accepted floor and ceiling.
    ///
    /// The ceiling matters for values read back from disk: a flipped high
    /// bit in `memory_kib` must not turn an unlock into a multi-GB
    /// allocation.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        self.check_ceiling()
    }

    /// Check only the upper bounds (and non-zero lanes and passes).
    ///
    /// Legacy files predate the floor but must still not be able to
    /// demand an unbounded allocation.
    pub fn check_ceiling(&self) -> Result<()> {
        if self.memory_kib > MAX_MEMORY_KIB {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at most {MAX_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if !(1..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 iterations must be between 1 and {MAX_ITERATIONS} (got {})",
                self.iterations
            )));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 parallelism must be between 1 and {MAX_PARALLELISM} (got {})",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// Derive a 32-byte KEK from a passphrase and salt with Argon2id.
///
/// The same passphrase + salt + params always produce the same key.
/// This is deliberately slow and blocks the calling thread.
pub fn derive_kek(
    passphrase: &[u8],
    salt: &[u8],
    kdf_params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    kdf_params.validate()?;
    derive_unchecked(passphrase, salt, kdf_params)
}

/// Run Argon2id without the floor/ceiling check.
///
/// Legacy vaults were written with parameters that predate the checks,
/// so the migration path calls this directly.
pub(crate) fn derive_unchecked(
    passphrase: &[u8],
    salt: &[u8],
    kdf_params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(
        kdf_params.memory_kib,
        kdf_params.iterations,
        kdf_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| LockboxError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, salt, &mut key[..])
        .map_err(|e| LockboxError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
