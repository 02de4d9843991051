//! Data-encrypting key (DEK) handling and key wrapping.
//!
//! The DEK is generated once per vault and encrypts the payload.  On disk
//! it only ever appears wrapped (AES-256-GCM) under the KEK derived from
//! the passphrase.  Changing the passphrase re-wraps the same DEK; the
//! payload does not have to be re-encrypted.

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encryption::{self, Sealed, NONCE_LEN, TAG_LEN};
use super::kdf::KEY_LEN;
use crate::errors::{LockboxError, Result};

/// AAD prefix for key wrapping, distinct from payload encryption AAD.
const WRAP_AAD: &[u8] = b"lockbox:dek-wrap:v";

/// A wrapped DEK exactly as stored in the envelope header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: [u8; KEY_LEN],
    pub tag: [u8; TAG_LEN],
}

/// A 32-byte data-encrypting key that zeroes its memory when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: [u8; KEY_LEN],
}

impl DataKey {
    /// Generate a fresh random DEK.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a `DataKey` from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to pass to the envelope cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}

fn wrap_aad(format_version: u8) -> Vec<u8> {
    let mut aad = WRAP_AAD.to_vec();
    aad.push(format_version);
    aad
}

/// Wrap (encrypt) the DEK under a KEK with a fresh nonce.
pub fn wrap_dek(dek: &DataKey, kek: &[u8; KEY_LEN], format_version: u8) -> Result<WrappedKey> {
    let sealed = encryption::seal(kek, dek.as_bytes(), &wrap_aad(format_version))?;

    let ciphertext: [u8; KEY_LEN] = sealed.ciphertext.as_slice().try_into().map_err(|_| {
        LockboxError::EncryptionFailed("wrapped key has unexpected length".into())
    })?;

    Ok(WrappedKey {
        nonce: sealed.nonce,
        ciphertext,
        tag: sealed.tag,
    })
}

/// Unwrap (decrypt) the DEK.
///
/// A wrong KEK and a corrupted wrapped key both surface as
/// `LockboxError::Authentication`.
pub fn unwrap_dek(
    wrapped: &WrappedKey,
    kek: &[u8; KEY_LEN],
    format_version: u8,
) -> Result<DataKey> {
    let sealed = Sealed {
        nonce: wrapped.nonce,
        ciphertext: wrapped.ciphertext.to_vec(),
        tag: wrapped.tag,
    };
    let plaintext = encryption::open(kek, &sealed, &wrap_aad(format_version))?;

    let mut bytes = [0u8; KEY_LEN];
    if plaintext.len() != KEY_LEN {
        return Err(LockboxError::Authentication);
    }
    bytes.copy_from_slice(&plaintext);
    Ok(DataKey::from_bytes(bytes))
}
