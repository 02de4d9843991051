//! Envelope cipher: encryption of the serialized vault payload.
//!
//! The payload is sealed under the DEK.  The associated data is the
//! header prefix (magic, format version, revision), so a valid header
//! cannot be transplanted onto ciphertext from another revision.

use zeroize::Zeroizing;

use super::encryption::{self, Sealed};
use super::keys::DataKey;
use crate::errors::Result;

/// Encrypt a serialized vault under the DEK with a fresh nonce.
pub fn encrypt_vault(plaintext: &[u8], dek: &DataKey, associated_data: &[u8]) -> Result<Sealed> {
    encryption::seal(dek.as_bytes(), plaintext, associated_data)
}

/// Decrypt a payload sealed by `encrypt_vault`.
///
/// Fails with `LockboxError::Authentication` on any corruption of the
/// nonce, ciphertext, tag or associated data.
pub fn decrypt_vault(
    sealed: &Sealed,
    dek: &DataKey,
    associated_data: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    encryption::open(dek.as_bytes(), sealed, associated_data)
}
