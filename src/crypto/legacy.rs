//! ChaCha20-Poly1305 as used by the pre-envelope vault formats.
//!
//! Only the migration path uses this.  Layout is the classic combined
//! form: a 12-byte nonce stored next to `ciphertext || tag`, no AAD.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use super::kdf::{KdfParams, KEY_LEN};
use crate::errors::{LockboxError, Result};

/// Nonce length for ChaCha20-Poly1305.
pub const NONCE_LEN: usize = 12;

/// Salt length used by the legacy formats.
pub const LEGACY_SALT_LEN: usize = 16;

/// Argon2id parameters the v1 format hard-coded (19 MiB, t=2, p=1).
pub const LEGACY_KDF: KdfParams = KdfParams {
    memory_kib: 19 * 1024,
    iterations: 2,
    parallelism: 1,
};

/// A nonce + combined ciphertext pair.
#[derive(Debug, Clone)]
pub struct LegacyBlob {
    pub nonce: Vec<u8>,
    pub data: Vec<u8>,
}

pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<LegacyBlob> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let data = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| LockboxError::EncryptionFailed(format!("legacy encryption error: {e}")))?;

    Ok(LegacyBlob {
        nonce: nonce.to_vec(),
        data,
    })
}

pub fn decrypt(key: &[u8; KEY_LEN], blob: &LegacyBlob) -> Result<Zeroizing<Vec<u8>>> {
    if blob.nonce.len() != NONCE_LEN {
        return Err(LockboxError::Authentication);
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&blob.nonce), blob.data.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| LockboxError::Authentication)
}
