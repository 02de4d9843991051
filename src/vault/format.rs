//! Binary envelope format.
//!
//! A `vault.lbx` file has a fixed 145-byte header followed by the
//! payload ciphertext:
//!
//! ```text
//! [LBOX: 4][version: 1][revision: 8 LE]                          <- payload AAD
//! [memory_kib: 4 LE][iterations: 4 LE][parallelism: 4 LE][salt: 32]
//! [dek_nonce: 12][wrapped_dek: 32][dek_tag: 16]
//! [payload_nonce: 12][payload_tag: 16]
//! [payload ciphertext: rest of file]
//! ```
//!
//! - **Magic** (`LBOX`): identifies the file as a Lockbox envelope.
//! - **Version**: format version (currently `3`; `1` and `2` were JSON
//!   formats handled by `migrate`).
//! - **Revision**: monotonic save counter, checked by the rollback guard.
//! - **KDF block**: Argon2id parameters and salt for the KEK.
//! - **Wrapped DEK**: the data key sealed under the KEK.
//! - **Payload**: the serialized `Vault` sealed under the DEK.

use crate::crypto::encryption::{NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::{KdfParams, KEY_LEN, SALT_LEN};
use crate::crypto::{Sealed, WrappedKey};
use crate::errors::{LockboxError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every envelope.
pub const MAGIC: &[u8; 4] = b"LBOX";

/// Current envelope format version.
pub const CURRENT_VERSION: u8 = 3;

/// Length of the authenticated header prefix: magic + version + revision.
pub const AAD_LEN: usize = 4 + 1 + 8;

/// Total fixed header length.
pub const HEADER_LEN: usize = AAD_LEN
    + 3 * 4
    + SALT_LEN
    + NONCE_LEN
    + KEY_LEN
    + TAG_LEN
    + NONCE_LEN
    + TAG_LEN;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The complete on-disk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u8,
    pub revision: u64,
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub wrapped_dek: WrappedKey,
    pub payload: Sealed,
}

/// Build the payload AAD for a given version and revision.
pub fn associated_data(version: u8, revision: u64) -> [u8; AAD_LEN] {
    let mut aad = [0u8; AAD_LEN];
    aad[..4].copy_from_slice(MAGIC);
    aad[4] = version;
    aad[5..].copy_from_slice(&revision.to_le_bytes());
    aad
}

impl Envelope {
    /// The AAD the payload of this envelope is bound to.
    pub fn associated_data(&self) -> [u8; AAD_LEN] {
        associated_data(self.version, self.revision)
    }

    /// Serialize to the exact bytes written to disk.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.ciphertext.len());

        buf.extend_from_slice(&self.associated_data()); // 13 bytes
        buf.extend_from_slice(&self.kdf.memory_kib.to_le_bytes());
        buf.extend_from_slice(&self.kdf.iterations.to_le_bytes());
        buf.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.wrapped_dek.nonce);
        buf.extend_from_slice(&self.wrapped_dek.ciphertext);
        buf.extend_from_slice(&self.wrapped_dek.tag);
        buf.extend_from_slice(&self.payload.nonce);
        buf.extend_from_slice(&self.payload.tag);
        buf.extend_from_slice(&self.payload.ciphertext);

        buf
    }

    /// Parse and structurally validate an envelope.
    ///
    /// Newer (or unknown) versions are rejected outright rather than
    /// parsed on a best-effort basis.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(LockboxError::InvalidFormat(
                "file too small to be a vault envelope".into(),
            ));
        }
        if &data[0..4] != MAGIC {
            return Err(LockboxError::InvalidFormat(
                "missing LBOX magic bytes".into(),
            ));
        }
        let version = data[4];
        if version != CURRENT_VERSION {
            return Err(LockboxError::UnsupportedVersion(version));
        }
        if data.len() < HEADER_LEN {
            return Err(LockboxError::InvalidFormat(format!(
                "envelope header truncated ({} of {HEADER_LEN} bytes)",
                data.len()
            )));
        }

        let mut r = Reader::new(&data[5..]);
        let revision = u64::from_le_bytes(r.take()?);
        let kdf = KdfParams {
            memory_kib: u32::from_le_bytes(r.take()?),
            iterations: u32::from_le_bytes(r.take()?),
            parallelism: u32::from_le_bytes(r.take()?),
        };
        kdf.validate()
            .map_err(|e| LockboxError::InvalidFormat(format!("KDF parameters: {e}")))?;
        let salt = r.take()?;
        let wrapped_dek = WrappedKey {
            nonce: r.take()?,
            ciphertext: r.take()?,
            tag: r.take()?,
        };
        let payload_nonce = r.take()?;
        let payload_tag = r.take()?;
        let ciphertext = r.rest().to_vec();

        Ok(Self {
            version,
            revision,
            kdf,
            salt,
            wrapped_dek,
            payload: Sealed {
                nonce: payload_nonce,
                ciphertext,
                tag: payload_tag,
            },
        })
    }
}

/// Read only the revision of an envelope without parsing the rest.
pub fn peek_revision(data: &[u8]) -> Result<u64> {
    if data.len() < AAD_LEN || &data[0..4] != MAGIC {
        return Err(LockboxError::InvalidFormat(
            "not a Lockbox envelope".into(),
        ));
    }
    if data[4] != CURRENT_VERSION {
        return Err(LockboxError::UnsupportedVersion(data[4]));
    }
    let mut r = Reader::new(&data[5..AAD_LEN]);
    Ok(u64::from_le_bytes(r.take()?))
}

/// Minimal cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let bytes: [u8; N] = self
            .data
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| LockboxError::InvalidFormat("envelope header truncated".into()))?;
        self.pos = end;
        Ok(bytes)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }
}
