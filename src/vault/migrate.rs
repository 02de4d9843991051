//! Migration of the JSON vault formats to the current envelope.
//!
//! Format history:
//!
//! - **v1** `{salt, nonce, data}`: the payload encrypted directly under
//!   an Argon2id key (19 MiB, t=2, p=1) with ChaCha20-Poly1305.
//! - **v2** `{version: 2, kdf, kdf_salt, wrapped_key, vault}`: a random
//!   DEK wrapped under the passphrase key, both ChaCha20-Poly1305, no AAD
//!   and no revision in the header.
//! - **v3** the binary `LBOX` envelope (see `format`).
//!
//! There is one function per step (`v1_to_v2`, `v2_to_v3`) and `migrate`
//! applies them in order until the current version is reached.  Only the
//! final envelope is ever written to disk.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::format::{self, Envelope, CURRENT_VERSION};
use super::model::{Credential, Vault};
use crate::crypto::kdf::{self, KdfParams, KEY_LEN};
use crate::crypto::legacy::{self, LegacyBlob, LEGACY_KDF, LEGACY_SALT_LEN};
use crate::crypto::{encrypt_vault, generate_salt, wrap_dek, DataKey};
use crate::errors::{LockboxError, Result};

// ---------------------------------------------------------------------------
// Legacy file shapes
// ---------------------------------------------------------------------------

/// A nonce + ciphertext pair as the JSON formats stored it (base64).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedBlob {
    /// Present in v1 (the KDF salt); empty placeholder inside v2.
    #[serde(default)]
    pub salt: String,
    pub nonce: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyKdfSpec {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

/// The v2 wrapped-key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V2File {
    pub version: u8,
    pub kdf: LegacyKdfSpec,
    pub kdf_salt: String,
    pub wrapped_key: EncodedBlob,
    pub vault: EncodedBlob,
}

/// A vault file in one of the pre-envelope formats.
#[derive(Debug, Clone)]
pub enum LegacyFile {
    V1(EncodedBlob),
    V2(V2File),
}

impl LegacyFile {
    /// Detect and parse a legacy JSON vault.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| LockboxError::InvalidFormat(format!("vault file is not JSON: {e}")))?;

        match value.get("version").and_then(serde_json::Value::as_u64) {
            Some(2) => serde_json::from_value(value)
                .map(LegacyFile::V2)
                .map_err(|e| LockboxError::Migration(format!("malformed v2 vault: {e}"))),
            Some(v) => Err(LockboxError::UnsupportedVersion(
                u8::try_from(v).unwrap_or(u8::MAX),
            )),
            None if ["salt", "nonce", "data"]
                .iter()
                .all(|k| value.get(k).is_some()) =>
            {
                serde_json::from_value(value)
                    .map(LegacyFile::V1)
                    .map_err(|e| LockboxError::Migration(format!("malformed v1 vault: {e}")))
            }
            None => Err(LockboxError::InvalidFormat(
                "unrecognised vault file layout".into(),
            )),
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            LegacyFile::V1(_) => 1,
            LegacyFile::V2(_) => 2,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let result = match self {
            LegacyFile::V1(blob) => serde_json::to_vec_pretty(blob),
            LegacyFile::V2(file) => serde_json::to_vec_pretty(file),
        };
        result.map_err(|e| LockboxError::SerializationError(format!("legacy vault: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Legacy payload shape
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct LegacyEntry {
    name: String,
    #[serde(default)]
    email: String,
    password: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct LegacyNote {
    title: String,
    content: String,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct LegacyVault {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    entries: Vec<LegacyEntry>,
    #[serde(default)]
    notes: Vec<LegacyNote>,
}

impl LegacyVault {
    /// Convert into the current model.
    ///
    /// A legacy entry's `name` becomes the service; the username falls
    /// back to the e-mail address; free-text notes become metadata.
    /// Duplicate note titles get a numeric suffix.
    fn to_vault(&self) -> Result<Vault> {
        let mut vault = Vault::new();
        for entry in &self.entries {
            let username = match entry.username.as_deref() {
                Some(u) if !u.is_empty() => u,
                _ => entry.email.as_str(),
            };
            let mut credential = Credential::new(&entry.name, username, &entry.password);
            if let Some(extra) = entry.notes.as_deref().filter(|n| !n.is_empty()) {
                credential = credential.with_metadata(extra);
            }
            vault
                .add_credential(credential)
                .map_err(|e| LockboxError::Migration(format!("entry '{}': {e}", entry.name)))?;
        }
        for note in &self.notes {
            let mut title = note.title.clone();
            let mut n = 2;
            while vault.note(&title).is_ok() {
                title = format!("{} ({n})", note.title);
                n += 1;
            }
            vault
                .add_note(&title, &note.content)
                .map_err(|e| LockboxError::Migration(format!("note '{}': {e}", note.title)))?;
        }
        Ok(vault)
    }
}

// ---------------------------------------------------------------------------
// Migration steps
// ---------------------------------------------------------------------------

/// Result of migrating a legacy file to the current envelope.
pub struct Migrated {
    pub envelope: Envelope,
    pub dek: DataKey,
    pub vault: Vault,
    /// Revision recorded in the legacy payload, before the bump.
    pub legacy_revision: u64,
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| LockboxError::Migration(format!("invalid base64 in {field}: {e}")))
}

fn blob(field: &str, encoded: &EncodedBlob) -> Result<LegacyBlob> {
    Ok(LegacyBlob {
        nonce: decode(field, &encoded.nonce)?,
        data: decode(field, &encoded.data)?,
    })
}

fn encode(blob: &LegacyBlob) -> EncodedBlob {
    EncodedBlob {
        salt: String::new(),
        nonce: BASE64.encode(&blob.nonce),
        data: BASE64.encode(&blob.data),
    }
}

/// v1 → v2: decrypt under the passphrase key, re-encrypt under a fresh
/// DEK, and wrap that DEK under a freshly salted passphrase key.
pub fn v1_to_v2(v1: &EncodedBlob, passphrase: &[u8]) -> Result<V2File> {
    let salt = decode("salt", &v1.salt)?;
    let key = kdf::derive_unchecked(passphrase, &salt, &LEGACY_KDF)?;
    let plaintext = legacy::decrypt(&key, &blob("data", v1)?)?;

    let mut new_salt = [0u8; LEGACY_SALT_LEN];
    new_salt.copy_from_slice(&generate_salt()[..LEGACY_SALT_LEN]);
    let kek = kdf::derive_unchecked(passphrase, &new_salt, &LEGACY_KDF)?;
    let dek = DataKey::generate();

    let wrapped = legacy::encrypt(&kek, dek.as_bytes())?;
    let payload = legacy::encrypt(dek.as_bytes(), &plaintext)?;

    info!("migrated vault format v1 -> v2");
    Ok(V2File {
        version: 2,
        kdf: LegacyKdfSpec {
            m_cost: LEGACY_KDF.memory_kib,
            t_cost: LEGACY_KDF.iterations,
            p_cost: LEGACY_KDF.parallelism,
        },
        kdf_salt: BASE64.encode(new_salt),
        wrapped_key: encode(&wrapped),
        vault: encode(&payload),
    })
}

/// v2 → v3: unwrap the v2 DEK, decrypt the payload, convert it to the
/// current model, and seal it in a new envelope under a fresh DEK, a
/// fresh salt and the current KDF parameters.  The revision is bumped.
pub fn v2_to_v3(v2: &V2File, passphrase: &[u8], params: &KdfParams) -> Result<Migrated> {
    let old_params = KdfParams {
        memory_kib: v2.kdf.m_cost,
        iterations: v2.kdf.t_cost,
        parallelism: v2.kdf.p_cost,
    };
    old_params
        .check_ceiling()
        .map_err(|e| LockboxError::Migration(format!("legacy KDF parameters: {e}")))?;
    let old_salt = decode("kdf_salt", &v2.kdf_salt)?;
    let old_kek = kdf::derive_unchecked(passphrase, &old_salt, &old_params)?;

    let old_dek = legacy::decrypt(&old_kek, &blob("wrapped_key", &v2.wrapped_key)?)?;
    let old_dek: [u8; KEY_LEN] = old_dek
        .as_slice()
        .try_into()
        .map_err(|_| LockboxError::Migration("wrapped key has invalid length".into()))?;
    let old_dek = DataKey::from_bytes(old_dek);

    let plaintext = legacy::decrypt(old_dek.as_bytes(), &blob("vault", &v2.vault)?)?;
    let legacy_vault: LegacyVault = serde_json::from_slice(&plaintext)
        .map_err(|e| LockboxError::Migration(format!("legacy payload: {e}")))?;

    let legacy_revision = legacy_vault.revision;
    let revision = legacy_revision
        .checked_add(1)
        .ok_or(LockboxError::Overflow)?;
    let mut vault = legacy_vault.to_vault()?;
    vault.set_revision(revision);

    let salt = generate_salt();
    let kek = kdf::derive_kek(passphrase, &salt, params)?;
    let dek = DataKey::generate();
    let wrapped_dek = wrap_dek(&dek, &kek, CURRENT_VERSION)?;
    let payload = encrypt_vault(
        &vault.to_payload()?,
        &dek,
        &format::associated_data(CURRENT_VERSION, revision),
    )?;

    info!(legacy_revision, revision, "migrated vault format v2 -> v3");
    Ok(Migrated {
        envelope: Envelope {
            version: CURRENT_VERSION,
            revision,
            kdf: *params,
            salt,
            wrapped_dek,
            payload,
        },
        dek,
        vault,
        legacy_revision,
    })
}

/// Apply migration steps in sequence until the current format is reached.
pub fn migrate(legacy: LegacyFile, passphrase: &[u8], params: &KdfParams) -> Result<Migrated> {
    let mut current = legacy;
    loop {
        current = match current {
            LegacyFile::V1(v1) => LegacyFile::V2(v1_to_v2(&v1, passphrase)?),
            LegacyFile::V2(v2) => return v2_to_v3(&v2, passphrase, params),
        };
    }
}
