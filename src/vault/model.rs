//! In-memory vault contents: credentials grouped by service, and notes.
//!
//! A `Vault` only exists between unlock and lock.  Every string it holds
//! is zeroized when the vault is dropped or wiped, including the service
//! names used as map keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{LockboxError, Result};

/// A single stored login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    pub service: String,
    pub username: String,
    pub password: String,
    /// Free-form extra data (URL, recovery hints, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl Credential {
    pub fn new(service: &str, username: &str, password: &str) -> Self {
        Self {
            service: service.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: &str) -> Self {
        self.metadata = Some(metadata.to_string());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A titled free-text note. Titles are unique within a vault.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Note {
    pub title: String,
    pub content: String,
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// The decrypted vault.
///
/// `revision` is not part of the serialized payload: the envelope header
/// is the authoritative copy and it is bound to the ciphertext as AAD.
#[derive(Default, Serialize, Deserialize)]
pub struct Vault {
    #[serde(skip)]
    revision: u64,

    #[serde(default)]
    services: BTreeMap<String, Vec<Credential>>,

    #[serde(default)]
    notes: Vec<Note>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// The revision this vault was loaded at (or last saved as).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// Append a credential to its service's list.
    pub fn add_credential(&mut self, credential: Credential) -> Result<()> {
        validate_label("service name", &credential.service)?;
        self.services
            .entry(credential.service.clone())
            .or_default()
            .push(credential);
        Ok(())
    }

    /// All credentials stored for `service`, in insertion order.
    pub fn credentials(&self, service: &str) -> Result<&[Credential]> {
        self.services
            .get(service)
            .map(Vec::as_slice)
            .ok_or_else(|| LockboxError::ServiceNotFound(service.to_string()))
    }

    /// Look up one credential by service and position.
    pub fn credential(&self, service: &str, index: usize) -> Result<&Credential> {
        self.credentials(service)?.get(index).ok_or_else(|| {
            LockboxError::CommandFailed(format!(
                "service '{service}' has no credential #{}",
                index + 1
            ))
        })
    }

    /// Replace the password of an existing credential.
    pub fn set_password(&mut self, service: &str, index: usize, password: &str) -> Result<()> {
        let entry = self
            .services
            .get_mut(service)
            .ok_or_else(|| LockboxError::ServiceNotFound(service.to_string()))?
            .get_mut(index)
            .ok_or_else(|| {
                LockboxError::CommandFailed(format!(
                    "service '{service}' has no credential #{}",
                    index + 1
                ))
            })?;
        entry.password.zeroize();
        entry.password = password.to_string();
        Ok(())
    }

    /// Remove one credential.  The service disappears with its last entry.
    pub fn remove_credential(&mut self, service: &str, index: usize) -> Result<Credential> {
        let list = self
            .services
            .get_mut(service)
            .ok_or_else(|| LockboxError::ServiceNotFound(service.to_string()))?;
        if index >= list.len() {
            return Err(LockboxError::CommandFailed(format!(
                "service '{service}' has no credential #{}",
                index + 1
            )));
        }
        let removed = list.remove(index);
        if list.is_empty() {
            if let Some((mut key, _)) = self.services.remove_entry(service) {
                key.zeroize();
            }
        }
        Ok(removed)
    }

    /// Service names in sorted order.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Total number of credentials across all services.
    pub fn credential_count(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub fn add_note(&mut self, title: &str, content: &str) -> Result<()> {
        validate_label("note title", title)?;
        if self.notes.iter().any(|n| n.title == title) {
            return Err(LockboxError::NoteAlreadyExists(title.to_string()));
        }
        self.notes.push(Note {
            title: title.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    /// Replace the content of an existing note.
    pub fn update_note(&mut self, title: &str, content: &str) -> Result<()> {
        let note = self
            .notes
            .iter_mut()
            .find(|n| n.title == title)
            .ok_or_else(|| LockboxError::NoteNotFound(title.to_string()))?;
        note.content.zeroize();
        note.content = content.to_string();
        Ok(())
    }

    pub fn note(&self, title: &str) -> Result<&Note> {
        self.notes
            .iter()
            .find(|n| n.title == title)
            .ok_or_else(|| LockboxError::NoteNotFound(title.to_string()))
    }

    pub fn remove_note(&mut self, title: &str) -> Result<Note> {
        let pos = self
            .notes
            .iter()
            .position(|n| n.title == title)
            .ok_or_else(|| LockboxError::NoteNotFound(title.to_string()))?;
        Ok(self.notes.remove(pos))
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize to the plaintext payload that gets sealed in the envelope.
    pub fn to_payload(&self) -> Result<Zeroizing<Vec<u8>>> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| LockboxError::SerializationError(format!("vault payload: {e}")))
    }

    /// Parse a decrypted payload.
    pub fn from_payload(payload: &[u8], revision: u64) -> Result<Self> {
        let mut vault: Vault = serde_json::from_slice(payload)
            .map_err(|e| LockboxError::InvalidFormat(format!("vault payload: {e}")))?;
        vault.revision = revision;
        Ok(vault)
    }

    /// Zero every secret and empty the vault.
    pub fn wipe(&mut self) {
        for (mut service, mut list) in std::mem::take(&mut self.services) {
            service.zeroize();
            list.zeroize();
        }
        self.notes.zeroize();
        self.revision = 0;
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("revision", &self.revision)
            .field("services", &self.services.len())
            .field("notes", &self.notes.len())
            .finish()
    }
}

/// Service names and note titles: non-empty, at most 256 characters, no
/// control characters.
fn validate_label(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LockboxError::CommandFailed(format!("{what} cannot be empty")));
    }
    if value.chars().count() > 256 {
        return Err(LockboxError::CommandFailed(format!(
            "{what} cannot exceed 256 characters"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(LockboxError::CommandFailed(format!(
            "{what} '{}' contains control characters",
            value.escape_debug()
        )));
    }
    Ok(())
}
