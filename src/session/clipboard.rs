//! Clipboard access and auto-clearing of copied secrets.

use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::errors::{LockboxError, Result};

pub trait Clipboard {
    /// Current text content, `None` if the clipboard holds no text.
    fn get_text(&mut self) -> Result<Option<String>>;
    fn set_text(&mut self, text: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// The desktop clipboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        arboard::Clipboard::new()
            .map(|inner| Self { inner })
            .map_err(|e| LockboxError::Clipboard(e.to_string()))
    }
}

impl Clipboard for SystemClipboard {
    fn get_text(&mut self) -> Result<Option<String>> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(LockboxError::Clipboard(e.to_string())),
        }
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .set_text(text)
            .map_err(|e| LockboxError::Clipboard(e.to_string()))
    }

    fn clear(&mut self) -> Result<()> {
        self.inner
            .clear()
            .map_err(|e| LockboxError::Clipboard(e.to_string()))
    }
}

/// In-process clipboard for tests and headless use.  Clones share content.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    content: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.content.lock().ok().and_then(|c| c.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn get_text(&mut self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut content = self
            .content
            .lock()
            .map_err(|_| LockboxError::Clipboard("clipboard poisoned".into()))?;
        *content = Some(text.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut content = self
            .content
            .lock()
            .map_err(|_| LockboxError::Clipboard("clipboard poisoned".into()))?;
        *content = None;
        Ok(())
    }
}

/// Places secrets on a clipboard and later clears them, unless the user
/// has copied something else in the meantime.
///
/// Only a SHA-256 digest of the placed value is kept.
pub struct ClipboardGuard {
    clipboard: Box<dyn Clipboard>,
    placed: Option<[u8; 32]>,
}

impl ClipboardGuard {
    pub fn new(clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            clipboard,
            placed: None,
        }
    }

    pub fn copy(&mut self, secret: &str) -> Result<()> {
        self.clipboard.set_text(secret)?;
        self.placed = Some(Sha256::digest(secret.as_bytes()).into());
        Ok(())
    }

    /// Whether a copied secret is waiting to be cleared.
    pub fn is_pending(&self) -> bool {
        self.placed.is_some()
    }

    /// Clear the clipboard if it still holds what `copy` put there.
    /// Returns `true` if it was cleared.
    pub fn clear_if_unchanged(&mut self) -> Result<bool> {
        let Some(placed) = self.placed.take() else {
            return Ok(false);
        };
        let current = match self.clipboard.get_text()? {
            Some(text) => Sha256::digest(text.as_bytes()),
            None => return Ok(false),
        };
        if bool::from(current.as_slice().ct_eq(&placed)) {
            self.clipboard.clear()?;
            debug!("clipboard cleared");
            Ok(true)
        } else {
            debug!("clipboard changed since copy, left alone");
            Ok(false)
        }
    }
}

impl std::fmt::Debug for ClipboardGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardGuard")
            .field("pending", &self.placed.is_some())
            .finish_non_exhaustive()
    }
}
