//! Cryptographic primitives for Lockbox.
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption with AAD (`encryption`)
//! - The envelope cipher for the vault payload (`envelope`)
//! - Argon2id passphrase-based KEK derivation (`kdf`)
//! - DEK generation and key wrapping (`keys`)
//! - The ChaCha20-Poly1305 cipher of the legacy formats (`legacy`)

pub mod encryption;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod legacy;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, derive_kek, ...};
pub use encryption::{open, seal, Sealed};
pub use envelope::{decrypt_vault, encrypt_vault};
pub use kdf::{derive_kek, generate_salt, KdfParams};
pub use keys::{unwrap_dek, wrap_dek, DataKey, WrappedKey};
