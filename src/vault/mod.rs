//! Vault module: the encrypted credential and note store.
//!
//! This module provides:
//! - `Credential`, `Note` and `Vault` in-memory types (`model`)
//! - The binary `LBOX` envelope format (`format`)
//! - Atomic, owner-only file persistence (`storage`)
//! - Migration of the JSON formats v1 and v2 (`migrate`)
//! - High-level `VaultStore` for creating, opening and saving vaults (`store`)
//! - Random password generation (`generator`)
//! - Password strength rating (`strength`)

pub mod format;
pub mod generator;
pub mod migrate;
pub mod model;
pub mod storage;
pub mod store;
pub mod strength;

// Re-export the most commonly used items.
pub use format::Envelope;
pub use generator::generate_password;
pub use model::{Credential, Note, Vault};
pub use storage::{StoredVault, VaultFile};
pub use store::VaultStore;
pub use strength::Strength;
