//! Configuration: per-vault `config.toml` (KDF cost and timings), the
//! user config (trust anchor location), and vault directory resolution.

pub mod settings;
pub mod user;

pub use settings::{resolve_vault_dir, Settings};
pub use user::{TrustStoreKind, UserSettings};
