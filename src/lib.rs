pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod rollback;
pub mod session;
pub mod vault;

#[cfg(feature = "keyring-store")]
pub mod keyring;
