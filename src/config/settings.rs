use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::KdfParams;
use crate::errors::{LockboxError, Result};
use crate::session::SessionPolicy;

/// Keys honoured only in the user config.  The vault directory is
/// restored along with the vault, so it must not move the trust anchor
/// or soften the lockout.
const PROTECTED_KEYS: &[&str] = &["trust_store", "trust_dir", "max_attempts", "lockout_secs"];

/// Per-vault configuration, loaded from `<vault_dir>/config.toml`.
///
/// Every field has a sensible default so Lockbox works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Seconds of inactivity before an unlocked session locks itself.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds before a copied password is cleared from the clipboard.
    #[serde(default = "default_clipboard_clear_secs")]
    pub clipboard_clear_secs: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_clipboard_clear_secs() -> u64 {
    20
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            idle_timeout_secs: default_idle_timeout_secs(),
            clipboard_clear_secs: default_clipboard_clear_secs(),
        }
    }
}

impl Settings {
    /// Name of the config file inside the vault directory.
    pub const FILE_NAME: &'static str = "config.toml";

    /// Load settings from `<vault_dir>/config.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, or holds values that
    /// would weaken the vault, an error is returned.
    pub fn load(vault_dir: &Path) -> Result<Self> {
        let config_path = vault_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let parse_error = |e: toml::de::Error| {
            LockboxError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        };
        let table: toml::Table = toml::from_str(&contents).map_err(parse_error)?;
        for key in PROTECTED_KEYS.iter().filter(|key| table.contains_key(**key)) {
            warn!(
                key = *key,
                path = %config_path.display(),
                "ignoring setting that is only honoured in the user config"
            );
        }
        let settings: Settings = toml::Value::Table(table).try_into().map_err(parse_error)?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        self.kdf_params()
            .validate()
            .map_err(|e| LockboxError::ConfigError(e.to_string()))?;
        if self.idle_timeout_secs == 0 {
            return Err(LockboxError::ConfigError(
                "idle_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Session timings.  The attempt limit and lockout length are fixed.
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            clipboard_clear: Duration::from_secs(self.clipboard_clear_secs),
            kdf: self.kdf_params(),
            ..SessionPolicy::default()
        }
    }
}

/// Default vault directory: `~/.lockbox`.
pub fn default_vault_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".lockbox"))
        .ok_or_else(|| LockboxError::ConfigError("cannot determine home directory".into()))
}

/// Resolve the vault directory given on the command line.
///
/// Paths with `..` components are rejected; relative paths are taken
/// relative to the home directory.
pub fn resolve_vault_dir(requested: Option<&Path>) -> Result<PathBuf> {
    let Some(requested) = requested else {
        return default_vault_dir();
    };

    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(LockboxError::ConfigError(format!(
            "vault directory '{}' must not contain '..'",
            requested.display()
        )));
    }

    if requested.is_absolute() {
        return Ok(requested.to_path_buf());
    }

    dirs::home_dir()
        .map(|home| home.join(requested))
        .ok_or_else(|| LockboxError::ConfigError("cannot determine home directory".into()))
}

// ── Tests ────────────────────────────────────────────────────────────
