use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{LockboxError, Result};

/// Where the rollback trust anchor is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrustStoreKind {
    /// The OS keyring (Keychain, Credential Manager, Secret Service).
    Keyring,
    /// Small files in a directory outside the vault.
    File,
}

/// User-level configuration, loaded from `~/.config/lockbox/config.toml`
/// (or `--config`).
///
/// This is the only place the trust anchor location can be configured.
/// The file must live outside the vault directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    /// Backend for the rollback trust anchor.
    #[serde(default = "default_trust_store")]
    pub trust_store: TrustStoreKind,

    /// Directory for the file trust store (default: `~/.config/lockbox/anchors`).
    #[serde(default)]
    pub trust_dir: Option<PathBuf>,
}

fn default_trust_store() -> TrustStoreKind {
    if cfg!(feature = "keyring-store") {
        TrustStoreKind::Keyring
    } else {
        TrustStoreKind::File
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            trust_store: default_trust_store(),
            trust_dir: None,
        }
    }
}

fn lockbox_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("lockbox"))
        .ok_or_else(|| LockboxError::ConfigError("cannot determine config directory".into()))
}

/// Canonical form of `path`, or of its closest existing ancestor with the
/// rest appended, so not-yet-created paths compare correctly.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            normalize(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}

fn is_within(path: &Path, dir: &Path) -> bool {
    normalize(path).starts_with(normalize(dir))
}

impl UserSettings {
    /// Default location of the user config file.
    pub fn default_path() -> Result<PathBuf> {
        Ok(lockbox_config_dir()?.join("config.toml"))
    }

    /// Load the user config from `path` (the default location if `None`).
    ///
    /// A missing file gives defaults.  A config file or trust directory
    /// inside `vault_dir` is refused.
    pub fn load(path: Option<&Path>, vault_dir: &Path) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if is_within(&config_path, vault_dir) {
            return Err(LockboxError::ConfigError(format!(
                "user config {} must not be inside the vault directory",
                config_path.display()
            )));
        }

        let settings = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents).map_err(|e| {
                LockboxError::ConfigError(format!(
                    "Failed to parse {}: {e}",
                    config_path.display()
                ))
            })?
        } else {
            Self::default()
        };

        settings.check_trust_dir(vault_dir)?;
        Ok(settings)
    }

    /// Refuse a file trust store that lives inside the vault it guards.
    pub fn check_trust_dir(&self, vault_dir: &Path) -> Result<()> {
        if self.trust_store == TrustStoreKind::File && is_within(&self.trust_dir()?, vault_dir) {
            return Err(LockboxError::ConfigError(
                "trust_dir must not be inside the vault directory".into(),
            ));
        }
        Ok(())
    }

    /// Directory of the file trust store.
    pub fn trust_dir(&self) -> Result<PathBuf> {
        match &self.trust_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(lockbox_config_dir()?.join("anchors")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings =
            UserSettings::load(Some(tmp.path().join("config.toml").as_path()), &tmp.path().join("vault"))
                .unwrap();
        assert!(settings.trust_dir.is_none());
    }

    #[test]
    fn parses_trust_settings() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "trust_store = \"file\"\ntrust_dir = \"/tmp/anchors\"\n").unwrap();

        let settings = UserSettings::load(Some(path.as_path()), &tmp.path().join("vault")).unwrap();
        assert_eq!(settings.trust_store, TrustStoreKind::File);
        assert_eq!(settings.trust_dir().unwrap(), PathBuf::from("/tmp/anchors"));
    }

    #[test]
    fn config_inside_vault_dir_is_refused() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        fs::create_dir_all(&vault).unwrap();
        fs::write(vault.join("config.toml"), "trust_store = \"file\"\n").unwrap();

        assert!(matches!(
            UserSettings::load(Some(vault.join("config.toml").as_path()), &vault),
            Err(LockboxError::ConfigError(_))
        ));
    }

    #[test]
    fn trust_dir_inside_vault_dir_is_refused() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            format!(
                "trust_store = \"file\"\ntrust_dir = '{}'\n",
                vault.join("anchors").display()
            ),
        )
        .unwrap();

        assert!(matches!(
            UserSettings::load(Some(path.as_path()), &vault),
            Err(LockboxError::ConfigError(_))
        ));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "trust_store = [").unwrap();
        assert!(UserSettings::load(Some(path.as_path()), &tmp.path().join("vault")).is_err());
    }
}
