//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::{resolve_vault_dir, Settings, TrustStoreKind, UserSettings};
use crate::errors::{LockboxError, Result};
use crate::rollback::{FileTrustStore, RollbackGuard, TrustStore};
use crate::session::{Session, SystemClock};
use crate::vault::generator::{DEFAULT_LENGTH, MAX_LENGTH, MIN_LENGTH};
use crate::vault::{strength, Strength};

/// Minimum passphrase length to prevent trivially weak passphrases.
const MIN_PASSWORD_LEN: usize = 8;

/// Lockbox CLI: local encrypted vault for credentials and notes.
#[derive(Parser)]
#[command(
    name = "lockbox",
    about = "Local encrypted vault for credentials and notes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (default: ~/.lockbox)
    #[arg(long, env = "LOCKBOX_DIR", global = true)]
    pub vault_dir: Option<PathBuf>,

    /// User config file (default: ~/.config/lockbox/config.toml)
    #[arg(long, env = "LOCKBOX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Where to keep the rollback trust anchor (overrides the user config)
    #[arg(long, env = "LOCKBOX_TRUST_STORE", value_enum, global = true)]
    pub trust_store: Option<TrustStoreKind>,

    /// Directory for the file trust store (overrides the user config)
    #[arg(long, env = "LOCKBOX_TRUST_DIR", global = true)]
    pub trust_dir: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new vault
    Init,

    /// Add a credential
    Add {
        /// Service name (e.g. github)
        service: String,
        /// Username or e-mail for the service
        username: String,
        /// Generate a random password instead of prompting
        #[arg(short, long)]
        generate: bool,
        /// Length of the generated password
        #[arg(long, default_value_t = DEFAULT_LENGTH)]
        length: usize,
        /// Extra information stored with the credential (URL, hints, ...)
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Print (or copy) a stored password
    Get {
        /// Service name
        service: String,
        /// Which credential of the service (1-based)
        #[arg(short, long, default_value_t = 1)]
        index: usize,
        /// Copy to the clipboard instead of printing
        #[arg(short, long)]
        copy: bool,
    },

    /// Replace the password of a stored credential
    Update {
        /// Service name
        service: String,
        /// Which credential of the service (1-based)
        #[arg(short, long, default_value_t = 1)]
        index: usize,
        /// Generate a random password instead of prompting
        #[arg(short, long)]
        generate: bool,
        /// Length of the generated password
        #[arg(long, default_value_t = DEFAULT_LENGTH)]
        length: usize,
    },

    /// List services and usernames
    List,

    /// Remove a credential
    Remove {
        /// Service name
        service: String,
        /// Which credential of the service (1-based)
        #[arg(short, long, default_value_t = 1)]
        index: usize,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Manage notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Change the vault passphrase
    Passwd,

    /// Show vault, trust anchor and lockout status
    Status,

    /// Print a random password
    Generate {
        /// Password length (12-128)
        #[arg(short, long, default_value_t = DEFAULT_LENGTH)]
        length: usize,
    },

    /// Interactive session with idle lock and clipboard auto-clear
    Shell,

    /// Check permissions, format, trust anchor and lockout state
    Check,
}

/// Note subcommands.
#[derive(clap::Subcommand)]
pub enum NoteAction {
    /// Add or replace a note
    Add {
        /// Note title
        title: String,
        /// Note text (omit to read from stdin or prompt)
        content: Option<String>,
    },

    /// Print a note
    Show {
        /// Note title
        title: String,
    },

    /// List note titles
    List,

    /// Delete a note
    Remove {
        /// Note title
        title: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolved vault directory plus the settings that apply to it.
#[derive(Debug, Clone)]
pub struct Context {
    pub vault_dir: PathBuf,
    /// KDF cost and timings from `<vault_dir>/config.toml`.
    pub settings: Settings,
    /// Trust anchor location from the user config and command line.
    pub user: UserSettings,
}

impl Context {
    /// Resolve the vault directory and load both config files, applying
    /// command-line overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let vault_dir = resolve_vault_dir(cli.vault_dir.as_deref())?;
        let settings = Settings::load(&vault_dir)?;
        let mut user = UserSettings::load(cli.config.as_deref(), &vault_dir)?;
        if let Some(kind) = cli.trust_store {
            user.trust_store = kind;
        }
        if let Some(dir) = &cli.trust_dir {
            user.trust_dir = Some(dir.clone());
        }
        user.check_trust_dir(&vault_dir)?;
        Ok(Self {
            vault_dir,
            settings,
            user,
        })
    }

    /// The configured trust-anchor backend.
    pub fn trust_store(&self) -> Result<Arc<dyn TrustStore>> {
        match self.user.trust_store {
            #[cfg(feature = "keyring-store")]
            TrustStoreKind::Keyring => Ok(Arc::new(crate::keyring::KeyringTrustStore::new())),
            #[cfg(not(feature = "keyring-store"))]
            TrustStoreKind::Keyring => Err(LockboxError::ConfigError(
                "this build has no keyring support, use trust_store = \"file\"".into(),
            )),
            TrustStoreKind::File => Ok(Arc::new(FileTrustStore::new(&self.user.trust_dir()?))),
        }
    }

    pub fn rollback_guard(&self) -> Result<RollbackGuard> {
        Ok(RollbackGuard::for_vault(self.trust_store()?, &self.vault_dir))
    }

    /// A locked session for this vault.
    pub fn session(&self) -> Result<Session> {
        Session::new(
            &self.vault_dir,
            self.rollback_guard()?,
            Arc::new(SystemClock::new()),
            self.settings.session_policy(),
        )
    }

    /// A session unlocked with a prompted passphrase.
    ///
    /// Missing vaults and active lockouts are reported before prompting.
    pub fn unlocked_session(&self) -> Result<Session> {
        let mut session = self.session()?;
        if !session.file().exists() {
            output::tip("Run `lockbox init` to create a vault.");
            return Err(LockboxError::VaultNotFound(self.vault_dir.clone()));
        }
        let status = session.lockout_status();
        if status.locked {
            return Err(LockboxError::LockedOut(status.remaining_seconds));
        }
        let passphrase = prompt_password()?;
        session.unlock(passphrase.as_bytes())?;
        Ok(session)
    }

    /// A session unlocked with a passphrase the caller already holds.
    pub fn unlock_with(&self, passphrase: &[u8]) -> Result<Session> {
        let mut session = self.session()?;
        session.unlock(passphrase)?;
        Ok(session)
    }
}

/// Get the vault passphrase, trying in order:
/// 1. `LOCKBOX_PASSWORD` env var (scripting)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the passphrase is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password("LOCKBOX_PASSWORD") {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault passphrase")
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new passphrase with confirmation.
///
/// `env_var` is checked first for scripted use.  Enforces a minimum
/// length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password(env_var) {
        if pw.chars().count() < MIN_PASSWORD_LEN {
            return Err(LockboxError::CommandFailed(format!(
                "passphrase must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose vault passphrase")
            .with_confirmation(
                "Confirm vault passphrase",
                "Passphrases do not match, try again",
            )
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("passphrase prompt: {e}")))?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Passphrase must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

fn env_password(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Read a secret value from a pipe, or prompt for it without echo.
pub fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let value = if io::stdin().is_terminal() {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("input prompt: {e}")))?
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim_end_matches(['\r', '\n']).to_string();
        zeroize::Zeroize::zeroize(&mut buf);
        trimmed
    };

    if value.is_empty() {
        return Err(LockboxError::CommandFailed("value cannot be empty".into()));
    }
    Ok(Zeroizing::new(value))
}

/// Warn (without failing) when a user-supplied password rates as weak.
pub fn warn_if_weak(password: &str) {
    if strength::classify(password) == Strength::Weak {
        output::warning("This password is weak; consider `--generate`.");
    }
}

/// Reject generated-password lengths outside the supported range.
pub fn check_length(length: usize) -> Result<()> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
        return Err(LockboxError::CommandFailed(format!(
            "password length must be between {MIN_LENGTH} and {MAX_LENGTH}"
        )));
    }
    Ok(())
}

/// Convert a 1-based index from the command line.
pub fn zero_based(index: usize) -> Result<usize> {
    index
        .checked_sub(1)
        .ok_or_else(|| LockboxError::CommandFailed("index starts at 1".into()))
}
