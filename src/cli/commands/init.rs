//! `lockbox init` — create a new, empty vault.

use crate::cli::output;
use crate::cli::{prompt_new_password, Cli, Context};
use crate::errors::{LockboxError, Result};

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut session = ctx.session()?;

    // 1. Refuse to overwrite an existing vault (current or legacy format).
    if session.file().exists() {
        output::tip("Use `lockbox add` to add credentials to the existing vault.");
        return Err(LockboxError::VaultAlreadyExists(ctx.vault_dir.clone()));
    }

    // 2. Prompt for a new passphrase (with confirmation).
    let passphrase = prompt_new_password("LOCKBOX_PASSWORD")?;

    // 3. Write the empty vault at revision 0 and reset the trust anchor.
    session.create(passphrase.as_bytes())?;
    session.lock();

    output::success(&format!("Vault created at {}", ctx.vault_dir.display()));
    output::tip("Run `lockbox add <service> <username>` to store a credential.");
    output::tip("Run `lockbox shell` for an interactive session.");

    Ok(())
}
