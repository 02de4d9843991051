//! `lockbox passwd` — change the vault passphrase.
//!
//! The data key is re-wrapped under a key derived from the new
//! passphrase with a fresh salt.  The payload and the revision on disk
//! are left as they are.

use crate::cli::output;
use crate::cli::{prompt_new_password, prompt_password, Cli, Context};
use crate::errors::Result;

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    // 1. Unlock with the current passphrase.
    output::info("Enter your current vault passphrase.");
    let old = prompt_password()?;
    let mut session = ctx.unlock_with(old.as_bytes())?;

    // 2. Prompt for the new one.
    output::info("Choose your new vault passphrase.");
    let new = prompt_new_password("LOCKBOX_NEW_PASSWORD")?;

    // 3. Re-wrap the data key and write atomically.
    session.change_passphrase(old.as_bytes(), new.as_bytes())?;
    session.lock();

    output::success("Passphrase changed.");
    output::tip("Backups made before this change still open with the old passphrase.");

    Ok(())
}
