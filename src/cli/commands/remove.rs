//! `lockbox remove` — delete a credential.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{zero_based, Cli, Context};
use crate::errors::{LockboxError, Result};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, service: &str, index: usize, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let index = zero_based(index)?;

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove credential #{} of '{service}'?", index + 1))
            .default(false)
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let mut session = ctx.unlocked_session()?;
    let removed = session.vault_mut()?.remove_credential(service, index)?;
    session.save()?;
    session.lock();

    output::success(&format!("Removed {} @ {service}", removed.username));

    Ok(())
}
