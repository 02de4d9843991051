//! `lockbox update` — replace the password of a stored credential.

use crate::cli::output;
use crate::cli::{check_length, read_secret, warn_if_weak, zero_based, Cli, Context};
use crate::errors::Result;
use crate::vault::generate_password;

/// Execute the `update` command.
pub fn execute(cli: &Cli, service: &str, index: usize, generate: bool, length: usize) -> Result<()> {
    let ctx = Context::load(cli)?;
    let position = zero_based(index)?;

    let password = if generate {
        check_length(length)?;
        generate_password(length)
    } else {
        read_secret(&format!("New password for {service} #{index}"))?
    };

    let mut session = ctx.unlocked_session()?;
    let username = {
        let vault = session.vault_mut()?;
        vault.set_password(service, position, &password)?;
        vault.credential(service, position)?.username.clone()
    };
    let revision = session.save()?;
    session.lock();

    output::success(&format!(
        "Updated {username} @ {service} (revision {revision})"
    ));
    if !generate {
        warn_if_weak(&password);
    }

    Ok(())
}
