//! `lockbox add` — store a credential.

use crate::cli::output;
use crate::cli::{check_length, read_secret, warn_if_weak, Cli, Context};
use crate::errors::Result;
use crate::vault::{generate_password, Credential};

/// Execute the `add` command.
pub fn execute(
    cli: &Cli,
    service: &str,
    username: &str,
    generate: bool,
    length: usize,
    metadata: Option<&str>,
) -> Result<()> {
    let ctx = Context::load(cli)?;

    // Read the password before unlocking so a cancelled prompt costs nothing.
    let password = if generate {
        check_length(length)?;
        generate_password(length)
    } else {
        read_secret(&format!("Password for {username} @ {service}"))?
    };

    let mut session = ctx.unlocked_session()?;

    let mut credential = Credential::new(service, username, &password);
    if let Some(meta) = metadata {
        credential = credential.with_metadata(meta);
    }
    session.vault_mut()?.add_credential(credential)?;
    let revision = session.save()?;
    let count = session.vault()?.credentials(service)?.len();
    session.lock();

    output::success(&format!(
        "Added {username} @ {service} ({count} for this service, revision {revision})"
    ));
    if generate {
        output::tip(&format!("Run `lockbox get {service} --copy` to copy the generated password."));
    } else {
        warn_if_weak(&password);
    }

    Ok(())
}
