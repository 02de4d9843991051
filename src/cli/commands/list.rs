//! `lockbox list` — display services and usernames in a table.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.unlocked_session()?;
    let vault = session.vault()?;

    output::info(&format!(
        "{} credential(s) in {} service(s), {} note(s) — revision {}",
        vault.credential_count(),
        vault.services().count(),
        vault.notes().len(),
        vault.revision()
    ));

    output::print_credentials_table(vault);

    Ok(())
}
