//! `lockbox note` — add, show, list and remove notes.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{read_secret, Cli, Context, NoteAction};
use crate::errors::{LockboxError, Result};

/// Execute a `note` subcommand.
pub fn execute(cli: &Cli, action: &NoteAction) -> Result<()> {
    let ctx = Context::load(cli)?;

    match action {
        NoteAction::Add { title, content } => {
            let content = match content {
                Some(c) => zeroize::Zeroizing::new(c.clone()),
                None => read_secret(&format!("Text for note '{title}'"))?,
            };

            let mut session = ctx.unlocked_session()?;
            let vault = session.vault_mut()?;
            let replaced = vault.note(title).is_ok();
            if replaced {
                vault.update_note(title, &content)?;
            } else {
                vault.add_note(title, &content)?;
            }
            let revision = session.save()?;
            session.lock();

            let verb = if replaced { "Updated" } else { "Added" };
            output::success(&format!("{verb} note '{title}' (revision {revision})"));
        }
        NoteAction::Show { title } => {
            let session = ctx.unlocked_session()?;
            println!("{}", session.vault()?.note(title)?.content);
        }
        NoteAction::List => {
            let session = ctx.unlocked_session()?;
            output::print_notes_table(session.vault()?.notes());
        }
        NoteAction::Remove { title, force } => {
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete note '{title}'?"))
                    .default(false)
                    .interact()
                    .map_err(|e| LockboxError::CommandFailed(format!("confirm prompt: {e}")))?;
                if !confirmed {
                    output::info("Cancelled.");
                    return Ok(());
                }
            }

            let mut session = ctx.unlocked_session()?;
            session.vault_mut()?.remove_note(title)?;
            session.save()?;
            session.lock();
            output::success(&format!("Deleted note '{title}'"));
        }
    }

    Ok(())
}
