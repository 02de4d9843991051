//! `lockbox shell` — interactive session.
//!
//! Runs the session loop on a single-threaded tokio runtime.  Standard
//! input is read line by line on a plain thread and fed into the loop as
//! events, next to the idle, lockout and clipboard timers.

use std::io::{self, BufRead};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{prompt_password, Cli, Context};
use crate::errors::{LockboxError, Result};
use crate::session::{
    Clipboard, ClipboardGuard, LoopExit, MemoryClipboard, SessionEvent, SessionLoop,
    SystemClipboard,
};

/// Execute the `shell` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.session()?;
    if !session.file().exists() {
        output::tip("Run `lockbox init` to create a vault.");
        return Err(LockboxError::VaultNotFound(ctx.vault_dir.clone()));
    }

    let clipboard: Box<dyn Clipboard> = match SystemClipboard::new() {
        Ok(board) => Box::new(board),
        Err(e) => {
            output::warning(&format!("{e}; copied passwords stay inside lockbox"));
            Box::new(MemoryClipboard::new())
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let exit = runtime.block_on(async {
        let mut session_loop = SessionLoop::new(session, ClipboardGuard::new(clipboard), io::stdout());

        // A passphrase from the environment gets exactly one attempt.
        let scripted = std::env::var("LOCKBOX_PASSWORD").is_ok_and(|pw| !pw.is_empty());
        let mut attempts = 0u32;
        session_loop
            .unlock(|| -> Result<Zeroizing<String>> {
                attempts += 1;
                if scripted && attempts > 1 {
                    return Err(LockboxError::UserCancelled);
                }
                prompt_password()
            })
            .await?;

        output::info("Vault unlocked. Type `help` for commands.");
        spawn_stdin_reader(session_loop.sender());
        session_loop.run().await
    })?;

    match exit {
        LoopExit::Quit => output::success("Vault locked."),
        LoopExit::IdleLocked => output::warning("Vault locked after inactivity."),
    }
    Ok(())
}

fn spawn_stdin_reader(tx: tokio::sync::mpsc::UnboundedSender<SessionEvent>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(SessionEvent::Input(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(SessionEvent::InputClosed);
    });
}
