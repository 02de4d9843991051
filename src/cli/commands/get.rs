//! `lockbox get` — print or copy a stored password.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{zero_based, Cli, Context};
use crate::errors::Result;
use crate::session::{ClipboardGuard, SystemClipboard};

/// Execute the `get` command.
pub fn execute(cli: &Cli, service: &str, index: usize, copy: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut session = ctx.unlocked_session()?;

    let password = {
        let credential = session.vault()?.credential(service, zero_based(index)?)?;
        Zeroizing::new(credential.password.clone())
    };
    session.lock();

    if !copy {
        println!("{}", password.as_str());
        return Ok(());
    }

    // Keep the process alive until the clipboard is cleared: on some
    // platforms the content disappears with the owning process anyway.
    let mut guard = ClipboardGuard::new(Box::new(SystemClipboard::new()?));
    guard.copy(&password)?;
    let after = ctx.settings.session_policy().clipboard_clear;
    output::success(&format!(
        "Password copied. Clipboard clears in {} seconds.",
        after.as_secs()
    ));
    std::thread::sleep(after);
    if guard.clear_if_unchanged()? {
        output::info("Clipboard cleared.");
    }

    Ok(())
}
