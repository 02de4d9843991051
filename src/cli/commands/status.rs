//! `lockbox status` — show vault, trust anchor and lockout state.
//!
//! Needs no passphrase: only the unencrypted header fields, the trust
//! anchor and `lock.json` are read.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::config::TrustStoreKind;
use crate::errors::{LockboxError, Result};
use crate::vault::StoredVault;

/// Execute the `status` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.session()?;

    let format = match session.file().load() {
        Ok(StoredVault::Current(envelope)) => format!(
            "v{} (revision {}, argon2id {} KiB / {} / {})",
            envelope.version,
            envelope.revision,
            envelope.kdf.memory_kib,
            envelope.kdf.iterations,
            envelope.kdf.parallelism
        ),
        Ok(StoredVault::Legacy(legacy)) => format!(
            "legacy v{} (migrated on next unlock)",
            legacy.version()
        ),
        Err(LockboxError::VaultNotFound(_)) => "not initialized".to_string(),
        Err(e) => format!("unreadable: {e}"),
    };

    let backend = match ctx.user.trust_store {
        TrustStoreKind::Keyring => "keyring",
        TrustStoreKind::File => "file",
    };
    let anchor = match session.guard().trusted() {
        Ok(Some(revision)) => format!("revision {revision} ({backend})"),
        Ok(None) => format!("none ({backend})"),
        Err(e) => format!("unavailable: {e}"),
    };

    let status = session.lockout_status();
    let lockout = if status.locked {
        let until = i64::try_from(status.remaining_seconds)
            .map(|secs| chrono::Local::now() + chrono::Duration::seconds(secs))
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        format!(
            "locked out for {} more seconds (until {until})",
            status.remaining_seconds
        )
    } else {
        format!(
            "not locked out ({} of {} failed attempts)",
            session.failed_attempts(),
            session.policy().max_attempts
        )
    };

    output::print_status_table(&[
        ("Vault", ctx.vault_dir.display().to_string()),
        ("Format", format),
        ("Trust anchor", anchor),
        ("Lockout", lockout),
        (
            "Idle lock",
            format!("{} seconds", session.policy().idle_timeout.as_secs()),
        ),
    ]);

    Ok(())
}
