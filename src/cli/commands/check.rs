//! `lockbox check` — self-check of the vault directory.
//!
//! Verifies, without a passphrase:
//! - directory and file permissions are owner-only (Unix)
//! - the vault file parses and has a supported format version
//! - the envelope revision is not behind the trust anchor
//! - no lockout is currently active

use std::path::Path;

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{LockboxError, Result};
use crate::session::LockStateFile;
use crate::vault::StoredVault;

#[derive(Default)]
struct Report {
    failures: usize,
}

impl Report {
    fn pass(&self, msg: &str) {
        output::success(msg);
    }

    fn warn(&self, msg: &str) {
        output::warning(msg);
    }

    fn fail(&mut self, msg: &str) {
        output::error(msg);
        self.failures += 1;
    }
}

/// Execute the `check` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.session()?;
    let file = session.file();
    let mut report = Report::default();

    if !file.exists() {
        output::tip("Run `lockbox init` to create a vault.");
        return Err(LockboxError::VaultNotFound(ctx.vault_dir.clone()));
    }

    // 1. Permissions.
    check_mode(&mut report, &ctx.vault_dir, 0o700);
    for path in [
        file.path(),
        file.legacy_path(),
        LockStateFile::new(&ctx.vault_dir).path().to_path_buf(),
    ] {
        if path.exists() {
            check_mode(&mut report, &path, 0o600);
        }
    }

    // 2. Format, and 3. revision against the trust anchor.
    match file.load() {
        Ok(StoredVault::Current(envelope)) => {
            report.pass(&format!(
                "{} parses (format v{}, revision {})",
                file.path().display(),
                envelope.version,
                envelope.revision
            ));
            match session.guard().trusted() {
                Ok(Some(trusted)) if envelope.revision < trusted => report.fail(&format!(
                    "revision {} is older than trusted revision {trusted} — possible rollback",
                    envelope.revision
                )),
                Ok(Some(trusted)) => report.pass(&format!("trust anchor at revision {trusted}")),
                Ok(None) => report.warn("no trust anchor recorded yet (set on next unlock)"),
                Err(e) => report.fail(&format!("trust anchor unavailable: {e}")),
            }
        }
        Ok(StoredVault::Legacy(legacy)) => report.warn(&format!(
            "vault is in legacy format v{}; unlock it once to migrate",
            legacy.version()
        )),
        Err(e) => report.fail(&format!("vault file: {e}")),
    }

    // 4. Lockout.
    let status = session.lockout_status();
    if status.locked {
        report.warn(&format!(
            "locked out for {} more seconds",
            status.remaining_seconds
        ));
    } else {
        report.pass(&format!(
            "not locked out ({} failed attempts recorded)",
            session.failed_attempts()
        ));
    }

    if report.failures > 0 {
        return Err(LockboxError::CommandFailed(format!(
            "{} check(s) failed",
            report.failures
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn check_mode(report: &mut Report, path: &Path, expected: u32) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode() & 0o777;
            if mode & !expected == 0 {
                report.pass(&format!("{} is {mode:o}", path.display()));
            } else {
                report.fail(&format!(
                    "{} is {mode:o}, expected {expected:o} or stricter",
                    path.display()
                ));
            }
        }
        Err(e) => report.fail(&format!("{}: {e}", path.display())),
    }
}

#[cfg(not(unix))]
fn check_mode(_report: &mut Report, _path: &Path, _expected: u32) {}
