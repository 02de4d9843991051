//! Integration tests for the Lockbox CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Passphrases are supplied through `LOCKBOX_PASSWORD` and
//! `LOCKBOX_NEW_PASSWORD`, and every test gets its own vault directory,
//! user config with a file trust store, and cheap Argon2 settings.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;

const PASSPHRASE: &str = "correct-horse";

/// A scratch vault directory with a fast `config.toml`, plus a user
/// config next to it that selects a file trust store.
struct Sandbox {
    tmp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let sandbox = Self { tmp };
        fs::create_dir_all(sandbox.vault_dir()).unwrap();
        sandbox.write_vault_config("");
        fs::write(
            sandbox.user_config(),
            format!(
                "trust_store = \"file\"\ntrust_dir = '{}'\n",
                sandbox.tmp.path().join("anchors").display()
            ),
        )
        .unwrap();
        sandbox
    }

    /// Replace the vault's `config.toml`, keeping the cheap Argon2 costs.
    fn write_vault_config(&self, extra: &str) {
        fs::write(
            self.vault_dir().join("config.toml"),
            format!("argon2_memory_kib = 8192\nargon2_iterations = 1\nargon2_parallelism = 1\n{extra}"),
        )
        .unwrap();
    }

    fn user_config(&self) -> PathBuf {
        self.tmp.path().join("lockbox.toml")
    }

    fn vault_dir(&self) -> PathBuf {
        self.tmp.path().join("vault")
    }

    fn vault_file(&self) -> PathBuf {
        self.vault_dir().join("vault.lbx")
    }

    /// `lockbox` pointed at this sandbox, with no passphrase set.
    fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("lockbox").expect("binary should exist");
        cmd.env("LOCKBOX_DIR", self.vault_dir())
            .env("LOCKBOX_CONFIG", self.user_config())
            .env_remove("LOCKBOX_TRUST_STORE")
            .env_remove("LOCKBOX_TRUST_DIR")
            .env_remove("LOCKBOX_PASSWORD")
            .env_remove("LOCKBOX_NEW_PASSWORD")
            .env_remove("LOCKBOX_LOG");
        cmd
    }

    /// `lockbox` with the vault passphrase set.
    fn unlocked(&self, passphrase: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.env("LOCKBOX_PASSWORD", passphrase);
        cmd
    }

    fn init(&self) {
        self.unlocked(PASSPHRASE)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Vault created"));
    }

    fn add(&self, service: &str, username: &str, password: &str) {
        self.unlocked(PASSPHRASE)
            .args(["add", service, username])
            .write_stdin(format!("{password}\n"))
            .assert()
            .success();
    }
}

// ---------------------------------------------------------------------------
// Help and version
// ---------------------------------------------------------------------------

#[test]
fn help_flag_shows_usage() {
    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Local encrypted vault for credentials and notes",
        ))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("passwd"))
        .stdout(predicate::str::contains("shell"));
}

#[test]
fn version_flag_shows_version() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lockbox"));
}

#[test]
fn no_args_shows_help() {
    Sandbox::new()
        .cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ---------------------------------------------------------------------------
// Init, add, get, list
// ---------------------------------------------------------------------------

#[test]
fn init_add_get_list() {
    let sb = Sandbox::new();
    sb.init();
    assert!(sb.vault_file().exists());

    sb.add("github", "alice", "secret123");

    sb.unlocked(PASSPHRASE)
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("secret123"));

    sb.unlocked(PASSPHRASE)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("github"))
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("secret123").not());
}

#[test]
fn second_init_is_refused() {
    let sb = Sandbox::new();
    sb.init();

    sb.unlocked(PASSPHRASE)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn short_passphrase_is_refused_at_init() {
    let sb = Sandbox::new();
    sb.unlocked("short")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 8 characters"));
    assert!(!sb.vault_file().exists());
}

#[test]
fn get_on_missing_vault_fails() {
    let sb = Sandbox::new();
    sb.unlocked(PASSPHRASE)
        .args(["get", "github"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Vault not found"));
}

#[test]
fn second_credential_for_a_service_uses_index() {
    let sb = Sandbox::new();
    sb.init();
    sb.add("github", "alice", "first-pass");
    sb.add("github", "bob", "second-pass");

    sb.unlocked(PASSPHRASE)
        .args(["get", "github", "--index", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("second-pass"));

    sb.unlocked(PASSPHRASE)
        .args(["remove", "github", "--index", "1", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed alice @ github"));

    sb.unlocked(PASSPHRASE)
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("second-pass"));
}

#[test]
fn update_replaces_a_password() {
    let sb = Sandbox::new();
    sb.init();
    sb.add("github", "alice", "secret123");

    sb.unlocked(PASSPHRASE)
        .args(["update", "github"])
        .write_stdin("Fresh-Secret-4567!\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated alice @ github (revision 2)"));

    sb.unlocked(PASSPHRASE)
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fresh-Secret-4567!"));

    sb.unlocked(PASSPHRASE)
        .args(["update", "github", "--index", "2", "--generate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("service 'github' has no credential #2"));
}

#[test]
fn weak_passwords_are_flagged() {
    let sb = Sandbox::new();
    sb.init();

    sb.unlocked(PASSPHRASE)
        .args(["add", "github", "alice"])
        .write_stdin("secret\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("weak"));

    sb.unlocked(PASSPHRASE)
        .args(["add", "gitlab", "alice", "--generate"])
        .assert()
        .success()
        .stderr(predicate::str::contains("weak").not());

    sb.unlocked(PASSPHRASE)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Weak"))
        .stdout(predicate::str::contains("Excellent"));
}

// ---------------------------------------------------------------------------
// Lockout and rollback
// ---------------------------------------------------------------------------

#[test]
fn three_wrong_passphrases_lock_out() {
    let sb = Sandbox::new();
    sb.init();

    for _ in 0..2 {
        sb.unlocked("wrong-passphrase")
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Authentication failed"));
    }
    sb.unlocked("wrong-passphrase")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked out"));

    // Even the right passphrase is refused until the lockout expires.
    sb.unlocked(PASSPHRASE)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked out"));

    assert!(sb.vault_dir().join("lock.json").exists());
}

#[test]
fn restored_backup_is_detected_as_rollback() {
    let sb = Sandbox::new();
    sb.init();
    sb.add("github", "alice", "secret123");

    let backup = sb.tmp.path().join("backup.lbx");
    fs::copy(sb.vault_file(), &backup).unwrap();
    sb.add("gitlab", "alice", "secret456");
    fs::copy(&backup, sb.vault_file()).unwrap();

    sb.unlocked(PASSPHRASE)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rollback detected"));
}

#[test]
fn vault_config_cannot_redirect_the_trust_anchor() {
    let sb = Sandbox::new();
    sb.init();
    sb.add("github", "alice", "secret123");

    let backup = sb.tmp.path().join("backup.lbx");
    fs::copy(sb.vault_file(), &backup).unwrap();
    sb.add("gitlab", "alice", "secret456");

    // Restore the old file together with a config that points at a fresh,
    // empty anchor directory and disables the lockout.
    let empty = sb.tmp.path().join("empty-anchors");
    fs::create_dir_all(&empty).unwrap();
    sb.write_vault_config(&format!(
        "trust_store = \"file\"\ntrust_dir = '{}'\nmax_attempts = 100\nlockout_secs = 0\n",
        empty.display()
    ));
    fs::copy(&backup, sb.vault_file()).unwrap();

    sb.unlocked(PASSPHRASE)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rollback detected"));
    assert_eq!(fs::read_dir(&empty).unwrap().count(), 0);
}

#[test]
fn vault_config_cannot_soften_the_lockout() {
    let sb = Sandbox::new();
    sb.init();
    sb.write_vault_config("max_attempts = 100\nlockout_secs = 0\n");

    for _ in 0..2 {
        sb.unlocked("wrong-passphrase")
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Authentication failed"));
    }
    sb.unlocked("wrong-passphrase")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked out"));
    sb.unlocked(PASSPHRASE)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked out"));
}

#[test]
fn user_config_inside_vault_dir_is_refused() {
    let sb = Sandbox::new();
    sb.init();

    sb.unlocked(PASSPHRASE)
        .env("LOCKBOX_CONFIG", sb.vault_dir().join("config.toml"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be inside the vault directory"));
}

// ---------------------------------------------------------------------------
// Notes, passwd, status, generate, check
// ---------------------------------------------------------------------------

#[test]
fn note_add_and_show() {
    let sb = Sandbox::new();
    sb.init();

    sb.unlocked(PASSPHRASE)
        .args(["note", "add", "wifi", "hunter2"])
        .assert()
        .success();

    sb.unlocked(PASSPHRASE)
        .args(["note", "show", "wifi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2"));

    sb.unlocked(PASSPHRASE)
        .args(["note", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wifi"));
}

#[test]
fn passwd_changes_the_passphrase() {
    let sb = Sandbox::new();
    sb.init();
    sb.add("github", "alice", "secret123");

    sb.unlocked(PASSPHRASE)
        .env("LOCKBOX_NEW_PASSWORD", "battery-staple")
        .arg("passwd")
        .assert()
        .success()
        .stdout(predicate::str::contains("Passphrase changed"));

    sb.unlocked("battery-staple")
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("secret123"));

    sb.unlocked(PASSPHRASE)
        .args(["get", "github"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn status_needs_no_passphrase() {
    let sb = Sandbox::new();
    sb.init();
    sb.add("github", "alice", "secret123");

    sb.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("revision 1"));
}

#[test]
fn generate_prints_password_of_requested_length() {
    let output = Sandbox::new()
        .cmd()
        .args(["generate", "--length", "16"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let password = String::from_utf8(output).unwrap();
    assert_eq!(password.trim_end().chars().count(), 16);
}

#[test]
fn generate_rejects_too_short_length() {
    Sandbox::new()
        .cmd()
        .args(["generate", "--length", "4"])
        .assert()
        .failure();
}

#[test]
fn check_passes_on_fresh_vault() {
    let sb = Sandbox::new();
    sb.init();

    sb.cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("not locked out"));
}
