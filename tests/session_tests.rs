//! Integration tests for the session state machine: lockout, rollback
//! and idle handling, driven by a manual clock.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lockbox::crypto::kdf::MIN_MEMORY_KIB;
use lockbox::crypto::KdfParams;
use lockbox::errors::LockboxError;
use lockbox::rollback::{MemoryTrustStore, RollbackGuard, TrustStore};
use lockbox::session::{ManualClock, Session, SessionPolicy, SessionState};
use lockbox::vault::Credential;
use tempfile::TempDir;

const EPOCH: u64 = 1_700_000_000;

fn policy() -> SessionPolicy {
    SessionPolicy {
        kdf: KdfParams {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        },
        ..SessionPolicy::default()
    }
}

/// Everything a test needs to open sessions on the same vault.
struct Fixture {
    _tmp: TempDir,
    dir: std::path::PathBuf,
    clock: ManualClock,
    store: Arc<MemoryTrustStore>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let dir = tmp.path().join("vault");
        Self {
            _tmp: tmp,
            dir,
            clock: ManualClock::new(EPOCH),
            store: Arc::new(MemoryTrustStore::new()),
        }
    }

    fn session(&self) -> Session {
        let store: Arc<dyn TrustStore> = self.store.clone();
        Session::new(
            &self.dir,
            RollbackGuard::new(store, "vault:session-test"),
            Arc::new(self.clock.clone()),
            policy(),
        )
        .expect("load session")
    }

    fn vault_path(&self) -> std::path::PathBuf {
        self.dir.join("vault.lbx")
    }

    /// A vault at revision 1 holding one credential, passphrase "P1".
    fn with_vault(self) -> Self {
        let mut session = self.session();
        session.create(b"P1").expect("create vault");
        session
            .vault_mut()
            .unwrap()
            .add_credential(Credential::new("github", "alice", "secret123"))
            .unwrap();
        assert_eq!(session.save().unwrap(), 1);
        session.lock();
        self
    }
}

fn move_file(from: &Path, to: &Path) {
    fs::rename(from, to).expect("move vault file");
}

// ---------------------------------------------------------------------------
// Create and save
// ---------------------------------------------------------------------------

#[test]
fn create_add_save_then_unlock_again() {
    let fx = Fixture::new().with_vault();

    let mut session = fx.session();
    assert_eq!(session.state(), SessionState::Locked);
    session.unlock(b"P1").unwrap();
    assert_eq!(session.state(), SessionState::Unlocked);
    assert_eq!(session.revision(), Some(1));

    let credential = session.vault().unwrap().credential("github", 0).unwrap();
    assert_eq!(credential.username, "alice");
    assert_eq!(credential.password, "secret123");
}

#[test]
fn every_save_advances_the_anchor() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();

    for expected in 2..=6u64 {
        session.vault_mut().unwrap().add_note(&format!("n{expected}"), "x").unwrap();
        assert_eq!(session.save().unwrap(), expected);
        assert_eq!(session.guard().trusted().unwrap(), Some(expected));
    }
}

// ---------------------------------------------------------------------------
// Lockout
// ---------------------------------------------------------------------------

#[test]
fn third_failure_locks_out_and_expiry_allows_retry() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();

    for attempt in 1..=2u32 {
        let err = session.unlock(b"P2").unwrap_err();
        assert!(matches!(err, LockboxError::Authentication));
        assert_eq!(session.failed_attempts(), attempt);
        assert_eq!(session.state(), SessionState::Locked);
    }

    let err = session.unlock(b"P2").unwrap_err();
    assert!(matches!(err, LockboxError::LockedOut(120)));
    assert_eq!(session.state(), SessionState::LockedOut);

    // With the vault file gone, any pipeline run would fail differently.
    // Getting LockedOut proves the correct passphrase was never tried.
    let aside = fx.dir.join("aside.lbx");
    move_file(&fx.vault_path(), &aside);
    fx.clock.advance(Duration::from_secs(30));
    let err = session.unlock(b"P1").unwrap_err();
    assert!(matches!(err, LockboxError::LockedOut(90)));
    move_file(&aside, &fx.vault_path());

    fx.clock.advance(Duration::from_secs(90));
    session.unlock(b"P1").unwrap();
    assert_eq!(session.state(), SessionState::Unlocked);
    assert_eq!(session.failed_attempts(), 0);
}

#[test]
fn lockout_survives_a_new_session() {
    let fx = Fixture::new().with_vault();
    {
        let mut session = fx.session();
        for _ in 0..3 {
            let _ = session.unlock(b"wrong");
        }
    }

    let mut session = fx.session();
    assert_eq!(session.state(), SessionState::LockedOut);
    let status = session.lockout_status();
    assert!(status.locked);
    assert_eq!(status.remaining_seconds, 120);
    assert!(matches!(
        session.unlock(b"P1"),
        Err(LockboxError::LockedOut(_))
    ));
}

#[test]
fn expired_lockout_gives_a_fresh_set_of_attempts() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    for _ in 0..3 {
        let _ = session.unlock(b"wrong");
    }
    fx.clock.advance(Duration::from_secs(121));

    // The counter restarts at zero, so one wrong attempt is not a lockout.
    let err = session.unlock(b"wrong").unwrap_err();
    assert!(matches!(err, LockboxError::Authentication));
    assert_eq!(session.failed_attempts(), 1);
}

#[test]
fn unreadable_lock_state_starts_a_full_lockout() {
    let fx = Fixture::new().with_vault();
    fs::write(fx.dir.join("lock.json"), "{not json").unwrap();

    let mut session = fx.session();
    assert_eq!(session.state(), SessionState::LockedOut);
    assert_eq!(session.lockout_status().remaining_seconds, 120);
    assert!(matches!(
        session.unlock(b"P1"),
        Err(LockboxError::LockedOut(120))
    ));

    // The replacement state is well formed and persisted.
    let text = fs::read_to_string(fx.dir.join("lock.json")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    drop(session);
    assert_eq!(fx.session().state(), SessionState::LockedOut);

    fx.clock.advance(Duration::from_secs(120));
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();
    assert_eq!(session.failed_attempts(), 0);
}

#[test]
fn missing_vault_is_not_a_failed_attempt() {
    let fx = Fixture::new();
    let mut session = fx.session();

    assert!(session.unlock(b"P1").is_err());
    assert_eq!(session.failed_attempts(), 0);
    assert_eq!(session.state(), SessionState::Locked);
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

#[test]
fn restored_backup_is_rollback_and_counts_as_attempt() {
    let fx = Fixture::new().with_vault();
    let backup = fx.dir.join("backup.lbx");

    let mut session = fx.session();
    session.unlock(b"P1").unwrap();
    session.vault_mut().unwrap().add_note("a", "1").unwrap();
    assert_eq!(session.save().unwrap(), 2);
    session.vault_mut().unwrap().add_note("b", "2").unwrap();
    assert_eq!(session.save().unwrap(), 3);
    fs::copy(fx.vault_path(), &backup).unwrap();
    session.save().unwrap();
    assert_eq!(session.save().unwrap(), 5);
    session.lock();

    fs::copy(&backup, fx.vault_path()).unwrap();
    let err = session.unlock(b"P1").unwrap_err();
    assert!(matches!(
        err,
        LockboxError::RollbackDetected { found: 3, trusted: 5 }
    ));
    assert_eq!(session.failed_attempts(), 1);
    assert!(session.vault().is_err());
}

// ---------------------------------------------------------------------------
// Idle lock and quit
// ---------------------------------------------------------------------------

#[test]
fn idle_timeout_locks_and_wipes() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();

    fx.clock.advance(Duration::from_secs(119));
    assert!(!session.check_idle());
    assert_eq!(session.idle_remaining(), Some(Duration::from_secs(1)));

    fx.clock.advance(Duration::from_secs(1));
    assert!(session.check_idle());
    assert_eq!(session.state(), SessionState::Locked);
    assert!(matches!(session.vault(), Err(LockboxError::NotUnlocked)));
}

#[test]
fn activity_restarts_the_idle_window() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();

    fx.clock.advance(Duration::from_secs(100));
    session.touch_activity();
    fx.clock.advance(Duration::from_secs(100));
    assert!(!session.check_idle());
    assert_eq!(session.state(), SessionState::Unlocked);
}

#[test]
fn idle_lock_discards_unsaved_changes() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();
    session.vault_mut().unwrap().add_note("draft", "x").unwrap();

    fx.clock.advance(Duration::from_secs(120));
    assert!(session.check_idle());

    session.unlock(b"P1").unwrap();
    assert_eq!(session.revision(), Some(1));
    assert!(session.vault().unwrap().note("draft").is_err());
}

#[test]
fn quit_flushes_dirty_changes() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();
    session.vault_mut().unwrap().add_note("draft", "x").unwrap();
    assert!(session.is_dirty());

    session.quit().unwrap();
    assert_eq!(session.state(), SessionState::Locked);

    session.unlock(b"P1").unwrap();
    assert_eq!(session.revision(), Some(2));
    assert_eq!(session.vault().unwrap().note("draft").unwrap().content, "x");
}

// ---------------------------------------------------------------------------
// Passphrase change
// ---------------------------------------------------------------------------

#[test]
fn wrong_old_passphrase_counts_toward_lockout() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();

    assert!(matches!(
        session.change_passphrase(b"nope", b"P2"),
        Err(LockboxError::Authentication)
    ));
    assert_eq!(session.failed_attempts(), 1);
    assert!(session.change_passphrase(b"nope", b"P2").is_err());
    assert!(matches!(
        session.change_passphrase(b"nope", b"P2"),
        Err(LockboxError::LockedOut(120))
    ));
    assert_eq!(session.state(), SessionState::LockedOut);
    assert!(session.vault().is_err());
}

#[test]
fn passphrase_change_takes_effect() {
    let fx = Fixture::new().with_vault();
    let mut session = fx.session();
    session.unlock(b"P1").unwrap();
    session.change_passphrase(b"P1", b"P2").unwrap();
    session.lock();

    assert!(session.unlock(b"P1").is_err());
    session.unlock(b"P2").unwrap();
    assert_eq!(session.revision(), Some(1));
}
