//! Integration tests for the interactive session loop, run on tokio's
//! paused clock so the idle, lockout and clipboard timers fire instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lockbox::crypto::kdf::MIN_MEMORY_KIB;
use lockbox::crypto::KdfParams;
use lockbox::errors::LockboxError;
use lockbox::rollback::{MemoryTrustStore, RollbackGuard};
use lockbox::session::{
    Clipboard, Clock, ClipboardGuard, LoopExit, MemoryClipboard, Session, SessionEvent, SessionLoop,
    SessionPolicy, SessionState, SystemClock,
};
use lockbox::vault::VaultFile;
use tempfile::TempDir;
use zeroize::Zeroizing;

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

/// Wall-clock time that moves with tokio's (paused) clock.
struct TokioClock {
    epoch: u64,
    origin: tokio::time::Instant,
}

impl TokioClock {
    fn new() -> Self {
        Self {
            epoch: 1_700_000_000,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_epoch_secs(&self) -> u64 {
        self.epoch + self.origin.elapsed().as_secs()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

fn guard() -> RollbackGuard {
    RollbackGuard::new(Arc::new(MemoryTrustStore::new()), "vault:loop-test")
}

fn created_session(dir: &std::path::Path, guard: RollbackGuard) -> Session {
    let mut session =
        Session::new(dir, guard, Arc::new(SystemClock::new()), policy()).expect("load session");
    session.create(b"P1").expect("create vault");
    session
}

fn send(tx: &tokio::sync::mpsc::UnboundedSender<SessionEvent>, line: &str) {
    tx.send(SessionEvent::Input(line.to_string()))
        .expect("loop is listening");
}

// ---------------------------------------------------------------------------
// Idle lock and clipboard clearing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn idle_timeout_locks_and_clears_clipboard() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let session = created_session(&dir, guard());
    let clipboard = MemoryClipboard::new();
    let mut out = Vec::new();

    let mut lp = SessionLoop::new(session, ClipboardGuard::new(Box::new(clipboard.clone())), &mut out);
    let tx = lp.sender();
    send(&tx, "add github alice");
    send(&tx, "copy github");

    let exit = lp.run().await.expect("loop runs");
    assert_eq!(exit, LoopExit::IdleLocked);

    let session = lp.into_session();
    assert_eq!(session.state(), SessionState::Locked);
    assert!(clipboard.contents().is_none());

    // The unsaved credential was discarded, not flushed.
    assert_eq!(VaultFile::new(&dir).load_current().unwrap().revision, 0);

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Added alice @ github"));
    assert!(printed.contains("Locked after inactivity."));
}

#[tokio::test(start_paused = true)]
async fn clipboard_is_cleared_before_idle_lock() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let session = created_session(&dir, guard());
    let clipboard = MemoryClipboard::new();

    let mut lp = SessionLoop::new(
        session,
        ClipboardGuard::new(Box::new(clipboard.clone())),
        std::io::sink(),
    );
    let tx = lp.sender();
    send(&tx, "add github alice");

    let watcher = clipboard.clone();
    let sampled = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let during = watcher.contents();
        tokio::time::sleep(Duration::from_secs(15)).await;
        (during, watcher.contents())
    });

    assert_eq!(lp.run().await.unwrap(), LoopExit::IdleLocked);
    let (during, after) = sampled.await.unwrap();
    assert!(during.is_some(), "password is on the clipboard at 10s");
    assert!(after.is_none(), "clipboard cleared by 25s");
}

// ---------------------------------------------------------------------------
// Quit
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn quit_saves_pending_changes() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let session = created_session(&dir, guard());
    let clipboard = MemoryClipboard::new();

    let mut lp = SessionLoop::new(
        session,
        ClipboardGuard::new(Box::new(clipboard.clone())),
        std::io::sink(),
    );
    let tx = lp.sender();
    send(&tx, "add github alice");
    send(&tx, "quit");

    assert_eq!(lp.run().await.unwrap(), LoopExit::Quit);
    assert_eq!(VaultFile::new(&dir).load_current().unwrap().revision, 1);
    assert!(clipboard.contents().is_none());
}

#[tokio::test(start_paused = true)]
async fn regen_replaces_the_password_and_is_saved_on_quit() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let session = created_session(&dir, guard());
    let clipboard = MemoryClipboard::new();
    let mut out = Vec::new();

    let mut lp = SessionLoop::new(session, ClipboardGuard::new(Box::new(clipboard.clone())), &mut out);
    let tx = lp.sender();
    send(&tx, "add github alice");
    send(&tx, "save");
    send(&tx, "regen github 2");
    send(&tx, "regen github");
    send(&tx, "quit");

    assert_eq!(lp.run().await.unwrap(), LoopExit::Quit);
    let left_on_clipboard = clipboard.contents();
    drop(lp);

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("service 'github' has no credential #2"));
    assert!(printed.contains("New password for alice @ github copied."));
    assert_eq!(VaultFile::new(&dir).load_current().unwrap().revision, 2);
    // Quit clears what regen placed on the clipboard.
    assert!(left_on_clipboard.is_none());
}

#[tokio::test(start_paused = true)]
async fn closed_input_behaves_like_quit() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let session = created_session(&dir, guard());

    let mut lp = SessionLoop::new(
        session,
        ClipboardGuard::new(Box::new(MemoryClipboard::new())),
        std::io::sink(),
    );
    let tx = lp.sender();
    send(&tx, "add github alice");
    tx.send(SessionEvent::InputClosed).unwrap();

    assert_eq!(lp.run().await.unwrap(), LoopExit::Quit);
    assert_eq!(VaultFile::new(&dir).load_current().unwrap().revision, 1);
}

/// A clipboard that counts every access and cannot be read.
#[derive(Clone, Default)]
struct CountingClipboard {
    accesses: Arc<AtomicUsize>,
}

impl Clipboard for CountingClipboard {
    fn get_text(&mut self) -> lockbox::errors::Result<Option<String>> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        Err(LockboxError::Clipboard("no display".into()))
    }

    fn set_text(&mut self, _text: &str) -> lockbox::errors::Result<()> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&mut self) -> lockbox::errors::Result<()> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn quit_without_a_copy_leaves_the_clipboard_alone() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let session = created_session(&dir, guard());
    let clipboard = CountingClipboard::default();

    let mut lp = SessionLoop::new(
        session,
        ClipboardGuard::new(Box::new(clipboard.clone())),
        std::io::sink(),
    );
    let tx = lp.sender();
    send(&tx, "list");
    send(&tx, "quit");

    assert_eq!(lp.run().await.unwrap(), LoopExit::Quit);
    assert_eq!(clipboard.accesses.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn run_refuses_a_locked_session() {
    let tmp = TempDir::new().unwrap();
    let session = Session::new(
        &tmp.path().join("vault"),
        guard(),
        Arc::new(SystemClock::new()),
        policy(),
    )
    .unwrap();

    let mut lp = SessionLoop::new(
        session,
        ClipboardGuard::new(Box::new(MemoryClipboard::new())),
        std::io::sink(),
    );
    assert!(matches!(lp.run().await, Err(LockboxError::NotUnlocked)));
}

// ---------------------------------------------------------------------------
// Unlock with lockout
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unlock_waits_out_the_lockout() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("vault");
    let guard = guard();
    let mut first = created_session(&dir, guard.clone());
    first.lock();
    drop(first);

    let session = Session::new(&dir, guard, Arc::new(TokioClock::new()), policy()).unwrap();
    let mut out = Vec::new();
    let mut lp = SessionLoop::new(
        session,
        ClipboardGuard::new(Box::new(MemoryClipboard::new())),
        &mut out,
    );

    let mut answers = vec!["P1", "wrong", "wrong", "wrong"];
    let started = tokio::time::Instant::now();
    lp.unlock(|| {
        let next = answers.pop().expect("no more prompts expected");
        Ok(Zeroizing::new(next.to_string()))
    })
    .await
    .expect("unlocks after the lockout");

    assert!(started.elapsed() >= Duration::from_secs(120));
    let session = lp.into_session();
    assert_eq!(session.state(), SessionState::Unlocked);
    assert_eq!(session.failed_attempts(), 0);

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Too many failed attempts. Try again in 120 seconds."));
}
