//! The session state machine: lock, unlock, lockout and idle handling.
//!
//! ```text
//!            submit passphrase               success
//!   Locked ───────────────────▶ Authenticating ───────▶ Unlocked
//!     ▲  ▲                            │                   │
//!     │  └────── failure (< max) ─────┘                   │ idle / quit
//!     │                               │ failure (= max)   │
//!     │  expiry, next attempt         ▼                   │
//!     └───────────────────────── LockedOut ◀──────────────┘ (Locked)
//! ```
//!
//! The failed-attempt counter and lockout deadline are written to
//! `lock.json` on every change so that restarting the process does not
//! reset them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::clock::Clock;
use super::lockstate::{LockState, LockStateFile};
use crate::crypto::KdfParams;
use crate::errors::{LockboxError, Result};
use crate::rollback::RollbackGuard;
use crate::vault::{Vault, VaultFile, VaultStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Authenticating,
    Unlocked,
    LockedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub locked: bool,
    pub remaining_seconds: u64,
}

/// Consecutive failures that trigger a lockout.
pub const MAX_ATTEMPTS: u32 = 3;

/// How long unlocking is refused once the limit is reached.
pub const LOCKOUT: Duration = Duration::from_secs(120);

/// Tunables of a session.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub max_attempts: u32,
    pub lockout: Duration,
    pub idle_timeout: Duration,
    pub clipboard_clear: Duration,
    /// Parameters for newly derived KEKs (create, migration, passphrase change).
    pub kdf: KdfParams,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            lockout: LOCKOUT,
            idle_timeout: Duration::from_secs(120),
            clipboard_clear: Duration::from_secs(20),
            kdf: KdfParams::default(),
        }
    }
}

pub struct Session {
    file: VaultFile,
    guard: RollbackGuard,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    lock_file: LockStateFile,
    lock_state: LockState,
    state: SessionState,
    store: Option<VaultStore>,
    last_activity: Duration,
}

impl Session {
    /// Load the lock state for the vault in `dir`.  The session starts
    /// `LockedOut` if an unexpired lockout is recorded, `Locked` otherwise.
    pub fn new(
        dir: &Path,
        guard: RollbackGuard,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Result<Self> {
        let lock_file = LockStateFile::new(dir);
        let lock_state = match lock_file.load() {
            Ok(state) => state,
            Err(LockboxError::InvalidFormat(detail)) => {
                // Fail closed: an unreadable counter is a fresh full lockout.
                warn!(%detail, "lock state unreadable, starting a full lockout");
                let state = LockState {
                    failed_attempts: policy.max_attempts,
                    lockout_until: clock
                        .now_epoch_secs()
                        .saturating_add(policy.lockout.as_secs()),
                };
                lock_file.store(&state)?;
                state
            }
            Err(e) => return Err(e),
        };
        let state = if lock_state.is_locked_out(clock.now_epoch_secs()) {
            SessionState::LockedOut
        } else {
            SessionState::Locked
        };
        let last_activity = clock.monotonic();

        Ok(Self {
            file: VaultFile::new(dir),
            guard,
            clock,
            policy,
            lock_file,
            lock_state,
            state,
            store: None,
            last_activity,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn file(&self) -> &VaultFile {
        &self.file
    }

    pub fn guard(&self) -> &RollbackGuard {
        &self.guard
    }

    pub fn failed_attempts(&self) -> u32 {
        self.lock_state.failed_attempts
    }

    // ------------------------------------------------------------------
    // Unlocking
    // ------------------------------------------------------------------

    /// Create a new vault and enter the unlocked state.
    pub fn create(&mut self, passphrase: &[u8]) -> Result<()> {
        let store = VaultStore::create(self.file.clone(), passphrase, &self.policy.kdf, &self.guard)?;
        self.enter_unlocked(store)
    }

    /// Submit a passphrase.
    ///
    /// While a lockout is active this returns `LockedOut` without running
    /// any part of the unlock pipeline.  Wrong passphrases, tampered files
    /// and rollbacks count as failed attempts; the attempt that reaches
    /// the limit returns `LockedOut` with the full lockout duration.
    pub fn unlock(&mut self, passphrase: &[u8]) -> Result<()> {
        if self.state == SessionState::Unlocked {
            return Ok(());
        }
        self.admit_attempt()?;

        self.state = SessionState::Authenticating;
        match VaultStore::open(self.file.clone(), passphrase, &self.policy.kdf, &self.guard) {
            Ok(store) => self.enter_unlocked(store),
            Err(e) => {
                self.state = SessionState::Locked;
                Err(self.register_failure(e)?)
            }
        }
    }

    /// Whether unlocking is currently refused, and for how long.
    pub fn lockout_status(&self) -> LockoutStatus {
        let now = self.clock.now_epoch_secs();
        LockoutStatus {
            locked: self.lock_state.is_locked_out(now),
            remaining_seconds: self.lock_state.remaining(now),
        }
    }

    /// Reject attempts during a lockout; clear an expired one.
    fn admit_attempt(&mut self) -> Result<()> {
        if self.lock_state.lockout_until == 0 {
            return Ok(());
        }
        let now = self.clock.now_epoch_secs();
        if self.lock_state.is_locked_out(now) {
            self.state = SessionState::LockedOut;
            let remaining = self.lock_state.remaining(now);
            debug!(remaining, "unlock attempt rejected during lockout");
            return Err(LockboxError::LockedOut(remaining));
        }

        info!("lockout expired, failed-attempt counter reset");
        self.lock_state = LockState::default();
        self.state = SessionState::Locked;
        self.lock_file.store(&self.lock_state)
    }

    /// Count `err` against the attempt limit if it is an authentication
    /// outcome.  Returns the error the caller should report.
    fn register_failure(&mut self, err: LockboxError) -> Result<LockboxError> {
        if !err.counts_as_failed_attempt() {
            return Ok(err);
        }

        self.lock_state.failed_attempts = self.lock_state.failed_attempts.saturating_add(1);
        let attempts = self.lock_state.failed_attempts;

        if attempts >= self.policy.max_attempts {
            let lockout = self.policy.lockout.as_secs();
            self.lock_state.lockout_until = self.clock.now_epoch_secs().saturating_add(lockout);
            self.store = None;
            self.state = SessionState::LockedOut;
            self.lock_file.store(&self.lock_state)?;
            warn!(attempts, lockout_secs = lockout, "too many failed attempts, locked out");
            return Ok(LockboxError::LockedOut(lockout));
        }

        self.lock_file.store(&self.lock_state)?;
        warn!(attempts, max = self.policy.max_attempts, error = %err, "unlock attempt failed");
        Ok(err)
    }

    fn enter_unlocked(&mut self, store: VaultStore) -> Result<()> {
        if self.lock_state != LockState::default() {
            self.lock_state = LockState::default();
            self.lock_file.store(&self.lock_state)?;
        }
        info!(revision = store.revision(), "session unlocked");
        self.store = Some(store);
        self.state = SessionState::Unlocked;
        self.last_activity = self.clock.monotonic();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Idle tracking
    // ------------------------------------------------------------------

    /// Record user activity, restarting the idle window.
    pub fn touch_activity(&mut self) {
        if self.state == SessionState::Unlocked {
            self.last_activity = self.clock.monotonic();
        }
    }

    /// Time left before the idle lock, `None` unless unlocked.
    pub fn idle_remaining(&self) -> Option<Duration> {
        if self.state != SessionState::Unlocked {
            return None;
        }
        let idle = self.clock.monotonic().saturating_sub(self.last_activity);
        Some(self.policy.idle_timeout.saturating_sub(idle))
    }

    /// Lock (without saving) if the idle timeout has elapsed.  Returns
    /// `true` if the session was locked by this call.
    pub fn check_idle(&mut self) -> bool {
        match self.idle_remaining() {
            Some(remaining) if remaining.is_zero() => {
                if self.store.as_ref().is_some_and(VaultStore::is_dirty) {
                    warn!("idle timeout reached, discarding unsaved changes");
                }
                info!("session locked after inactivity");
                self.lock();
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Unlocked operations
    // ------------------------------------------------------------------

    pub fn vault(&self) -> Result<&Vault> {
        self.store
            .as_ref()
            .map(VaultStore::vault)
            .ok_or(LockboxError::NotUnlocked)
    }

    pub fn vault_mut(&mut self) -> Result<&mut Vault> {
        self.store
            .as_mut()
            .map(VaultStore::vault_mut)
            .ok_or(LockboxError::NotUnlocked)
    }

    /// Revision of the last committed envelope, if unlocked.
    pub fn revision(&self) -> Option<u64> {
        self.store.as_ref().map(VaultStore::revision)
    }

    pub fn is_dirty(&self) -> bool {
        self.store.as_ref().is_some_and(VaultStore::is_dirty)
    }

    /// Persist the vault under the next revision.
    pub fn save(&mut self) -> Result<u64> {
        let store = self.store.as_mut().ok_or(LockboxError::NotUnlocked)?;
        let revision = store.save(&self.guard)?;
        self.touch_activity();
        Ok(revision)
    }

    /// Re-wrap the DEK under `new`.  A wrong `old` passphrase counts as a
    /// failed attempt and can lock the session out.
    pub fn change_passphrase(&mut self, old: &[u8], new: &[u8]) -> Result<()> {
        let store = self.store.as_mut().ok_or(LockboxError::NotUnlocked)?;
        match store.change_passphrase(old, new, &self.policy.kdf) {
            Ok(()) => {
                if self.lock_state != LockState::default() {
                    self.lock_state = LockState::default();
                    self.lock_file.store(&self.lock_state)?;
                }
                self.touch_activity();
                Ok(())
            }
            Err(e) => Err(self.register_failure(e)?),
        }
    }

    /// Wipe the vault from memory without saving.
    pub fn lock(&mut self) {
        self.store = None;
        if self.state != SessionState::LockedOut {
            self.state = SessionState::Locked;
        }
        debug!("session locked");
    }

    /// Flush unsaved changes, then lock.  If the flush fails the session
    /// stays unlocked so the caller can retry.
    pub fn quit(&mut self) -> Result<()> {
        if self.is_dirty() {
            self.save()?;
        }
        self.lock();
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dir", &self.file.dir())
            .field("state", &self.state)
            .field("lock_state", &self.lock_state)
            .finish_non_exhaustive()
    }
}
