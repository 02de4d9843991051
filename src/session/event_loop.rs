//! The interactive session loop.
//!
//! The loop is the single owner of the unlocked session.  User input and
//! the idle, lockout and clipboard timers all arrive as `SessionEvent`s
//! on one channel and are handled strictly one at a time.

use std::io::Write;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use zeroize::Zeroizing;

use super::clipboard::ClipboardGuard;
use super::state::{Session, SessionState};
use super::timers::{SessionEvent, Timer, TimerKind};
use crate::errors::{LockboxError, Result};
use crate::vault::generator::{generate_password, DEFAULT_LENGTH};
use crate::vault::Credential;

/// Why `SessionLoop::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The user quit (or input ended); pending changes were saved.
    Quit,
    /// The idle timeout locked the session; unsaved changes were dropped.
    IdleLocked,
}

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
commands:
  list                          list services
  show <service>                show usernames and metadata
  copy <service> [n]            copy a password to the clipboard
  add <service> <user> [len]    add a credential with a generated password
  regen <service> [n]           replace a password with a generated one
  rm <service> [n]              remove a credential
  notes                         list note titles
  note <title>                  print a note
  save                          save now
  status                        show revision and pending changes
  quit                          save pending changes and exit";

pub struct SessionLoop<W: Write> {
    session: Session,
    clipboard: ClipboardGuard,
    out: W,
    tx: UnboundedSender<SessionEvent>,
    rx: UnboundedReceiver<SessionEvent>,
    idle: Timer,
    lockout: Timer,
    clipboard_timer: Timer,
}

impl<W: Write> SessionLoop<W> {
    /// Must be called from within a tokio runtime (timers spawn tasks).
    pub fn new(session: Session, clipboard: ClipboardGuard, out: W) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            idle: Timer::new(TimerKind::Idle, tx.clone()),
            lockout: Timer::new(TimerKind::Lockout, tx.clone()),
            clipboard_timer: Timer::new(TimerKind::ClipboardClear, tx.clone()),
            session,
            clipboard,
            out,
            tx,
            rx,
        }
    }

    /// Sender for feeding `Input` / `InputClosed` events into the loop.
    pub fn sender(&self) -> UnboundedSender<SessionEvent> {
        self.tx.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Prompt for passphrases until the session unlocks.
    ///
    /// During a lockout no prompt is shown; the loop waits for the
    /// lockout timer instead.  Errors from `prompt` (e.g. the user
    /// cancelling) and non-authentication failures end the attempt loop.
    pub async fn unlock<F>(&mut self, mut prompt: F) -> Result<()>
    where
        F: FnMut() -> Result<Zeroizing<String>>,
    {
        loop {
            let status = self.session.lockout_status();
            if status.locked {
                writeln!(
                    self.out,
                    "Too many failed attempts. Try again in {} seconds.",
                    status.remaining_seconds
                )?;
                self.wait_for_lockout(status.remaining_seconds).await;
                continue;
            }

            let passphrase = prompt()?;
            match self.session.unlock(passphrase.as_bytes()) {
                Ok(()) => {
                    self.idle.arm(self.session.policy().idle_timeout);
                    return Ok(());
                }
                Err(e) if e.counts_as_failed_attempt() || matches!(e, LockboxError::LockedOut(_)) => {
                    writeln!(self.out, "{e}")?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn wait_for_lockout(&mut self, seconds: u64) {
        let generation = self
            .lockout
            .arm(std::time::Duration::from_secs(seconds));
        while let Some(event) = self.rx.recv().await {
            match event {
                SessionEvent::LockoutExpired { generation: g } if g == generation => {
                    self.lockout.fired();
                    return;
                }
                other => debug!(?other, "event ignored while locked out"),
            }
        }
    }

    /// Process events until the user quits or the session idles out.
    pub async fn run(&mut self) -> Result<LoopExit> {
        if self.session.state() != SessionState::Unlocked {
            return Err(LockboxError::NotUnlocked);
        }

        while let Some(event) = self.rx.recv().await {
            match event {
                SessionEvent::Input(line) => {
                    self.session.touch_activity();
                    self.idle.arm(self.session.policy().idle_timeout);
                    match self.handle_command(line.trim()) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Quit) => return self.quit(),
                        Err(e) => writeln!(self.out, "error: {e}")?,
                    }
                }
                SessionEvent::InputClosed => return self.quit(),
                SessionEvent::IdleTimeout { generation } if self.idle.is_current(generation) => {
                    self.idle.fired();
                    if self.session.check_idle() {
                        self.clear_clipboard_now();
                        writeln!(self.out, "Locked after inactivity.")?;
                        return Ok(LoopExit::IdleLocked);
                    }
                    if let Some(remaining) = self.session.idle_remaining() {
                        self.idle.arm(remaining);
                    }
                }
                SessionEvent::ClipboardClear { generation }
                    if self.clipboard_timer.is_current(generation) =>
                {
                    self.clipboard_timer.fired();
                    if let Err(e) = self.clipboard.clear_if_unchanged() {
                        writeln!(self.out, "error: {e}")?;
                    }
                }
                stale => debug!(?stale, "ignoring stale timer event"),
            }
        }
        self.quit()
    }

    fn quit(&mut self) -> Result<LoopExit> {
        self.session.quit()?;
        self.clear_clipboard_now();
        self.idle.cancel();
        Ok(LoopExit::Quit)
    }

    fn clear_clipboard_now(&mut self) {
        self.clipboard_timer.cancel();
        if !self.clipboard.is_pending() {
            return;
        }
        if let Err(e) = self.clipboard.clear_if_unchanged() {
            debug!(error = %e, "could not clear clipboard");
        }
    }

    fn handle_command(&mut self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = words.collect();

        match (command, args.as_slice()) {
            ("help", _) => writeln!(self.out, "{HELP}")?,
            ("list", []) => {
                let vault = self.session.vault()?;
                for service in vault.services() {
                    let count = vault.credentials(service)?.len();
                    writeln!(self.out, "{service} ({count})")?;
                }
            }
            ("show", [service]) => {
                for (i, credential) in self.session.vault()?.credentials(service)?.iter().enumerate() {
                    match &credential.metadata {
                        Some(meta) => writeln!(self.out, "{}. {} ({meta})", i + 1, credential.username)?,
                        None => writeln!(self.out, "{}. {}", i + 1, credential.username)?,
                    }
                }
            }
            ("copy", [service, rest @ ..]) => {
                let index = parse_index(rest.first().copied())?;
                let password = Zeroizing::new(
                    self.session.vault()?.credential(service, index)?.password.clone(),
                );
                self.clipboard.copy(&password)?;
                let after = self.session.policy().clipboard_clear;
                self.clipboard_timer.arm(after);
                writeln!(self.out, "Copied. Clipboard clears in {} seconds.", after.as_secs())?;
            }
            ("add", [service, username, rest @ ..]) => {
                let length = match rest.first() {
                    Some(n) => n.parse().map_err(|_| {
                        LockboxError::CommandFailed(format!("invalid length '{n}'"))
                    })?,
                    None => DEFAULT_LENGTH,
                };
                let password = generate_password(length);
                self.session
                    .vault_mut()?
                    .add_credential(Credential::new(service, username, &password))?;
                self.clipboard.copy(&password)?;
                self.clipboard_timer.arm(self.session.policy().clipboard_clear);
                writeln!(self.out, "Added {username} @ {service}; password copied.")?;
            }
            ("regen", [service, rest @ ..]) => {
                let index = parse_index(rest.first().copied())?;
                let password = generate_password(DEFAULT_LENGTH);
                let vault = self.session.vault_mut()?;
                vault.set_password(service, index, &password)?;
                let username = vault.credential(service, index)?.username.clone();
                self.clipboard.copy(&password)?;
                self.clipboard_timer.arm(self.session.policy().clipboard_clear);
                writeln!(self.out, "New password for {username} @ {service} copied.")?;
            }
            ("rm", [service, rest @ ..]) => {
                let index = parse_index(rest.first().copied())?;
                let removed = self.session.vault_mut()?.remove_credential(service, index)?;
                writeln!(self.out, "Removed {} @ {service}.", removed.username)?;
            }
            ("notes", []) => {
                for note in self.session.vault()?.notes() {
                    writeln!(self.out, "{}", note.title)?;
                }
            }
            ("note", [_, ..]) => {
                let title = args.join(" ");
                let content = Zeroizing::new(self.session.vault()?.note(&title)?.content.clone());
                writeln!(self.out, "{}", content.as_str())?;
            }
            ("save", []) => {
                let revision = self.session.save()?;
                writeln!(self.out, "Saved (revision {revision}).")?;
            }
            ("status", []) => {
                let revision = self.session.revision().unwrap_or(0);
                let pending = if self.session.is_dirty() { ", unsaved changes" } else { "" };
                writeln!(self.out, "Unlocked at revision {revision}{pending}.")?;
            }
            ("quit" | "exit", []) => return Ok(Flow::Quit),
            _ => writeln!(self.out, "unknown command '{line}' (try 'help')")?,
        }
        Ok(Flow::Continue)
    }
}

/// Parse a 1-based credential number; absent means the first one.
fn parse_index(arg: Option<&str>) -> Result<usize> {
    match arg {
        None => Ok(0),
        Some(n) => match n.parse::<usize>() {
            Ok(i) if i >= 1 => Ok(i - 1),
            _ => Err(LockboxError::CommandFailed(format!(
                "invalid credential number '{n}'"
            ))),
        },
    }
}
