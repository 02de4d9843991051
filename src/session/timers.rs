//! Cancellable, re-armable timers that deliver events into the session
//! loop's channel.
//!
//! Each `Timer` stamps the events it sends with a generation number.
//! Re-arming or cancelling bumps the generation, so an event that was
//! already in flight when that happened is recognised as stale.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Everything the session loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One line of user input.
    Input(String),
    /// The input source reached end of file.
    InputClosed,
    IdleTimeout { generation: u64 },
    LockoutExpired { generation: u64 },
    ClipboardClear { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Idle,
    Lockout,
    ClipboardClear,
}

impl TimerKind {
    fn event(self, generation: u64) -> SessionEvent {
        match self {
            TimerKind::Idle => SessionEvent::IdleTimeout { generation },
            TimerKind::Lockout => SessionEvent::LockoutExpired { generation },
            TimerKind::ClipboardClear => SessionEvent::ClipboardClear { generation },
        }
    }
}

pub struct Timer {
    kind: TimerKind,
    tx: UnboundedSender<SessionEvent>,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(kind: TimerKind, tx: UnboundedSender<SessionEvent>) -> Self {
        Self {
            kind,
            tx,
            generation: 0,
            handle: None,
        }
    }

    /// (Re)start the timer; any earlier arming is cancelled.  Returns the
    /// generation the eventual event will carry.
    pub fn arm(&mut self, after: Duration) -> u64 {
        self.cancel();
        let generation = self.generation;
        let event = self.kind.event(generation);
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The loop may already be gone; nothing to do then.
            let _ = tx.send(event);
        }));
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Whether an event with `generation` came from the current arming.
    pub fn is_current(&self, generation: u64) -> bool {
        self.handle.is_some() && generation == self.generation
    }

    /// Mark the current arming as consumed.
    pub fn fired(&mut self) {
        self.handle = None;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .field("armed", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(TimerKind::Idle, tx);
        let generation = timer.arm(Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(rx.try_recv().is_err());

        let event = rx.recv().await.unwrap();
        assert_eq!(event, SessionEvent::IdleTimeout { generation });
        assert!(timer.is_current(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_makes_earlier_generation_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(TimerKind::ClipboardClear, tx);
        let first = timer.arm(Duration::from_secs(20));
        tokio::time::sleep(Duration::from_secs(10)).await;
        let second = timer.arm(Duration::from_secs(20));
        assert_ne!(first, second);
        assert!(!timer.is_current(first));

        match rx.recv().await.unwrap() {
            SessionEvent::ClipboardClear { generation } => assert_eq!(generation, second),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(TimerKind::Lockout, tx);
        let generation = timer.arm(Duration::from_secs(5));
        timer.cancel();
        assert!(!timer.is_current(generation));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }
}
