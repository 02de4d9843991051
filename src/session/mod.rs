//! Session management: the lock/unlock state machine, its timers, and
//! the interactive event loop.
//!
//! This module provides:
//! - Wall-clock and monotonic time sources (`clock`)
//! - The persisted failed-attempt counter (`lockstate`)
//! - The `Session` state machine (`state`)
//! - Generation-stamped timers delivering `SessionEvent`s (`timers`)
//! - Clipboard access with auto-clear (`clipboard`)
//! - The `SessionLoop` that owns an unlocked session (`event_loop`)

pub mod clipboard;
pub mod clock;
pub mod event_loop;
pub mod lockstate;
pub mod state;
pub mod timers;

pub use clipboard::{Clipboard, ClipboardGuard, MemoryClipboard, SystemClipboard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event_loop::{LoopExit, SessionLoop};
pub use lockstate::{LockState, LockStateFile};
pub use state::{LockoutStatus, Session, SessionPolicy, SessionState, LOCKOUT, MAX_ATTEMPTS};
pub use timers::{SessionEvent, Timer, TimerKind};
