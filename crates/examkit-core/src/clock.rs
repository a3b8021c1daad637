//! Session countdown clock.
//!
//! The clock itself does not own a timer; the session driver calls
//! [`SessionClock::tick`] once per second. Keeping the countdown a plain value
//! lets the state machine own it and makes expiry deterministic under test.

use std::fmt;

use tracing::{debug, info, warn};

/// Exam length in seconds for a question count: `ceil(count * 1.5)` minutes.
pub fn exam_duration_secs(question_count: usize) -> u64 {
    let minutes = (question_count as u64 * 3).div_ceil(2);
    minutes * 60
}

/// Invoked once when the countdown reaches zero.
pub type ExpiryCallback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockState {
    Idle,
    Running,
    Stopped,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// The clock is not running; nothing changed.
    Idle,
    /// One second elapsed.
    Running { remaining: u64 },
    /// This tick reached zero and fired the expiry callback.
    Expired,
}

/// Second-granularity countdown with a one-shot expiry callback.
pub struct SessionClock {
    state: ClockState,
    remaining: u64,
    on_expired: Option<ExpiryCallback>,
}

impl fmt::Debug for SessionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClock")
            .field("state", &self.state)
            .field("remaining", &self.remaining)
            .field("callback_armed", &self.on_expired.is_some())
            .finish()
    }
}

impl SessionClock {
    pub fn new(on_expired: impl FnOnce() + Send + 'static) -> Self {
        Self {
            state: ClockState::Idle,
            remaining: 0,
            on_expired: Some(Box::new(on_expired)),
        }
    }

    /// Set the countdown and begin ticking.
    ///
    /// A clock starts at most once; the countdown is never reset. Returns
    /// `false` (and logs) if the clock was already started.
    pub fn start(&mut self, total_secs: u64) -> bool {
        if self.state != ClockState::Idle {
            warn!(state = ?self.state, "session clock already started, ignoring start");
            return false;
        }
        self.remaining = total_secs;
        self.state = ClockState::Running;
        info!(total_secs, "session clock started");
        true
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> ClockTick {
        if self.state != ClockState::Running {
            return ClockTick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            debug!(remaining = self.remaining, "tick");
            return ClockTick::Running {
                remaining: self.remaining,
            };
        }

        self.state = ClockState::Stopped;
        info!("session clock reached zero");
        if let Some(callback) = self.on_expired.take() {
            callback();
        }
        ClockTick::Expired
    }

    /// Halt ticking. Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.state == ClockState::Running {
            debug!(remaining = self.remaining, "session clock stopped");
        }
        self.state = ClockState::Stopped;
        // A stopped clock can never expire, so drop the callback with it.
        self.on_expired = None;
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// True once the countdown has reached zero.
    pub fn has_expired(&self) -> bool {
        self.state != ClockState::Idle && self.remaining == 0
    }
}
