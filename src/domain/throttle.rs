//! Throttle state machine.
//!
//! Pure decision logic for coalescing bursts of calls into at most one
//! execution per window. The state never touches a clock or a timer itself:
//! callers pass in the current instant and act on the returned decision.

use crate::application::ports::TimerHandle;
use std::fmt;
use std::time::{Duration, Instant};

/// Error returned when throttle configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleConfigError {
    /// Window duration must be greater than zero
    ZeroWindow,
    /// No timer was supplied and no default timer is available
    MissingTimer,
}

impl fmt::Display for ThrottleConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleConfigError::ZeroWindow => {
                write!(f, "throttle window must be greater than 0")
            }
            ThrottleConfigError::MissingTimer => {
                write!(f, "no timer configured and the `async` feature is disabled")
            }
        }
    }
}

impl std::error::Error for ThrottleConfigError {}

/// When the trailing execution of a cooldown window fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrailingEdge {
    /// Fire when the current window closes; the fire time becomes the new
    /// trigger time.
    #[default]
    RemainingCooldown,
    /// Fire one full window after the call that scheduled it; the fire time
    /// becomes the new trigger time.
    FullWindow,
}

/// Configuration for a throttled callable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleConfig {
    /// Length of the cooldown window
    #[cfg_attr(feature = "serde", serde(with = "window_millis"))]
    pub window: Duration,
    /// Whether calls inside the window schedule a trailing execution
    pub trailing: bool,
    /// Timing of the trailing execution
    pub trailing_edge: TrailingEdge,
}

impl ThrottleConfig {
    /// Create a config with the given window and trailing execution enabled.
    ///
    /// # Errors
    /// Returns `ThrottleConfigError::ZeroWindow` if `window` is zero.
    pub fn new(window: Duration) -> Result<Self, ThrottleConfigError> {
        let config = Self {
            window,
            trailing: true,
            trailing_edge: TrailingEdge::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Enable or disable trailing executions.
    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    /// Choose when trailing executions fire.
    pub fn with_trailing_edge(mut self, edge: TrailingEdge) -> Self {
        self.trailing_edge = edge;
        self
    }

    /// Check the config, e.g. after deserializing it.
    pub fn validate(&self) -> Result<(), ThrottleConfigError> {
        if self.window.is_zero() {
            return Err(ThrottleConfigError::ZeroWindow);
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod window_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Coarse phase of a throttle, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlePhase {
    /// Never triggered
    Idle,
    /// Triggered at least once, no trailing execution pending
    Cooling,
    /// A trailing execution is scheduled
    CooldownPending,
}

/// What the caller must do with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Run the callable now. Any superseded trailing timer must be cancelled.
    Execute { superseded: Option<TimerHandle> },
    /// Schedule a trailing execution after `delay`, tagged with `generation`.
    /// Any superseded trailing timer must be cancelled.
    Defer {
        delay: Duration,
        generation: u64,
        superseded: Option<TimerHandle>,
    },
    /// Drop the call.
    Discard,
}

#[derive(Debug, Clone, Copy)]
struct PendingTrailing {
    generation: u64,
    handle: Option<TimerHandle>,
}

/// Per-wrapper throttle state.
///
/// At most one trailing execution is pending at any time. Scheduling a new
/// one supersedes the previous one, which is identified by its generation
/// so that a timer that fires after being superseded does nothing.
#[derive(Debug, Clone, Default)]
pub struct ThrottleState {
    last_trigger: Option<Instant>,
    pending: Option<PendingTrailing>,
    generation: u64,
}

impl ThrottleState {
    /// Create idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call at `now` and decide how to handle it.
    pub fn on_call(&mut self, now: Instant, config: &ThrottleConfig) -> ThrottleDecision {
        let cooldown_end = match self.last_trigger {
            Some(last) => last + config.window,
            None => return self.trigger(now),
        };
        if now >= cooldown_end {
            return self.trigger(now);
        }
        if !config.trailing {
            return ThrottleDecision::Discard;
        }

        let superseded = self.pending.take().and_then(|p| p.handle);
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(PendingTrailing {
            generation: self.generation,
            handle: None,
        });

        let delay = match config.trailing_edge {
            TrailingEdge::RemainingCooldown => cooldown_end.saturating_duration_since(now),
            TrailingEdge::FullWindow => config.window,
        };
        ThrottleDecision::Defer {
            delay,
            generation: self.generation,
            superseded,
        }
    }

    fn trigger(&mut self, now: Instant) -> ThrottleDecision {
        self.last_trigger = Some(now);
        // The new execution carries newer arguments than any pending trailing call.
        let superseded = self.pending.take().and_then(|p| p.handle);
        ThrottleDecision::Execute { superseded }
    }

    /// Record the timer handle for a scheduled trailing execution.
    ///
    /// Returns `false` if `generation` is no longer pending (already fired or
    /// superseded); the caller should cancel `handle`.
    pub fn attach(&mut self, generation: u64, handle: TimerHandle) -> bool {
        match self.pending.as_mut() {
            Some(p) if p.generation == generation => {
                p.handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    /// Drop a pending trailing execution that could not be scheduled.
    pub fn abandon(&mut self, generation: u64) {
        if self.is_current(generation) {
            self.pending = None;
        }
    }

    /// Claim the trailing execution for `generation` as it fires at `fire_time`.
    ///
    /// Returns `false` for a stale generation, in which case the callable must
    /// not run. The trigger time never moves backwards.
    pub fn begin_trailing(&mut self, generation: u64, fire_time: Instant) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.pending = None;
        self.last_trigger = Some(match self.last_trigger {
            Some(last) => last.max(fire_time),
            None => fire_time,
        });
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.pending.map(|p| p.generation) == Some(generation)
    }

    /// Current phase.
    pub fn phase(&self) -> ThrottlePhase {
        match (self.last_trigger, self.pending) {
            (_, Some(_)) => ThrottlePhase::CooldownPending,
            (Some(_), None) => ThrottlePhase::Cooling,
            (None, None) => ThrottlePhase::Idle,
        }
    }

    /// Time of the last execution, if any.
    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }
}
