//! Outcomes of deferred executions.
//!
//! Deferred calls (`delay`, the trailing edge of `throttle`) never return to
//! the code that scheduled them. Their results and failures are reported
//! through these types on an optional side channel.

use crate::application::ports::TimerError;
use std::any::Any;
use std::fmt;

/// Why a deferred execution produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredError {
    /// The callable panicked; carries the panic message when it was a string.
    Panicked(String),
    /// The scheduled task was dropped before it ran.
    Cancelled,
    /// The timer refused to schedule the task.
    Unscheduled(TimerError),
    /// The outcome was already taken from this channel.
    AlreadyReceived,
}

impl DeferredError {
    /// Build a `Panicked` error from a payload returned by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        DeferredError::Panicked(panic_message(payload.as_ref()))
    }
}

impl fmt::Display for DeferredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredError::Panicked(msg) => write!(f, "deferred call panicked: {}", msg),
            DeferredError::Cancelled => write!(f, "deferred call was cancelled before it ran"),
            DeferredError::Unscheduled(e) => write!(f, "deferred call was not scheduled: {}", e),
            DeferredError::AlreadyReceived => write!(f, "deferred outcome was already received"),
        }
    }
}

impl std::error::Error for DeferredError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeferredError::Unscheduled(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of one deferred execution.
pub type DeferredOutcome<R> = Result<R, DeferredError>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_from_static_str_panic() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(
            DeferredError::from_panic(payload),
            DeferredError::Panicked("static message".to_string())
        );
    }

    #[test]
    fn test_from_formatted_panic() {
        let code = 42;
        let payload = panic::catch_unwind(|| panic!("code {}", code)).unwrap_err();
        assert_eq!(
            DeferredError::from_panic(payload),
            DeferredError::Panicked("code 42".to_string())
        );
    }

    #[test]
    fn test_non_string_payload() {
        let payload = panic::catch_unwind(|| panic::panic_any(17_u8)).unwrap_err();
        assert_eq!(
            DeferredError::from_panic(payload),
            DeferredError::Panicked("non-string panic payload".to_string())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DeferredError::Cancelled.to_string(),
            "deferred call was cancelled before it ran"
        );
        assert_eq!(
            DeferredError::Unscheduled(TimerError::NoRuntime).to_string(),
            "deferred call was not scheduled: no async runtime available to schedule on"
        );
    }
}
