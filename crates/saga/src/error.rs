//! Saga engine error types.

use std::time::Duration;

use thiserror::Error;

/// Ways the coordinator itself can stop a saga.
///
/// Step error types implement `From<SagaAbort>` so an interruption surfaces
/// as an ordinary step failure and triggers compensation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaAbort {
    /// The request context was cancelled while the step was running.
    #[error("Saga step '{step}' was cancelled")]
    Cancelled { step: &'static str },

    /// The step exceeded its timeout or the request deadline.
    #[error("Saga step '{step}' timed out after {after:?}")]
    TimedOut { step: &'static str, after: Duration },

    /// The step needs the previous step's output but none was produced.
    #[error("Saga step '{step}' is missing the previous step's output")]
    MissingInput { step: &'static str },

    /// The coordinator was executed without any steps.
    #[error("Saga has no steps")]
    NoSteps,
}

impl SagaAbort {
    /// Returns the step the abort happened in, if any.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            SagaAbort::Cancelled { step }
            | SagaAbort::TimedOut { step, .. }
            | SagaAbort::MissingInput { step } => Some(step),
            SagaAbort::NoSteps => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SagaAbort::TimedOut { .. })
    }

    /// Returns true if the step was interrupted while in flight.
    pub fn is_interruption(&self) -> bool {
        matches!(self, SagaAbort::Cancelled { .. } | SagaAbort::TimedOut { .. })
    }
}
