//! Saga execution journal.
//!
//! Every coordinator run records what happened, step by step, into a
//! [`SagaJournal`]. The journal derives the saga's lifecycle state from the
//! recorded events, the same way an aggregate is rebuilt from its history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle state of a saga run.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,
    Running,
    /// A step failed; completed steps are being undone in reverse order.
    Compensating,
    Completed,
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Something that happened during a saga run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    StepStarted { step: String },
    StepCompleted { step: String },
    StepFailed { step: String, error: String },
    /// Reverse compensation began after `failed_step` failed.
    CompensationStarted { failed_step: String },
    CompensationCompleted { step: String },
    /// A compensation failed; the remaining compensations still ran.
    CompensationFailed { step: String, error: String },
    SagaCompleted,
    SagaFailed { reason: String },
}

impl SagaEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::StepStarted { .. } => "StepStarted",
            SagaEvent::StepCompleted { .. } => "StepCompleted",
            SagaEvent::StepFailed { .. } => "StepFailed",
            SagaEvent::CompensationStarted { .. } => "CompensationStarted",
            SagaEvent::CompensationCompleted { .. } => "CompensationCompleted",
            SagaEvent::CompensationFailed { .. } => "CompensationFailed",
            SagaEvent::SagaCompleted => "SagaCompleted",
            SagaEvent::SagaFailed { .. } => "SagaFailed",
        }
    }
}

/// A timestamped journal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub recorded_at: DateTime<Utc>,
    pub event: SagaEvent,
}

/// A compensation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationFailure {
    pub step: String,
    pub error: String,
}

/// Ordered record of one saga run and the state derived from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaJournal {
    saga_type: String,
    entries: Vec<JournalEntry>,
    state: SagaState,
    completed_steps: Vec<String>,
    compensated_steps: Vec<String>,
    compensation_failures: Vec<CompensationFailure>,
    failed_step: Option<String>,
    failure_reason: Option<String>,
}

impl SagaJournal {
    pub fn new(saga_type: impl Into<String>) -> Self {
        Self {
            saga_type: saga_type.into(),
            ..Self::default()
        }
    }

    /// Rebuilds a journal from previously recorded entries.
    pub fn replay(saga_type: impl Into<String>, entries: impl IntoIterator<Item = JournalEntry>) -> Self {
        let mut journal = Self::new(saga_type);
        for entry in entries {
            journal.apply(&entry.event);
            journal.entries.push(entry);
        }
        journal
    }

    /// Appends an event stamped with the current time.
    pub fn record(&mut self, event: SagaEvent) {
        self.apply(&event);
        self.entries.push(JournalEntry {
            recorded_at: Utc::now(),
            event,
        });
    }

    fn apply(&mut self, event: &SagaEvent) {
        match event {
            SagaEvent::StepStarted { .. } => {
                if self.state == SagaState::NotStarted {
                    self.state = SagaState::Running;
                }
            }
            SagaEvent::StepCompleted { step } => {
                self.completed_steps.push(step.clone());
            }
            SagaEvent::StepFailed { step, error } => {
                self.failed_step = Some(step.clone());
                self.failure_reason = Some(error.clone());
            }
            SagaEvent::CompensationStarted { .. } => {
                self.state = SagaState::Compensating;
            }
            SagaEvent::CompensationCompleted { step } => {
                self.compensated_steps.push(step.clone());
            }
            SagaEvent::CompensationFailed { step, error } => {
                self.compensation_failures.push(CompensationFailure {
                    step: step.clone(),
                    error: error.clone(),
                });
            }
            SagaEvent::SagaCompleted => {
                self.state = SagaState::Completed;
            }
            SagaEvent::SagaFailed { reason } => {
                self.state = SagaState::Failed;
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(reason.clone());
                }
            }
        }
    }
}

// Query methods
impl SagaJournal {
    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn events(&self) -> impl Iterator<Item = &SagaEvent> {
        self.entries.iter().map(|entry| &entry.event)
    }

    /// Steps whose `execute` succeeded, in execution order.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Steps whose `compensate` succeeded, in compensation order.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        &self.compensation_failures
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Wall time between the first and last recorded event.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        let first = self.entries.first()?;
        let last = self.entries.last()?;
        Some(last.recorded_at - first.recorded_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_run() -> SagaJournal {
        let mut journal = SagaJournal::new("OrderCreation");
        journal.record(SagaEvent::StepStarted { step: "a".into() });
        journal.record(SagaEvent::StepCompleted { step: "a".into() });
        journal.record(SagaEvent::StepStarted { step: "b".into() });
        journal.record(SagaEvent::StepCompleted { step: "b".into() });
        journal.record(SagaEvent::StepStarted { step: "c".into() });
        journal.record(SagaEvent::StepFailed {
            step: "c".into(),
            error: "boom".into(),
        });
        journal.record(SagaEvent::CompensationStarted {
            failed_step: "c".into(),
        });
        journal.record(SagaEvent::CompensationFailed {
            step: "b".into(),
            error: "still boom".into(),
        });
        journal.record(SagaEvent::CompensationCompleted { step: "a".into() });
        journal.record(SagaEvent::SagaFailed {
            reason: "boom".into(),
        });
        journal
    }

    #[test]
    fn test_new_journal_is_not_started() {
        let journal = SagaJournal::new("OrderCreation");
        assert_eq!(journal.state(), SagaState::NotStarted);
        assert!(journal.entries().is_empty());
        assert!(journal.elapsed().is_none());
    }

    #[test]
    fn test_successful_run_state() {
        let mut journal = SagaJournal::new("OrderCreation");
        journal.record(SagaEvent::StepStarted { step: "a".into() });
        assert_eq!(journal.state(), SagaState::Running);
        journal.record(SagaEvent::StepCompleted { step: "a".into() });
        journal.record(SagaEvent::SagaCompleted);

        assert_eq!(journal.state(), SagaState::Completed);
        assert!(journal.state().is_terminal());
        assert_eq!(journal.completed_steps(), &["a"]);
        assert!(journal.failed_step().is_none());
    }

    #[test]
    fn test_failed_run_tracks_compensation() {
        let journal = failed_run();

        assert_eq!(journal.state(), SagaState::Failed);
        assert_eq!(journal.completed_steps(), &["a", "b"]);
        assert_eq!(journal.failed_step(), Some("c"));
        assert_eq!(journal.failure_reason(), Some("boom"));
        assert_eq!(journal.compensated_steps(), &["a"]);
        assert_eq!(
            journal.compensation_failures(),
            &[CompensationFailure {
                step: "b".into(),
                error: "still boom".into(),
            }]
        );
    }

    #[test]
    fn test_replay_from_json_restores_state() {
        let journal = failed_run();
        let json = serde_json::to_string(journal.entries()).unwrap();
        let entries: Vec<JournalEntry> = serde_json::from_str(&json).unwrap();

        let replayed = SagaJournal::replay("OrderCreation", entries);
        assert_eq!(replayed.state(), SagaState::Failed);
        assert_eq!(replayed.completed_steps(), journal.completed_steps());
        assert_eq!(replayed.entries(), journal.entries());
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = SagaEvent::StepFailed {
            step: "persist_order".into(),
            error: "db down".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StepFailed");
        assert_eq!(json["data"]["step"], "persist_order");
        assert_eq!(event.event_type(), "StepFailed");
    }
}
