//! The unit of work a saga is built from.

use async_trait::async_trait;

/// One forward action of a saga together with the action that undoes it.
///
/// A step owns exactly the state its compensation needs (for example the
/// identifier of the row it created) and nothing else. Output flows to the
/// next step through the coordinator, never through shared variables.
#[async_trait]
pub trait SagaStep<T, E>: Send
where
    T: Send + Sync,
    E: Send,
{
    /// Stable name used in logs, metrics and the journal.
    fn name(&self) -> &'static str;

    /// Runs the forward action.
    ///
    /// `previous` is the output of the step that ran immediately before
    /// this one, or `None` for the first step.
    async fn execute(&mut self, previous: Option<&T>) -> Result<T, E>;

    /// Undoes whatever `execute` did. Must be a no-op when `execute` never
    /// produced a side effect.
    async fn compensate(&mut self) -> Result<(), E>;
}
