//! Saga coordinator for orchestrating multi-step sagas.

use std::time::{Duration, Instant};

use crate::config::SagaConfig;
use crate::context::RequestContext;
use crate::error::SagaAbort;
use crate::journal::{SagaEvent, SagaJournal};
use crate::step::SagaStep;

/// The result of one saga run together with its journal.
#[derive(Debug)]
pub struct SagaOutcome<T, E> {
    /// Output of the final step, or the error that stopped the saga.
    pub result: Result<T, E>,
    pub journal: SagaJournal,
}

impl<T, E> SagaOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Runs an ordered list of steps with reverse compensation on failure.
///
/// Steps execute strictly in the order they were added. The first failure
/// stops the run; every step that completed is then compensated exactly
/// once, newest first, and the failure that stopped the run is returned.
/// Compensation errors are logged and journaled but never returned.
pub struct SagaCoordinator<T, E> {
    saga_type: &'static str,
    config: SagaConfig,
    steps: Vec<Box<dyn SagaStep<T, E>>>,
}

impl<T, E> SagaCoordinator<T, E>
where
    T: Send + Sync + 'static,
    E: std::fmt::Display + From<SagaAbort> + Send + 'static,
{
    /// Creates a coordinator with no steps.
    pub fn new(saga_type: &'static str, config: SagaConfig) -> Self {
        Self {
            saga_type,
            config,
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    pub fn with_step(mut self, step: impl SagaStep<T, E> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn saga_type(&self) -> &'static str {
        self.saga_type
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs the saga to completion or to full compensation.
    ///
    /// Consumes the coordinator: a saga instance runs once.
    #[tracing::instrument(skip_all, fields(saga_type = self.saga_type))]
    pub async fn execute(mut self, ctx: &RequestContext) -> SagaOutcome<T, E> {
        let saga_type = self.saga_type;
        metrics::counter!("saga_executions_total", "saga_type" => saga_type).increment(1);
        let saga_start = Instant::now();
        let mut journal = SagaJournal::new(saga_type);

        let mut output: Option<T> = None;
        let mut failure: Option<(usize, E)> = None;

        for (index, step) in self.steps.iter_mut().enumerate() {
            let name = step.name();
            tracing::info!(step = name, "saga step started");
            journal.record(SagaEvent::StepStarted {
                step: name.to_string(),
            });

            let (compensate_upto, err) =
                match run_step(step.as_mut(), output.as_ref(), ctx, self.config.step_timeout).await
                {
                    StepRun::Finished(Ok(value)) => {
                        tracing::info!(step = name, "saga step completed");
                        journal.record(SagaEvent::StepCompleted {
                            step: name.to_string(),
                        });
                        output = Some(value);
                        continue;
                    }
                    StepRun::Finished(Err(err)) => (index, err),
                    StepRun::NotStarted(abort) => (index, E::from(abort)),
                    // An interrupted step may have produced a side effect before
                    // it was dropped, so it is compensated along with the rest.
                    StepRun::Interrupted(abort) => (index + 1, E::from(abort)),
                };

            tracing::warn!(step = name, error = %err, "saga step failed");
            journal.record(SagaEvent::StepFailed {
                step: name.to_string(),
                error: err.to_string(),
            });
            failure = Some((compensate_upto, err));
            break;
        }

        let result = match (failure, output) {
            (None, Some(value)) => {
                journal.record(SagaEvent::SagaCompleted);
                metrics::counter!("saga_completed_total", "saga_type" => saga_type).increment(1);
                tracing::info!(
                    duration = saga_start.elapsed().as_secs_f64(),
                    "saga completed successfully"
                );
                Ok(value)
            }
            (Some((compensate_upto, err)), _) => {
                self.compensate(&mut journal, compensate_upto).await;
                Err(self.fail(&mut journal, err))
            }
            (None, None) => Err(self.fail(&mut journal, E::from(SagaAbort::NoSteps))),
        };

        metrics::histogram!("saga_duration_seconds", "saga_type" => saga_type)
            .record(saga_start.elapsed().as_secs_f64());

        SagaOutcome { result, journal }
    }

    /// Compensates `steps[..upto]` in reverse order.
    ///
    /// Request cancellation does not apply here; each compensation is only
    /// bounded by the configured compensation timeout.
    async fn compensate(&mut self, journal: &mut SagaJournal, upto: usize) {
        let saga_type = self.saga_type;
        let timeout = self.config.compensation_timeout;
        let failed_step = journal.failed_step().unwrap_or("unknown").to_string();
        journal.record(SagaEvent::CompensationStarted { failed_step });

        for step in self.steps[..upto].iter_mut().rev() {
            let name = step.name();
            metrics::counter!("saga_compensations_total", "saga_type" => saga_type, "step" => name)
                .increment(1);

            let error = match tokio::time::timeout(timeout, step.compensate()).await {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(_) => Some(format!("compensation timed out after {timeout:?}")),
            };

            match error {
                None => {
                    tracing::info!(step = name, "saga step compensated");
                    journal.record(SagaEvent::CompensationCompleted {
                        step: name.to_string(),
                    });
                }
                Some(error) => {
                    tracing::error!(step = name, %error, "saga compensation failed");
                    metrics::counter!(
                        "saga_compensation_failures_total",
                        "saga_type" => saga_type,
                        "step" => name
                    )
                    .increment(1);
                    journal.record(SagaEvent::CompensationFailed {
                        step: name.to_string(),
                        error,
                    });
                }
            }
        }
    }

    fn fail(&self, journal: &mut SagaJournal, err: E) -> E {
        let reason = err.to_string();
        tracing::warn!(reason = %reason, "saga failed");
        metrics::counter!("saga_failed_total", "saga_type" => self.saga_type).increment(1);
        journal.record(SagaEvent::SagaFailed { reason });
        err
    }
}

/// How a single step's `execute` ended.
enum StepRun<T, E> {
    /// The step ran to completion, successfully or not.
    Finished(Result<T, E>),
    /// The request was already cancelled; the step never ran.
    NotStarted(SagaAbort),
    /// The step was dropped mid-flight by cancellation or timeout.
    Interrupted(SagaAbort),
}

/// Runs one step's `execute`, racing it against cancellation and its time budget.
async fn run_step<T, E>(
    step: &mut dyn SagaStep<T, E>,
    previous: Option<&T>,
    ctx: &RequestContext,
    step_timeout: Duration,
) -> StepRun<T, E>
where
    T: Send + Sync,
    E: Send,
{
    let name = step.name();
    if ctx.is_cancelled() {
        return StepRun::NotStarted(SagaAbort::Cancelled { step: name });
    }

    let budget = ctx
        .remaining()
        .map_or(step_timeout, |left| left.min(step_timeout));

    tokio::select! {
        biased;
        _ = ctx.cancelled() => StepRun::Interrupted(SagaAbort::Cancelled { step: name }),
        outcome = tokio::time::timeout(budget, step.execute(previous)) => match outcome {
            Ok(result) => StepRun::Finished(result),
            Err(_) => StepRun::Interrupted(SagaAbort::TimedOut { step: name, after: budget }),
        },
    }
}
