//! Run orchestration: load the order, plan it, replay the steps.
//!
//! A failed step is retried in place until it succeeds or the retry policy
//! gives up. Nothing else is retried: a missing order or a failed plan ends
//! the run before any input is injected.

use crate::codegen::CodeGenerator;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::executor::ActionExecutor;
use crate::instruction::{preview, Instruction};
use crate::plan::{Action, Step, StepList};
use crate::planner::StepPlanner;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How a failing step is retried
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Wait before the first retry
    pub delay: Duration,
    /// Multiplier applied to the wait after every further failure (1.0 = fixed)
    pub backoff: f64,
    pub max_delay: Duration,
    /// Retries allowed per step after the first attempt; `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            backoff: 1.0,
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `failures`-th consecutive failure of a step
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.delay.as_secs_f64() * self.backoff.max(1.0).powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64().max(self.delay.as_secs_f64()));
        Duration::from_secs_f64(capped)
    }

    /// Whether a step that has failed `failures` times may not be retried again
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_retries.is_some_and(|max| failures > max)
    }
}

/// Where a run currently is; steps are numbered from 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loading,
    Planning,
    Executing(usize),
    Retrying(usize),
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Loading => f.write_str("loading"),
            RunState::Planning => f.write_str("planning"),
            RunState::Executing(i) => write!(f, "executing step {}", i + 1),
            RunState::Retrying(i) => write!(f, "retrying step {}", i + 1),
            RunState::Done => f.write_str("done"),
            RunState::Aborted => f.write_str("aborted"),
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Attempts each step needed, in step order
    pub attempts: Vec<u32>,
}

impl RunReport {
    pub fn steps(&self) -> usize {
        self.attempts.len()
    }

    pub fn retries(&self) -> u32 {
        self.attempts.iter().map(|a| a.saturating_sub(1)).sum()
    }
}

/// Drives one run from the instruction file to the last step
pub struct Orchestrator<P, G, E> {
    planner: P,
    generator: G,
    executor: E,
    config: RunConfig,
    state: RunState,
    code: Option<String>,
}

impl<P, G, E> Orchestrator<P, G, E>
where
    P: StepPlanner,
    G: CodeGenerator,
    E: ActionExecutor,
{
    pub fn new(planner: P, generator: G, executor: E, config: RunConfig) -> Self {
        Self {
            planner,
            generator,
            executor,
            config,
            state: RunState::Loading,
            code: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run to completion. Blocks for as long as steps keep failing unless
    /// the retry policy is bounded.
    pub fn run(&mut self) -> Result<RunReport> {
        self.enter(RunState::Loading);
        let instruction = match Instruction::load(&self.config.instruction_path) {
            Ok(instruction) => instruction,
            Err(e) => return self.abort(e),
        };
        info!(order = %instruction.preview(80), "Loaded order");

        self.enter(RunState::Planning);
        let planned = match self.planner.plan(&instruction, self.config.display) {
            Ok(steps) => steps,
            Err(e) => return self.abort(e),
        };
        // The persisted list is the one replayed
        let steps = match StepList::load(&self.config.steps_path) {
            Ok(steps) => steps,
            Err(e) => return self.abort(e),
        };
        if steps.len() != planned.len() {
            warn!(
                planned = planned.len(),
                persisted = steps.len(),
                "Step list on disk differs from the plan"
            );
        }
        info!(count = steps.len(), display = %self.config.display, "Executing steps");

        let mut attempts = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.config.step_delay);
            }
            attempts.push(self.run_step(i, step, &instruction)?);
        }

        self.enter(RunState::Done);
        let report = RunReport { attempts };
        info!(
            steps = report.steps(),
            retries = report.retries(),
            "All steps completed"
        );
        Ok(report)
    }

    fn run_step(&mut self, index: usize, step: &Step, instruction: &Instruction) -> Result<u32> {
        let mut failures = 0;
        loop {
            self.enter(RunState::Executing(index));
            info!(step = index + 1, template = %step.template, action = ?step.action, "Executing");

            let err = match self.attempt(step, instruction) {
                Ok(()) => return Ok(failures + 1),
                Err(e) => e,
            };
            failures += 1;

            if err.is_fatal() {
                return self.abort(err);
            }
            if self.config.retry.exhausted(failures) {
                error!(step = index + 1, template = %step.template, "Giving up: {}", err);
                return self.abort(Error::RetriesExhausted {
                    step: index + 1,
                    attempts: failures,
                });
            }

            let delay = self.config.retry.delay_for(failures);
            warn!(
                step = index + 1,
                template = %step.template,
                attempt = failures,
                "Step failed: {}. Retrying in {:?}",
                err,
                delay
            );
            self.enter(RunState::Retrying(index));
            thread::sleep(delay);
        }
    }

    fn attempt(&mut self, step: &Step, instruction: &Instruction) -> Result<()> {
        let text = match step.action {
            Action::PasteText => Some(self.code_for(instruction)?),
            Action::Click => None,
        };
        self.executor
            .execute(&step.template, step.action, text.as_deref())
    }

    fn code_for(&mut self, instruction: &Instruction) -> Result<String> {
        if let Some(code) = &self.code {
            debug!("Reusing generated code");
            return Ok(code.clone());
        }
        let code = self.generator.generate(instruction)?;
        info!(code = %preview(&code, 50), "Generated code");
        if self.config.cache_generated_code {
            self.code = Some(code.clone());
        }
        Ok(code)
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "State change");
        self.state = state;
    }

    fn abort<T>(&mut self, err: Error) -> Result<T> {
        error!("Run aborted while {}: {}", self.state, err);
        self.state = RunState::Aborted;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fixed_and_unbounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(50), Duration::from_secs(5));
        assert!(!policy.exhausted(u32::MAX));
    }

    #[test]
    fn backoff_grows_until_capped() {
        let policy = RetryPolicy {
            delay: Duration::from_secs(1),
            backoff: 2.0,
            max_delay: Duration::from_secs(10),
            max_retries: Some(3),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert!(!policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[test]
    fn states_read_one_based() {
        assert_eq!(RunState::Executing(0).to_string(), "executing step 1");
        assert_eq!(RunState::Retrying(2).to_string(), "retrying step 3");
    }

    #[test]
    fn report_counts_retries() {
        let report = RunReport {
            attempts: vec![1, 3, 1],
        };
        assert_eq!(report.steps(), 3);
        assert_eq!(report.retries(), 2);
    }
}
