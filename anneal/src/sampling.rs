//! Single-tier generate/validate/feedback/retry loop.
//!
//! State machine: INIT → GENERATE → VALIDATE → {SUCCESS | FEEDBACK →
//! GENERATE | EXHAUSTED}. Every attempt and every validation outcome is
//! appended to the context tree, so the returned result carries full
//! provenance.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument};

use crate::backend::generate::{GenerateError, GenerateOptions, Generator};
use crate::backend::judge::judge;
use crate::core::budget::Budget;
use crate::core::context::{ContextTree, InvalidParentError, NodeId, Payload, Role, Tier};
use crate::core::feedback::{FeedbackMode, render_repair};
use crate::core::policy::{FailurePolicy, choose_final};
use crate::core::requirement::{Requirement, ValidationResult};
use crate::core::transcript::Transcript;
use crate::result::{AttemptRecord, SamplingResult, StopReason};

/// Why a single-tier run failed with an error (as opposed to returning an
/// unsuccessful result).
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Transport/model fault. Terminal and never retried; retrying a
    /// transport failure is a different concern than retrying an unmet
    /// requirement.
    #[error(transparent)]
    Generation(#[from] GenerateError),
    /// Tree misuse. Programming error, always propagated.
    #[error(transparent)]
    InvalidParent(#[from] InvalidParentError),
}

/// Cooperative cancellation flag, checked between iterations only.
/// Generate and validate calls are atomic black-box operations and are
/// never interrupted mid-call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Configuration for one tier's loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub budget: Budget,
    pub feedback: FeedbackMode,
    pub policy: FailurePolicy,
    pub tier: Tier,
    pub options: GenerateOptions,
}

impl LoopConfig {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            feedback: FeedbackMode::default(),
            policy: FailurePolicy::default(),
            tier: Tier::default(),
            options: GenerateOptions::default(),
        }
    }
}

/// Evaluate every declared requirement against one attempt, in
/// declaration order, appending one validation node per requirement.
///
/// All requirements are checked even after an early failure: repair
/// feedback needs the full picture. Judged requirements call the
/// generator; faults on that path are absorbed, never propagated.
pub fn validate_requirements<G: Generator>(
    generator: &G,
    tree: &ContextTree,
    attempt_node: NodeId,
    output: &str,
    requirements: &[Requirement],
    options: &GenerateOptions,
) -> Result<Vec<ValidationResult>, InvalidParentError> {
    let mut results = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let verdict = match requirement.check_local(output) {
            Some(verdict) => verdict,
            None => judge(generator, requirement, output, options),
        };
        tree.append(
            attempt_node,
            Payload::Validation {
                requirement: requirement.id.clone(),
                passed: verdict.passed,
                reason: verdict.reason.clone(),
            },
        )?;
        results.push(ValidationResult {
            requirement: requirement.id.clone(),
            passed: verdict.passed,
            reason: verdict.reason,
            node: attempt_node,
        });
    }
    Ok(results)
}

/// Run the base sampling loop on one tier, starting from `start`.
///
/// Returns a result for every normal termination (success, exhaustion,
/// cancellation); errs only on a generation fault or tree misuse. A
/// faulted generation does not count against the budget: "broken" is
/// kept distinct from "wrong".
#[instrument(skip_all, fields(tier = %config.tier, budget = config.budget.limit()))]
pub fn run_loop<G: Generator>(
    generator: &G,
    tree: &ContextTree,
    start: NodeId,
    requirements: &[Requirement],
    config: &LoopConfig,
    cancel: Option<&CancelToken>,
) -> Result<SamplingResult, SampleError> {
    let mut budget = config.budget;
    let mut head = start;
    let mut attempts: Vec<AttemptRecord> = Vec::new();

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!(completed = attempts.len(), "run cancelled between iterations");
            return Ok(finish(attempts, config.policy, StopReason::Cancelled));
        }

        info!(
            "loop {} of {}",
            budget.consumed() + 1,
            budget.limit()
        );

        let transcript = Transcript::from_lineage(&tree.lineage(head)?);
        let output = generator.generate(&transcript, &config.options)?;
        let attempt_node = tree.append(
            head,
            Payload::Attempt {
                output: output.clone(),
                tier: config.tier,
            },
        )?;

        let validations = validate_requirements(
            generator,
            tree,
            attempt_node,
            &output,
            requirements,
            &config.options,
        )?;
        let record = AttemptRecord {
            output,
            node: attempt_node,
            tier: config.tier,
            validations,
        };

        if record.all_passed() {
            info!("all requirements satisfied");
            let output = record.output.clone();
            attempts.push(record);
            let chosen = Some(attempts.len() - 1);
            return Ok(SamplingResult {
                output,
                success: true,
                stop: StopReason::Satisfied,
                attempts,
                chosen,
            });
        }

        info!(
            valid = record.validations.len() - record.failure_count(),
            total = record.validations.len(),
            "attempt failed validation"
        );
        attempts.push(record);

        if !budget.consume() {
            info!(consumed = budget.consumed(), "loop budget exhausted");
            return Ok(finish(attempts, config.policy, StopReason::Exhausted));
        }

        // Next generation descends from the failed attempt; with feedback
        // enabled, a synthetic repair turn goes in between.
        let last = attempts.last().expect("at least one attempt recorded");
        head = last.node;
        if let Some(repair) = render_repair(config.feedback, requirements, &last.validations) {
            head = tree.append(
                head,
                Payload::Turn {
                    role: Role::User,
                    content: repair,
                },
            )?;
        }
    }
}

fn finish(
    attempts: Vec<AttemptRecord>,
    policy: FailurePolicy,
    stop: StopReason,
) -> SamplingResult {
    let chosen = if attempts.is_empty() {
        None
    } else {
        let sets: Vec<Vec<ValidationResult>> =
            attempts.iter().map(|a| a.validations.clone()).collect();
        Some(choose_final(policy, &sets))
    };
    let output = chosen
        .map(|idx| attempts[idx].output.clone())
        .unwrap_or_default();
    SamplingResult {
        output,
        success: false,
        stop,
        attempts,
        chosen,
    }
}
