//! Two-tier escalation: fast model first, slow model on exhaustion.
//!
//! The slow tier restarts from the original context node, not the fast
//! tier's feedback-laden chain: escalation is a fresh attempt on a
//! stronger model, not a continuation. It happens at most once.

use tracing::{info, instrument};

use crate::backend::generate::{GenerateOptions, Generator};
use crate::core::budget::Budget;
use crate::core::context::{ContextTree, NodeId, Tier};
use crate::core::feedback::FeedbackMode;
use crate::core::policy::{FailurePolicy, choose_final};
use crate::core::requirement::{Requirement, ValidationResult};
use crate::result::{SamplingResult, StopReason};
use crate::sampling::{CancelToken, LoopConfig, SampleError, run_loop};

/// One tier's backend-facing knobs.
#[derive(Debug, Clone)]
pub struct TierConfig {
    pub budget: Budget,
    pub options: GenerateOptions,
}

impl TierConfig {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            options: GenerateOptions::default(),
        }
    }
}

/// Configuration for an escalating run.
#[derive(Debug, Clone)]
pub struct EscalationConfig {
    pub fast: TierConfig,
    pub slow: TierConfig,
    pub feedback: FeedbackMode,
    pub policy: FailurePolicy,
    pub escalate_on_failure: bool,
}

impl EscalationConfig {
    pub fn new(fast: TierConfig, slow: TierConfig) -> Self {
        Self {
            fast,
            slow,
            feedback: FeedbackMode::default(),
            policy: FailurePolicy::default(),
            escalate_on_failure: true,
        }
    }

    fn tier_loop(&self, tier: Tier) -> LoopConfig {
        let cfg = match tier {
            Tier::Fast => &self.fast,
            Tier::Slow => &self.slow,
        };
        LoopConfig {
            budget: cfg.budget,
            feedback: self.feedback,
            policy: self.policy,
            tier,
            options: cfg.options.clone(),
        }
    }
}

/// Run the fast tier, then (policy permitting) the slow tier.
///
/// The returned result concatenates fast-tier and slow-tier attempt
/// histories in chronological order, tier-tagged per attempt; success
/// reflects whichever tier succeeded.
#[instrument(skip_all, fields(
    fast_budget = config.fast.budget.limit(),
    slow_budget = config.slow.budget.limit(),
    escalate = config.escalate_on_failure,
))]
pub fn run_escalation<F: Generator, S: Generator>(
    fast: &F,
    slow: &S,
    tree: &ContextTree,
    start: NodeId,
    requirements: &[Requirement],
    config: &EscalationConfig,
    cancel: Option<&CancelToken>,
) -> Result<SamplingResult, SampleError> {
    let fast_result = run_loop(
        fast,
        tree,
        start,
        requirements,
        &config.tier_loop(Tier::Fast),
        cancel,
    )?;
    if fast_result.success
        || fast_result.stop == StopReason::Cancelled
        || !config.escalate_on_failure
    {
        return Ok(fast_result);
    }

    info!(
        fast_loops = fast_result.loops_consumed(Tier::Fast),
        "fast tier exhausted, escalating"
    );
    let slow_result = run_loop(
        slow,
        tree,
        start,
        requirements,
        &config.tier_loop(Tier::Slow),
        cancel,
    )?;

    let fast_count = fast_result.attempts.len();
    let mut attempts = fast_result.attempts;
    attempts.extend(slow_result.attempts);
    if slow_result.success {
        let chosen = slow_result.chosen.map(|idx| fast_count + idx);
        return Ok(SamplingResult {
            output: slow_result.output,
            success: true,
            stop: StopReason::Satisfied,
            attempts,
            chosen,
        });
    }

    // Both tiers failed: the failure policy picks across the combined
    // history.
    let chosen = if attempts.is_empty() {
        None
    } else {
        let sets: Vec<Vec<ValidationResult>> =
            attempts.iter().map(|a| a.validations.clone()).collect();
        Some(choose_final(config.policy, &sets))
    };
    let output = chosen
        .map(|idx| attempts[idx].output.clone())
        .unwrap_or_default();
    Ok(SamplingResult {
        output,
        success: false,
        stop: slow_result.stop,
        attempts,
        chosen,
    })
}
