//! The structured record a strategy run returns.

use serde::{Deserialize, Serialize};

use crate::core::context::{NodeId, Tier};
use crate::core::requirement::ValidationResult;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every requirement passed.
    Satisfied,
    /// The loop budget ran out without success. A normal outcome, never
    /// an error.
    Exhausted,
    /// The caller cancelled between iterations.
    Cancelled,
}

/// One completed loop iteration: the attempt, where it lives in the
/// provenance tree, and one validation result per declared requirement in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub output: String,
    pub node: NodeId,
    pub tier: Tier,
    pub validations: Vec<ValidationResult>,
}

impl AttemptRecord {
    pub fn all_passed(&self) -> bool {
        self.validations.iter().all(|v| v.passed)
    }

    pub fn failure_count(&self) -> usize {
        self.validations.iter().filter(|v| !v.passed).count()
    }
}

/// Full outcome of a sampling run, successful or not.
///
/// `attempts` holds the complete per-attempt history in chronological
/// order; for escalated runs, fast-tier records precede slow-tier records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingResult {
    /// The chosen output: the passing attempt on success, otherwise the
    /// attempt picked by the configured failure policy. Empty when the
    /// run was cancelled before any attempt completed.
    pub output: String,
    pub success: bool,
    pub stop: StopReason,
    pub attempts: Vec<AttemptRecord>,
    /// Index into `attempts` of the attempt `output` came from. `None`
    /// only when no attempt completed.
    pub chosen: Option<usize>,
}

impl SamplingResult {
    /// The attempt record `output` came from, if any attempt completed.
    pub fn chosen_attempt(&self) -> Option<&AttemptRecord> {
        self.chosen.map(|idx| &self.attempts[idx])
    }

    /// Loops consumed on one tier.
    pub fn loops_consumed(&self, tier: Tier) -> u32 {
        self.attempts.iter().filter(|a| a.tier == tier).count() as u32
    }

    /// Generations in chronological order.
    pub fn generations(&self) -> impl Iterator<Item = &str> {
        self.attempts.iter().map(|a| a.output.as_str())
    }

    /// Context node per attempt, index-aligned with [`Self::generations`].
    pub fn contexts(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.attempts.iter().map(|a| a.node)
    }

    /// Validation sets per attempt, index-aligned with
    /// [`Self::generations`].
    pub fn validations(&self) -> impl Iterator<Item = &[ValidationResult]> {
        self.attempts.iter().map(|a| a.validations.as_slice())
    }
}
