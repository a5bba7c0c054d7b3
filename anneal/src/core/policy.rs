//! Which attempt to report when every loop failed.

use serde::{Deserialize, Serialize};

use crate::core::requirement::ValidationResult;

/// Policy for picking the reported output after budget exhaustion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the last attempt.
    #[default]
    LastAttempt,
    /// Report the attempt with the fewest failing requirements; ties go to
    /// the earliest such attempt.
    FewestFailures,
}

/// Index of the attempt to report, given per-attempt validation sets.
///
/// `validations` must be non-empty.
pub fn choose_final(policy: FailurePolicy, validations: &[Vec<ValidationResult>]) -> usize {
    debug_assert!(!validations.is_empty());
    match policy {
        FailurePolicy::LastAttempt => validations.len() - 1,
        FailurePolicy::FewestFailures => validations
            .iter()
            .enumerate()
            .min_by_key(|(_, set)| set.iter().filter(|v| !v.passed).count())
            .map(|(idx, _)| idx)
            .unwrap_or(validations.len() - 1),
    }
}
