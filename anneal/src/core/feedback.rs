//! Repair feedback rendered into the context after a failed attempt.

use serde::{Deserialize, Serialize};

use crate::core::requirement::{Requirement, ValidationResult};

/// How much failure detail the next generation sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackMode {
    /// Nothing appended beyond the failed attempt itself.
    None,
    /// Only the first failing requirement's reason.
    FirstError,
    /// Every failing requirement's reason.
    #[default]
    AllErrors,
}

/// Render the repair turn for a failed attempt, or `None` when the mode
/// (or the failure set) yields nothing to say.
///
/// `requirements` and `validations` are index-aligned in declaration
/// order. Check-only requirements never surface in feedback.
pub fn render_repair(
    mode: FeedbackMode,
    requirements: &[Requirement],
    validations: &[ValidationResult],
) -> Option<String> {
    debug_assert_eq!(requirements.len(), validations.len());
    if mode == FeedbackMode::None {
        return None;
    }

    let mut failing: Vec<&str> = requirements
        .iter()
        .zip(validations)
        .filter(|(req, val)| !val.passed && !req.check_only)
        .map(|(_, val)| val.reason.as_str())
        .collect();
    if failing.is_empty() {
        return None;
    }
    if mode == FeedbackMode::FirstError {
        failing.truncate(1);
    }

    let mut buf = String::from("The following requirements were not met:\n");
    for reason in failing {
        buf.push_str("* ");
        buf.push_str(reason);
        buf.push('\n');
    }
    buf.push_str("Please try again and satisfy every requirement.");
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{ContextTree, NodeId};

    fn result(requirement: &str, passed: bool, reason: &str, node: NodeId) -> ValidationResult {
        ValidationResult {
            requirement: requirement.to_string(),
            passed,
            reason: reason.to_string(),
            node,
        }
    }

    fn reqs_and_vals() -> (Vec<Requirement>, Vec<ValidationResult>) {
        let node = ContextTree::new().root();
        let requirements = vec![
            Requirement::predicate("a", "req a", |_| Ok(true)),
            Requirement::predicate("b", "req b", |_| Ok(false)),
            Requirement::predicate("c", "req c", |_| Ok(false)),
        ];
        let validations = vec![
            result("a", true, "fine", node),
            result("b", false, "b went wrong", node),
            result("c", false, "c went wrong", node),
        ];
        (requirements, validations)
    }

    #[test]
    fn none_mode_renders_nothing() {
        let (reqs, vals) = reqs_and_vals();
        assert!(render_repair(FeedbackMode::None, &reqs, &vals).is_none());
    }

    #[test]
    fn first_error_carries_only_the_first_failure() {
        let (reqs, vals) = reqs_and_vals();
        let text = render_repair(FeedbackMode::FirstError, &reqs, &vals).expect("repair");
        assert!(text.contains("b went wrong"));
        assert!(!text.contains("c went wrong"));
        assert!(!text.contains("fine"));
    }

    #[test]
    fn all_errors_carries_every_failure() {
        let (reqs, vals) = reqs_and_vals();
        let text = render_repair(FeedbackMode::AllErrors, &reqs, &vals).expect("repair");
        assert!(text.contains("b went wrong"));
        assert!(text.contains("c went wrong"));
    }

    #[test]
    fn check_only_failures_stay_out_of_feedback() {
        let node = ContextTree::new().root();
        let requirements = vec![Requirement::predicate("h", "hidden", |_| Ok(false)).check()];
        let validations = vec![result("h", false, "hidden broke", node)];
        assert!(render_repair(FeedbackMode::AllErrors, &requirements, &validations).is_none());
    }

    #[test]
    fn all_passing_renders_nothing() {
        let node = ContextTree::new().root();
        let requirements = vec![Requirement::predicate("a", "req a", |_| Ok(true))];
        let validations = vec![result("a", true, "fine", node)];
        assert!(render_repair(FeedbackMode::AllErrors, &requirements, &validations).is_none());
    }
}
