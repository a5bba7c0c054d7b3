//! Loop-level tests for full sampling and escalation scenarios.
//!
//! These tests drive `run_loop` and `run_escalation` through multiple
//! iterations with scripted generators to verify end-to-end behavior:
//! budget accounting, repair feedback, provenance alignment, tier
//! escalation, and termination.

use anneal::checks;
use anneal::core::budget::Budget;
use anneal::core::context::{ContextTree, Payload, Tier};
use anneal::core::feedback::FeedbackMode;
use anneal::core::policy::FailurePolicy;
use anneal::escalation::{EscalationConfig, TierConfig, run_escalation};
use anneal::result::StopReason;
use anneal::sampling::{LoopConfig, run_loop};
use anneal::test_support::{ScriptedGenerator, always_fail, always_pass, passes_when_contains};

fn loop_config(limit: u32) -> LoopConfig {
    LoopConfig::new(Budget::new(limit).expect("budget"))
}

/// Budget N with an always-failing requirement: exactly N generate calls,
/// no success, stop reason Exhausted.
#[test]
fn exhausts_budget_with_exactly_n_generate_calls() {
    let generator = ScriptedGenerator::new(["a", "b", "c", "d"]);
    let tree = ContextTree::new();

    let result = run_loop(
        &generator,
        &tree,
        tree.root(),
        &[always_fail("never", "cannot be satisfied")],
        &loop_config(4),
        None,
    )
    .expect("run");

    assert!(!result.success);
    assert_eq!(result.stop, StopReason::Exhausted);
    assert_eq!(generator.calls(), 4);
    assert_eq!(result.attempts.len(), 4);
    assert_eq!(result.loops_consumed(Tier::Fast), 4);
    // Default policy reports the last attempt.
    assert_eq!(result.output, "d");
}

/// First fully-passing attempt k: exactly k generate calls, success, and
/// the k-th generation is the returned output.
#[test]
fn stops_at_first_passing_attempt() {
    let generator = ScriptedGenerator::new(["miss", "miss again", "hit x"]);
    let tree = ContextTree::new();

    let result = run_loop(
        &generator,
        &tree,
        tree.root(),
        &[passes_when_contains("hit", "x")],
        &loop_config(5),
        None,
    )
    .expect("run");

    assert!(result.success);
    assert_eq!(result.stop, StopReason::Satisfied);
    assert_eq!(generator.calls(), 3);
    assert_eq!(result.attempts.len(), 3);
    assert_eq!(result.attempts[2].output, result.output);
    assert_eq!(result.output, "hit x");
}

/// Every attempt record carries its own context node (whose lineage tip is
/// the attempt itself) and exactly one validation per declared requirement,
/// in declaration order.
#[test]
fn attempt_records_stay_index_aligned() {
    let generator = ScriptedGenerator::new(["one", "two"]);
    let tree = ContextTree::new();
    let requirements = vec![
        always_pass("first"),
        always_fail("second", "second never holds"),
        always_pass("third"),
    ];

    let result = run_loop(
        &generator,
        &tree,
        tree.root(),
        &requirements,
        &loop_config(2),
        None,
    )
    .expect("run");

    for attempt in &result.attempts {
        let lineage = tree.lineage(attempt.node).expect("lineage");
        match &lineage.tip().payload {
            Payload::Attempt { output, .. } => assert_eq!(output, &attempt.output),
            other => panic!("lineage tip is not an attempt: {other:?}"),
        }

        assert_eq!(attempt.validations.len(), requirements.len());
        let ids: Vec<&str> = attempt
            .validations
            .iter()
            .map(|v| v.requirement.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        for validation in &attempt.validations {
            assert_eq!(validation.node, attempt.node);
        }
    }
}

/// Later attempts branch from the earlier attempt's chain: the generator
/// sees the failed output and the repair turn in its next transcript.
#[test]
fn repair_feedback_reaches_the_next_generation() {
    let generator = ScriptedGenerator::new(["wrong", "right x"]);
    let tree = ContextTree::new();

    run_loop(
        &generator,
        &tree,
        tree.root(),
        &[passes_when_contains("hit", "x")],
        &loop_config(3),
        None,
    )
    .expect("run");

    let transcripts = generator.transcripts();
    assert_eq!(transcripts.len(), 2);
    let second = transcripts[1].render();
    assert!(second.contains("wrong"));
    assert!(second.contains("requirements were not met"));
}

/// `first_error` feedback carries only the first failing requirement's
/// reason, not reasons of passing requirements.
#[test]
fn first_error_feedback_carries_only_the_failing_reason() {
    let generator = ScriptedGenerator::new(["attempt one", "attempt two"]);
    let tree = ContextTree::new();
    let requirements = vec![
        always_pass("fine"),
        always_fail("broken", "the second requirement never holds"),
    ];
    let mut config = loop_config(2);
    config.feedback = FeedbackMode::FirstError;

    run_loop(&generator, &tree, tree.root(), &requirements, &config, None).expect("run");

    let second = generator.transcripts()[1].render();
    assert!(second.contains("requirement not met: the second requirement never holds"));
    assert!(!second.contains("fine always holds"));
}

/// `none` feedback appends nothing beyond the failed attempt: the next
/// transcript ends with the failed output itself.
#[test]
fn none_feedback_appends_no_repair_turn() {
    let generator = ScriptedGenerator::new(["wrong", "still wrong"]);
    let tree = ContextTree::new();
    let mut config = loop_config(2);
    config.feedback = FeedbackMode::None;

    run_loop(
        &generator,
        &tree,
        tree.root(),
        &[always_fail("never", "no")],
        &config,
        None,
    )
    .expect("run");

    let second = &generator.transcripts()[1];
    assert_eq!(second.last_content(), Some("wrong"));
}

/// A fast tier that always exhausts its budget of 2 escalates exactly
/// once: two fast-tagged attempts, then up to slow-budget slow-tagged
/// ones, and the slow tier restarts from the original context.
#[test]
fn escalation_runs_slow_tier_from_the_original_context() {
    let fast = ScriptedGenerator::new(["fast miss 1", "fast miss 2"]);
    let slow = ScriptedGenerator::new(["slow hit x"]);
    let tree = ContextTree::new();
    let config = EscalationConfig::new(
        TierConfig::new(Budget::new(2).expect("budget")),
        TierConfig::new(Budget::new(3).expect("budget")),
    );

    let result = run_escalation(
        &fast,
        &slow,
        &tree,
        tree.root(),
        &[passes_when_contains("hit", "x")],
        &config,
        None,
    )
    .expect("run");

    assert!(result.success);
    assert_eq!(result.attempts.len(), 3);
    assert_eq!(result.attempts[0].tier, Tier::Fast);
    assert_eq!(result.attempts[1].tier, Tier::Fast);
    assert_eq!(result.attempts[2].tier, Tier::Slow);
    assert_eq!(result.loops_consumed(Tier::Fast), 2);
    assert_eq!(result.loops_consumed(Tier::Slow), 1);
    assert_eq!(result.output, "slow hit x");

    // Fresh start: the slow tier never sees the fast tier's failures or
    // repair turns.
    let slow_view = slow.transcripts()[0].render();
    assert!(!slow_view.contains("fast miss"));
    assert!(!slow_view.contains("requirements were not met"));
}

/// With escalation disabled, a failed fast tier is returned as-is.
#[test]
fn no_escalation_when_disabled() {
    let fast = ScriptedGenerator::new(["miss 1", "miss 2"]);
    let slow = ScriptedGenerator::new(["unused"]);
    let tree = ContextTree::new();
    let mut config = EscalationConfig::new(
        TierConfig::new(Budget::new(2).expect("budget")),
        TierConfig::new(Budget::new(2).expect("budget")),
    );
    config.escalate_on_failure = false;

    let result = run_escalation(
        &fast,
        &slow,
        &tree,
        tree.root(),
        &[always_fail("never", "no")],
        &config,
        None,
    )
    .expect("run");

    assert!(!result.success);
    assert_eq!(result.stop, StopReason::Exhausted);
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(slow.calls(), 0);
}

/// When both tiers fail, the failure policy picks across the combined
/// fast+slow history.
#[test]
fn fewest_failures_policy_spans_both_tiers() {
    // Fast attempts fail both requirements; the slow attempt satisfies one.
    let fast = ScriptedGenerator::new(["nothing", "still nothing"]);
    let slow = ScriptedGenerator::new(["has x at least"]);
    let tree = ContextTree::new();
    let mut config = EscalationConfig::new(
        TierConfig::new(Budget::new(2).expect("budget")),
        TierConfig::new(Budget::new(1).expect("budget")),
    );
    config.policy = FailurePolicy::FewestFailures;

    let result = run_escalation(
        &fast,
        &slow,
        &tree,
        tree.root(),
        &[
            passes_when_contains("x", "x"),
            passes_when_contains("y", "y"),
        ],
        &config,
        None,
    )
    .expect("run");

    assert!(!result.success);
    assert_eq!(result.attempts.len(), 3);
    assert_eq!(result.output, "has x at least");
}

/// Validation faults are absorbed into failed results and never abort the
/// loop; a later clean attempt still succeeds.
#[test]
fn validation_fault_does_not_abort_the_loop() {
    let generator = ScriptedGenerator::new(["first", "second x"]);
    let tree = ContextTree::new();
    let requirements = vec![
        anneal::core::requirement::Requirement::predicate(
            "flaky",
            "flaky check",
            |output| {
                if output.contains('x') {
                    Ok(true)
                } else {
                    Err(anyhow::anyhow!("checker crashed"))
                }
            },
        ),
        passes_when_contains("hit", "x"),
    ];

    let result = run_loop(
        &generator,
        &tree,
        tree.root(),
        &requirements,
        &loop_config(3),
        None,
    )
    .expect("run");

    assert!(result.success);
    assert_eq!(result.attempts.len(), 2);
    let first = &result.attempts[0].validations[0];
    assert!(!first.passed);
    assert!(first.reason.contains("checker crashed"));
}

/// A cancel raised while an iteration is in flight takes effect at the
/// next between-iterations check: the run returns the attempts completed
/// so far, with the policy-chosen output and stop reason Cancelled.
#[test]
fn cancel_after_one_attempt_returns_partial_history() {
    use std::sync::Arc;

    use anneal::core::requirement::{CheckAdapter, Requirement, Verdict};
    use anneal::sampling::CancelToken;

    struct CancelOnCheck {
        token: CancelToken,
    }

    impl CheckAdapter for CancelOnCheck {
        fn check(&self, _output: &str) -> anyhow::Result<Verdict> {
            self.token.cancel();
            Ok(Verdict::fail("caller gave up"))
        }
    }

    let generator = ScriptedGenerator::new(["first try", "never generated"]);
    let tree = ContextTree::new();
    let cancel = CancelToken::new();
    let requirements = vec![Requirement::adapter(
        "impatient",
        "adapter check",
        Arc::new(CancelOnCheck {
            token: cancel.clone(),
        }),
    )];

    let result = run_loop(
        &generator,
        &tree,
        tree.root(),
        &requirements,
        &loop_config(3),
        Some(&cancel),
    )
    .expect("cancelled run still returns a result");

    assert!(!result.success);
    assert_eq!(result.stop, StopReason::Cancelled);
    assert_eq!(generator.calls(), 1);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.output, "first try");
    assert_eq!(result.chosen, Some(0));
    assert!(!result.attempts[0].validations[0].passed);
}

/// Scenario: "output under 10 words"; attempt 1 has 15 words, attempt 2
/// has 8, budget 3.
#[test]
fn word_count_scenario_succeeds_on_second_attempt() {
    let fifteen_words = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen";
    let eight_words = "one two three four five six seven eight";
    let generator = ScriptedGenerator::new([fifteen_words, eight_words]);
    let tree = ContextTree::new();

    let result = run_loop(
        &generator,
        &tree,
        tree.root(),
        &[checks::max_word_count(10)],
        &loop_config(3),
        None,
    )
    .expect("run");

    assert!(result.success);
    assert_eq!(generator.calls(), 2);
    assert!(!result.attempts[0].validations[0].passed);
    assert!(result.attempts[1].validations[0].passed);
    assert_eq!(result.output, eight_words);
}
