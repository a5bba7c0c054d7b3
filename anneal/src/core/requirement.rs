//! Requirements: named, checkable conditions an output must satisfy.
//!
//! A requirement is immutable and stateless. Its evaluation mechanism is a
//! tagged variant: judged free-text (delegated to an LLM-as-judge call in
//! `backend::judge`), a deterministic predicate, or a specialized checker
//! adapter. Predicate and adapter faults are absorbed here into failed
//! verdicts so one flaky check never aborts a recoverable loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::context::NodeId;

/// Result of one local check: pass/fail plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub reason: String,
}

impl Verdict {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// The outcome of checking one requirement against one attempt.
///
/// `node` is the attempt node the check was evaluated against; several
/// results reference the same attempt, one per declared requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub requirement: String,
    pub passed: bool,
    pub reason: String,
    pub node: NodeId,
}

/// Specialized fast-checking adapter, e.g. a constrained classifier.
///
/// Returning `Err` marks the requirement failed with the error message as
/// the reason; it never propagates out of validation.
pub trait CheckAdapter: Send + Sync {
    fn check(&self, output: &str) -> anyhow::Result<Verdict>;
}

type Predicate = dyn Fn(&str) -> anyhow::Result<bool> + Send + Sync;

/// How a requirement is evaluated.
#[derive(Clone)]
pub enum RequirementKind {
    /// Free-text condition judged by a model call (see `backend::judge`).
    Judged,
    /// Deterministic programmatic predicate over the raw output.
    Predicate(Arc<Predicate>),
    /// Specialized checker adapter.
    Adapter(Arc<dyn CheckAdapter>),
}

impl std::fmt::Debug for RequirementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequirementKind::Judged => write!(f, "Judged"),
            RequirementKind::Predicate(_) => write!(f, "Predicate(..)"),
            RequirementKind::Adapter(_) => write!(f, "Adapter(..)"),
        }
    }
}

/// A named check an output must satisfy.
///
/// `check_only` requirements are validated every iteration but excluded
/// from instruction rendering and repair feedback.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub id: String,
    pub description: String,
    pub kind: RequirementKind,
    pub check_only: bool,
}

impl Requirement {
    /// Free-text requirement evaluated by LLM-as-judge.
    pub fn judged(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: RequirementKind::Judged,
            check_only: false,
        }
    }

    /// Requirement backed by a deterministic predicate.
    pub fn predicate<F>(id: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            description: description.into(),
            kind: RequirementKind::Predicate(Arc::new(f)),
            check_only: false,
        }
    }

    /// Requirement backed by a checker adapter.
    pub fn adapter(
        id: impl Into<String>,
        description: impl Into<String>,
        adapter: Arc<dyn CheckAdapter>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: RequirementKind::Adapter(adapter),
            check_only: false,
        }
    }

    /// Mark this requirement check-only: still validated, never rendered
    /// into instructions or repair feedback.
    pub fn check(mut self) -> Self {
        self.check_only = true;
        self
    }

    /// Evaluate locally when possible. `None` for judged requirements,
    /// which need a generator (see `backend::judge`).
    ///
    /// Faults are absorbed: a predicate or adapter error becomes a failed
    /// verdict carrying the error message.
    pub fn check_local(&self, output: &str) -> Option<Verdict> {
        match &self.kind {
            RequirementKind::Judged => None,
            RequirementKind::Predicate(f) => Some(match f(output) {
                Ok(true) => Verdict::pass("predicate satisfied"),
                Ok(false) => Verdict::fail(format!("requirement not met: {}", self.description)),
                Err(err) => {
                    warn!(requirement = %self.id, error = %err, "predicate fault absorbed");
                    Verdict::fail(format!("predicate fault: {err}"))
                }
            }),
            RequirementKind::Adapter(adapter) => Some(match adapter.check(output) {
                Ok(verdict) => verdict,
                Err(err) => {
                    warn!(requirement = %self.id, error = %err, "adapter fault absorbed");
                    Verdict::fail(format!("adapter fault: {err}"))
                }
            }),
        }
    }
}
