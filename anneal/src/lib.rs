//! Validated sampling over an opaque generation backend.
//!
//! This crate implements a generate → validate → repair loop: a caller
//! issues an instruction with declared requirements, and the strategy
//! retries with feedback until every requirement passes or a loop budget
//! runs out, optionally escalating from a fast model to a slow one. Every
//! attempt and validation outcome is recorded in an append-only provenance
//! tree. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (context tree, requirements,
//!   budgets, feedback, failure policy). No I/O, fully testable in
//!   isolation.
//! - **[`backend`]**: Capability seams to models (generation, judged
//!   validation). Isolated to enable scripted fakes in tests.
//!
//! Orchestration modules ([`sampling`], [`escalation`], [`session`])
//! coordinate core logic with backend calls to implement the caller-facing
//! API.

pub mod backend;
pub mod checks;
pub mod config;
pub mod core;
pub mod escalation;
pub mod logging;
pub mod result;
pub mod sampling;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
