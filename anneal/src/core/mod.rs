//! Pure, deterministic building blocks of the sampling core.
//!
//! Core modules perform no I/O and never call a backend. They operate on
//! in-memory structures and return deterministic outputs suitable for
//! tests; the only suspension points live behind the `backend` seams.

pub mod budget;
pub mod context;
pub mod feedback;
pub mod policy;
pub mod requirement;
pub mod transcript;
