//! Capability seams to the outside world.
//!
//! Generation and judged validation are opaque, possibly-slow,
//! possibly-failing operations behind small trait interfaces. Everything
//! the loop needs from a backend goes through here.

pub mod generate;
pub mod judge;
