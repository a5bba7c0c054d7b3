//! Loop budget accounting for one strategy tier.

/// Integer loop budget with a running consumed counter.
///
/// Invariant: `consumed <= limit` at all times, enforced by construction:
/// the only way in is [`Budget::new`], so the type stays out of serde.
/// The tier terminates the instant `consumed == limit` without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    limit: u32,
    consumed: u32,
}

/// Rejected budget configuration.
#[derive(Debug, Clone, thiserror::Error)]
#[error("loop budget must be at least 1")]
pub struct InvalidBudget;

impl Budget {
    pub fn new(limit: u32) -> Result<Self, InvalidBudget> {
        if limit == 0 {
            return Err(InvalidBudget);
        }
        Ok(Self { limit, consumed: 0 })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Record one failed loop. Returns `true` while loops remain.
    pub fn consume(&mut self) -> bool {
        debug_assert!(self.consumed < self.limit);
        self.consumed += 1;
        !self.exhausted()
    }

    pub fn exhausted(&self) -> bool {
        self.consumed == self.limit
    }
}
