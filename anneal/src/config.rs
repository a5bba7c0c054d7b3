//! Strategy configuration stored as TOML.
//!
//! Intended to be edited by humans and must remain stable and
//! automatable. Missing fields default to sensible values.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::budget::Budget;
use crate::core::feedback::FeedbackMode;
use crate::core::policy::FailurePolicy;
use crate::escalation::{EscalationConfig, TierConfig};
use crate::sampling::LoopConfig;

/// Caller-facing strategy knobs (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StrategyConfig {
    /// Loop budget of the single tier, or of the fast tier when
    /// escalation is enabled.
    pub budget: u32,

    /// Loop budget of the slow tier.
    pub slow_budget: u32,

    /// How much failure detail feeds the next generation.
    pub feedback: FeedbackMode,

    /// Which attempt to report when every loop failed.
    pub policy: FailurePolicy,

    /// Escalate to the slow tier after fast-tier exhaustion.
    pub escalate_on_failure: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            budget: 3,
            slow_budget: 1,
            feedback: FeedbackMode::AllErrors,
            policy: FailurePolicy::LastAttempt,
            escalate_on_failure: false,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.budget == 0 {
            return Err(anyhow!("budget must be > 0"));
        }
        if self.slow_budget == 0 {
            return Err(anyhow!("slow_budget must be > 0"));
        }
        Ok(())
    }

    /// Single-tier loop configuration.
    pub fn loop_config(&self) -> Result<LoopConfig> {
        self.validate()?;
        let mut config = LoopConfig::new(Budget::new(self.budget).expect("validated above"));
        config.feedback = self.feedback;
        config.policy = self.policy;
        Ok(config)
    }

    /// Two-tier escalation configuration.
    pub fn escalation_config(&self) -> Result<EscalationConfig> {
        self.validate()?;
        let fast = TierConfig::new(Budget::new(self.budget).expect("validated above"));
        let slow = TierConfig::new(Budget::new(self.slow_budget).expect("validated above"));
        let mut config = EscalationConfig::new(fast, slow);
        config.feedback = self.feedback;
        config.policy = self.policy;
        config.escalate_on_failure = self.escalate_on_failure;
        Ok(config)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StrategyConfig::default()`.
pub fn load_strategy_config(path: &Path) -> Result<StrategyConfig> {
    if !path.exists() {
        let cfg = StrategyConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StrategyConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_strategy_config(path: &Path, cfg: &StrategyConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize strategy config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
