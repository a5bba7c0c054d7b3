//! Generator abstraction for model invocation.
//!
//! The [`Generator`] trait decouples the sampling loop from the actual
//! model backend (local, remote, streaming or not). Tests use scripted
//! generators that return predetermined outputs without any model call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::transcript::Transcript;

/// Transport or model fault raised by a generation call.
///
/// Never retried by the sampling loop: there is no repair action for a
/// transport failure, so it terminates the run and surfaces to the caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("generation failed: {cause}")]
pub struct GenerateError {
    pub cause: String,
}

impl GenerateError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

/// Opaque configuration bag for one generation call.
///
/// Recognized keys are typed fields; everything else rides along in
/// `extra`, ignored by the loop and passed through to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub tools: Option<Value>,
    pub output_schema: Option<Value>,
    pub extra: BTreeMap<String, Value>,
}

impl GenerateOptions {
    /// Build from a loose key/value map. Unrecognized keys are kept in
    /// `extra`, never errors; recognized keys with the wrong shape are
    /// treated as unrecognized.
    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "model" => {
                    if let Value::String(s) = value {
                        options.model = Some(s);
                        continue;
                    }
                    options.extra.insert(key, value);
                }
                "temperature" => {
                    if let Some(t) = value.as_f64() {
                        options.temperature = Some(t);
                        continue;
                    }
                    options.extra.insert(key, value);
                }
                "max_tokens" => {
                    if let Some(n) = value.as_u64().and_then(|n| u32::try_from(n).ok()) {
                        options.max_tokens = Some(n);
                        continue;
                    }
                    options.extra.insert(key, value);
                }
                "tools" => options.tools = Some(value),
                "output_schema" => options.output_schema = Some(value),
                _ => {
                    options.extra.insert(key, value);
                }
            }
        }
        options
    }

    /// Merge `overrides` on top of these options, key by key. `extra`
    /// maps merge with override-side precedence.
    pub fn merged_with(&self, overrides: &GenerateOptions) -> GenerateOptions {
        let mut extra = self.extra.clone();
        extra.extend(overrides.extra.clone());
        GenerateOptions {
            model: overrides.model.clone().or_else(|| self.model.clone()),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            tools: overrides.tools.clone().or_else(|| self.tools.clone()),
            output_schema: overrides
                .output_schema
                .clone()
                .or_else(|| self.output_schema.clone()),
            extra,
        }
    }
}

/// Abstraction over generation backends.
///
/// A call is an atomic black-box suspension point: the loop blocks until
/// it returns. Per-call timeouts are the backend's concern; a timeout
/// surfaces as a [`GenerateError`].
pub trait Generator {
    fn generate(
        &self,
        transcript: &Transcript,
        options: &GenerateOptions,
    ) -> Result<String, GenerateError>;
}

impl<G: Generator + ?Sized> Generator for &G {
    fn generate(
        &self,
        transcript: &Transcript,
        options: &GenerateOptions,
    ) -> Result<String, GenerateError> {
        (**self).generate(transcript, options)
    }
}
