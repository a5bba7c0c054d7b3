//! Test-only fakes: scripted generators, adapters, and requirement
//! builders. No model is ever called.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::backend::generate::{GenerateError, GenerateOptions, Generator};
use crate::core::requirement::{CheckAdapter, Requirement, Verdict};
use crate::core::transcript::Transcript;

enum ScriptItem {
    Output(String),
    Fault(String),
}

/// Generator that replays a predetermined script and records every call.
///
/// Running past the end of the script is a [`GenerateError`], which keeps
/// accidental extra calls loud in tests.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: RefCell<VecDeque<ScriptItem>>,
    seen: RefCell<Vec<(Transcript, GenerateOptions)>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = outputs
            .into_iter()
            .map(|s| ScriptItem::Output(s.into()))
            .collect();
        Self {
            script: RefCell::new(script),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn push_output(&self, output: impl Into<String>) {
        self.script
            .borrow_mut()
            .push_back(ScriptItem::Output(output.into()));
    }

    pub fn push_fault(&self, cause: impl Into<String>) {
        self.script
            .borrow_mut()
            .push_back(ScriptItem::Fault(cause.into()));
    }

    /// Number of generate calls observed, faults included.
    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }

    /// Transcripts observed, in call order.
    pub fn transcripts(&self) -> Vec<Transcript> {
        self.seen.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Options observed, in call order.
    pub fn options_seen(&self) -> Vec<GenerateOptions> {
        self.seen.borrow().iter().map(|(_, o)| o.clone()).collect()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(
        &self,
        transcript: &Transcript,
        options: &GenerateOptions,
    ) -> Result<String, GenerateError> {
        self.seen
            .borrow_mut()
            .push((transcript.clone(), options.clone()));
        match self.script.borrow_mut().pop_front() {
            Some(ScriptItem::Output(output)) => Ok(output),
            Some(ScriptItem::Fault(cause)) => Err(GenerateError::new(cause)),
            None => Err(GenerateError::new("scripted generator exhausted")),
        }
    }
}

/// Checker adapter that replays scripted verdicts.
#[derive(Default)]
pub struct ScriptedAdapter {
    verdicts: Mutex<VecDeque<anyhow::Result<Verdict>>>,
}

impl ScriptedAdapter {
    pub fn new<I>(verdicts: I) -> Self
    where
        I: IntoIterator<Item = anyhow::Result<Verdict>>,
    {
        Self {
            verdicts: Mutex::new(verdicts.into_iter().collect()),
        }
    }
}

impl CheckAdapter for ScriptedAdapter {
    fn check(&self, _output: &str) -> anyhow::Result<Verdict> {
        self.verdicts
            .lock()
            .expect("adapter script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(Verdict::fail("adapter script exhausted")))
    }
}

/// Requirement that passes everything.
pub fn always_pass(id: &str) -> Requirement {
    Requirement::predicate(id, format!("{id} always holds"), |_| Ok(true))
}

/// Requirement that fails everything; the failure reason carries
/// `description`.
pub fn always_fail(id: &str, description: &str) -> Requirement {
    Requirement::predicate(id, description, |_| Ok(false))
}

/// Requirement satisfied exactly when the output contains `needle`.
pub fn passes_when_contains(id: &str, needle: &str) -> Requirement {
    let needle = needle.to_string();
    Requirement::predicate(
        id,
        format!("include \"{needle}\" in the response"),
        move |output| Ok(output.contains(&needle)),
    )
}
