//! Session facade consumed by the surrounding CLI/session layer.
//!
//! A session owns one context tree, a head node, and default generate
//! options. `instruct` surfaces only output and success; the full
//! per-attempt history stays retained and available via `last_result`.

use tracing::{debug, instrument};

use crate::backend::generate::{GenerateOptions, Generator};
use crate::core::context::{ContextTree, NodeId, Payload, Role};
use crate::core::requirement::{Requirement, ValidationResult};
use crate::core::transcript::Transcript;
use crate::escalation::{EscalationConfig, run_escalation};
use crate::result::SamplingResult;
use crate::sampling::{CancelToken, LoopConfig, SampleError, run_loop, validate_requirements};

/// What `instruct` hands back when full provenance was not requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub output: String,
    pub success: bool,
}

/// One caller-facing sampling session.
pub struct Session<G> {
    generator: G,
    tree: ContextTree,
    head: NodeId,
    defaults: GenerateOptions,
    last: Option<SamplingResult>,
}

impl<G: Generator> Session<G> {
    pub fn new(generator: G, defaults: GenerateOptions) -> Self {
        let tree = ContextTree::new();
        let head = tree.root();
        Self {
            generator,
            tree,
            head,
            defaults,
            last: None,
        }
    }

    /// Seed the fresh session with a system prompt turn.
    pub fn with_system_prompt(generator: G, defaults: GenerateOptions, system: &str) -> Self {
        let mut session = Self::new(generator, defaults);
        session.head = session
            .tree
            .append(
                session.head,
                Payload::Turn {
                    role: Role::System,
                    content: system.to_string(),
                },
            )
            .expect("root handle belongs to this tree");
        session
    }

    /// Issue an instruction and sample until the requirements hold or the
    /// budget runs out.
    ///
    /// The head advances to the chosen attempt node even on failure, so a
    /// follow-up instruction can ask for repairs in-context.
    #[instrument(skip_all, fields(requirements = requirements.len()))]
    pub fn instruct(
        &mut self,
        description: &str,
        requirements: &[Requirement],
        config: &LoopConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<Reply, SampleError> {
        let start = self.append_instruction(description, requirements)?;
        let mut effective = config.clone();
        effective.options = self.defaults.merged_with(&config.options);
        let result = run_loop(
            &self.generator,
            &self.tree,
            start,
            requirements,
            &effective,
            cancel,
        )?;
        Ok(self.absorb(result))
    }

    /// Like [`Self::instruct`], escalating to `slow` when the fast tier
    /// (this session's generator) exhausts its budget.
    #[instrument(skip_all, fields(requirements = requirements.len()))]
    pub fn instruct_escalating<S: Generator>(
        &mut self,
        slow: &S,
        description: &str,
        requirements: &[Requirement],
        config: &EscalationConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<Reply, SampleError> {
        let start = self.append_instruction(description, requirements)?;
        let mut effective = config.clone();
        effective.fast.options = self.defaults.merged_with(&config.fast.options);
        effective.slow.options = self.defaults.merged_with(&config.slow.options);
        let result = run_escalation(
            &self.generator,
            slow,
            &self.tree,
            start,
            requirements,
            &effective,
            cancel,
        )?;
        Ok(self.absorb(result))
    }

    /// Re-validate the head's most recent output against `requirements`,
    /// appending validation nodes but never moving the head.
    ///
    /// Empty when the session has no output yet.
    pub fn validate(&self, requirements: &[Requirement]) -> Vec<ValidationResult> {
        let Some((node, output)) = self.last_output() else {
            return Vec::new();
        };
        validate_requirements(
            &self.generator,
            &self.tree,
            node,
            &output,
            requirements,
            &self.defaults,
        )
        .expect("head lineage nodes belong to this tree")
    }

    /// Full history of the most recent `instruct`, kept until the next one.
    pub fn last_result(&self) -> Option<&SamplingResult> {
        self.last.as_ref()
    }

    /// Rewind the head to the session root. The tree keeps all nodes.
    pub fn reset(&mut self) {
        self.head = self.tree.root();
    }

    pub fn tree(&self) -> &ContextTree {
        &self.tree
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    /// Transcript of the current head lineage.
    pub fn transcript(&self) -> Transcript {
        let lineage = self
            .tree
            .lineage(self.head)
            .expect("head belongs to this tree");
        Transcript::from_lineage(&lineage)
    }

    fn append_instruction(
        &mut self,
        description: &str,
        requirements: &[Requirement],
    ) -> Result<NodeId, SampleError> {
        let content = render_instruction(description, requirements);
        let node = self.tree.append(
            self.head,
            Payload::Turn {
                role: Role::User,
                content,
            },
        )?;
        debug!(node = node.seq(), "instruction appended");
        Ok(node)
    }

    fn absorb(&mut self, result: SamplingResult) -> Reply {
        if let Some(chosen) = result.chosen_attempt() {
            self.head = chosen.node;
        }
        let reply = Reply {
            output: result.output.clone(),
            success: result.success,
        };
        self.last = Some(result);
        reply
    }

    fn last_output(&self) -> Option<(NodeId, String)> {
        let lineage = self
            .tree
            .lineage(self.head)
            .expect("head belongs to this tree");
        for node in lineage.iter().collect::<Vec<_>>().into_iter().rev() {
            if let Payload::Attempt { output, .. } = &node.payload {
                return Some((node.id, output.clone()));
            }
        }
        None
    }
}

/// Render the user-visible instruction turn: the description plus the
/// declared requirements, check-only ones excluded.
fn render_instruction(description: &str, requirements: &[Requirement]) -> String {
    let mut buf = String::from(description);
    let shown: Vec<&Requirement> = requirements.iter().filter(|r| !r.check_only).collect();
    if !shown.is_empty() {
        buf.push_str("\n\nRequirements:\n");
        for requirement in shown {
            buf.push_str("- ");
            buf.push_str(&requirement.description);
            buf.push('\n');
        }
    }
    buf
}
