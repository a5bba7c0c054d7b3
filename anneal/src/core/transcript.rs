//! Conversational view of a lineage, as handed to a generation backend.
//!
//! A transcript carries turns and attempts only; validation branches are
//! provenance and never reach the model.

use serde::{Deserialize, Serialize};

use crate::core::context::{Lineage, Payload, Role};

/// One rendered turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// The ordered turns a generation call sees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub turns: Vec<Turn>,
}

impl Transcript {
    /// Project a lineage into turns. Attempts become assistant turns;
    /// validation records are skipped; the empty root turn is dropped.
    pub fn from_lineage(lineage: &Lineage) -> Self {
        let mut turns = Vec::new();
        for node in lineage.iter() {
            match &node.payload {
                Payload::Turn { role, content } => {
                    if content.is_empty() {
                        continue;
                    }
                    turns.push(Turn {
                        role: *role,
                        content: content.clone(),
                    });
                }
                Payload::Attempt { output, .. } => {
                    turns.push(Turn {
                        role: Role::Assistant,
                        content: output.clone(),
                    });
                }
                Payload::Validation { .. } => {}
            }
        }
        Self { turns }
    }

    /// Plain-text rendering, one `role: content` block per turn.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        for turn in &self.turns {
            let role = match turn.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            buf.push_str(role);
            buf.push_str(": ");
            buf.push_str(&turn.content);
            buf.push('\n');
        }
        buf
    }

    /// Content of the last turn, if any.
    pub fn last_content(&self) -> Option<&str> {
        self.turns.last().map(|t| t.content.as_str())
    }
}
