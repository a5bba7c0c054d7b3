//! LLM-as-judge evaluation for judged requirements.
//!
//! Renders a yes/no question about the attempt, calls the generator, and
//! parses the reply. A generator fault inside judging is absorbed into a
//! failed verdict: judging is validation, and validation never aborts the
//! loop.

use tracing::warn;

use crate::backend::generate::{GenerateOptions, Generator};
use crate::core::context::Role;
use crate::core::requirement::{Requirement, Verdict};
use crate::core::transcript::{Transcript, Turn};

/// Judge one requirement against an attempt's output.
pub fn judge<G: Generator>(
    generator: &G,
    requirement: &Requirement,
    output: &str,
    options: &GenerateOptions,
) -> Verdict {
    let question = render_question(&requirement.description, output);
    let transcript = Transcript {
        turns: vec![Turn {
            role: Role::User,
            content: question,
        }],
    };
    match generator.generate(&transcript, options) {
        Ok(reply) => match output_to_bool(&reply) {
            Some(true) => Verdict::pass("judged satisfied"),
            Some(false) => Verdict::fail(format!(
                "judged not satisfied: {}",
                requirement.description
            )),
            None => {
                warn!(requirement = %requirement.id, reply = %reply, "unparseable judge reply");
                Verdict::fail(format!("unparseable judge reply: {reply}"))
            }
        },
        Err(err) => {
            warn!(requirement = %requirement.id, error = %err, "judge call failed");
            Verdict::fail(format!("judge call failed: {err}"))
        }
    }
}

fn render_question(description: &str, output: &str) -> String {
    format!(
        "You are checking a response against one requirement.\n\
         Requirement: {description}\n\
         Response:\n{output}\n\
         Does the response satisfy the requirement? Answer yes or no."
    )
}

/// Map a judge reply onto a boolean, looking at its first word only.
pub fn output_to_bool(reply: &str) -> Option<bool> {
    let first = reply
        .trim()
        .split(|c: char| c.is_whitespace() || c == '.' || c == ',' || c == ':')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match first.as_str() {
        "yes" | "y" | "true" | "pass" | "1" => Some(true),
        "no" | "n" | "false" | "fail" | "0" => Some(false),
        _ => None,
    }
}
