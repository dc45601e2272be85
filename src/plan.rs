//! Plan parsing: raw model text → ordered typed steps.
//!
//! The model is asked for one JSON object per step, separated by blank lines.
//! Its output is untrusted, so every block is decoded independently and the
//! ones that fail are kept aside as rejected fragments instead of failing the
//! whole plan.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a plan. Only `Action` steps are executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlanStep {
    User {
        user: String,
    },
    Plan {
        plan: String,
    },
    Action {
        action: String,
        #[serde(default)]
        input: Value,
    },
    Observation {
        observation: Value,
    },
}

impl PlanStep {
    pub fn is_action(&self) -> bool {
        matches!(self, PlanStep::Action { .. })
    }
}

/// A block that could not be decoded into a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFragment {
    /// Position among the non-empty blocks.
    pub index: usize,
    pub fragment: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub steps: Vec<PlanStep>,
    pub rejected: Vec<RejectedFragment>,
}

impl ParsedPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_action()).count()
    }
}

/// Split raw model output into steps. Stateless and deterministic.
pub fn parse(raw: &str) -> ParsedPlan {
    let cleaned = raw
        .replace("```json", "")
        .replace("```", "")
        .replace("\r\n", "\n");

    let mut plan = ParsedPlan::default();
    for (index, block) in split_blocks(&cleaned).into_iter().enumerate() {
        match serde_json::from_str::<PlanStep>(&block) {
            Ok(step) => plan.steps.push(step),
            Err(e) => {
                log::warn!("Dropping plan fragment {}: {}", index, e);
                plan.rejected.push(RejectedFragment {
                    index,
                    fragment: block,
                    reason: e.to_string(),
                });
            }
        }
    }
    plan
}

/// Blocks separated by one or more blank (or whitespace-only) lines.
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n").trim().to_string());
    }
    blocks
}
