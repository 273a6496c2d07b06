//! Step planner: asks the LLM which screen elements to click or paste into.

use crate::error::{Error, Result};
use crate::instruction::{preview, Instruction};
use crate::llm::{extract_json, Completion, CompletionRequest};
use crate::plan::StepList;
use crate::screen::DisplayId;
use std::path::PathBuf;
use tracing::{debug, error, info};

const PLANNER_PROMPT: &str = r#"You are an expert in user-interface automation for Siemens TIA Portal PLC projects on Windows desktops.
Your job is to translate an operator's order into a sequence of GUI actions.

Based on the operator's order and the description of the current screen state below,
produce ONLY a JSON document describing the steps to follow.

CURRENT SCREEN STATE (depends on the selected monitor):
- Monitor 1 shows the Windows desktop with shortcut icons. TIA Portal is expected to be opened from here. Possible actions: double-click the TIA Portal icon, open the file explorer to look for TIA Portal.
- Monitor 2 shows the main Siemens TIA Portal window with the project tree visible, function blocks, and a "download to device" button. Possible actions: click a function block, click download, drag and drop.
- Any other monitor shows a software interface, probably TIA Portal, in an intermediate configuration state. Evaluate the possible actions carefully.

RULES:
1. Output format: a JSON array of step objects.
2. Every step object has EXACTLY two keys:
   * "step": the file name of the screen crop image for that step. Names are sequential and descriptive, like "i1.png", "i2.png", "i3.png". Assume these images exist.
   * "action": the action to perform. The ONLY allowed values are "clic" (click the element) and "texto" (paste text into the element).
3. Do NOT add a "value" key to "texto" steps. The text to paste is produced later by another component.
4. No explanations, comments or markdown. Your reply must be the bare JSON and nothing else.

EXAMPLE OF THE EXPECTED FORMAT:
[
  { "step": "i1.png", "action": "clic" },
  { "step": "i2.png", "action": "texto" },
  { "step": "i3.png", "action": "clic" }
]"#;

/// Turns an instruction into an ordered step list
pub trait StepPlanner {
    /// Plan the steps and persist them before returning
    fn plan(&self, instruction: &Instruction, display: DisplayId) -> Result<StepList>;
}

/// Planner backed by an LLM completion
pub struct LlmPlanner<C> {
    llm: C,
    temperature: f32,
    steps_path: PathBuf,
}

impl<C: Completion> LlmPlanner<C> {
    pub fn new(llm: C, steps_path: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            temperature: 0.1,
            steps_path: steps_path.into(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_prompt(instruction: &Instruction, display: DisplayId) -> String {
        format!(
            "{}\n\nOperator's order: {}\nSelected monitor: {}\n",
            PLANNER_PROMPT,
            instruction.as_str().trim(),
            display
        )
    }

    /// Parse a model reply into steps; anything off-schema is `PlanningMalformed`
    pub fn parse_reply(raw: &str) -> Result<StepList> {
        let json = extract_json(raw);
        let value = serde_json::from_str(json).map_err(|e| Error::PlanningMalformed {
            reason: format!("reply is not valid JSON: {}", e),
            raw: raw.to_string(),
        })?;
        let (steps, _) = StepList::from_value(value).map_err(|reason| Error::PlanningMalformed {
            reason,
            raw: raw.to_string(),
        })?;
        Ok(steps)
    }
}

impl<C: Completion> StepPlanner for LlmPlanner<C> {
    fn plan(&self, instruction: &Instruction, display_id: DisplayId) -> Result<StepList> {
        info!(order = %instruction.preview(50), monitor = %display_id, "Planning steps");

        let request = CompletionRequest::new(Self::build_prompt(instruction, display_id), self.temperature);
        let raw = self
            .llm
            .complete(&request)
            .map_err(|e| Error::PlanningUnavailable(e.to_string()))?;
        debug!(reply = %preview(&raw, 200), "Planner reply");

        let steps = match Self::parse_reply(&raw) {
            Ok(steps) => steps,
            Err(e) => {
                error!(raw = %raw, "Planner did not return a valid step list: {}", e);
                return Err(e);
            }
        };

        steps.save(&self.steps_path)?;
        info!(
            count = steps.len(),
            path = %self.steps_path.display(),
            "Step list saved"
        );
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, Step};

    #[test]
    fn prompt_carries_order_and_monitor() {
        let prompt = LlmPlanner::<&dyn Completion>::build_prompt(
            &Instruction::new("turn on the motor\n"),
            DisplayId(2),
        );
        assert!(prompt.contains("Operator's order: turn on the motor\n"));
        assert!(prompt.contains("Selected monitor: 2"));
        assert!(prompt.contains("\"clic\""));
        assert!(prompt.contains("\"texto\""));
    }

    #[test]
    fn fenced_reply_parses() {
        let raw = "```json\n[{\"step\": \"i1.png\", \"action\": \"clic\"}]\n```";
        let steps = LlmPlanner::<&dyn Completion>::parse_reply(raw).unwrap();
        assert_eq!(steps.steps(), &[Step::new("i1.png", Action::Click)]);
    }

    #[test]
    fn prose_reply_is_malformed_and_keeps_raw() {
        let raw = "I would click the TIA Portal icon first.";
        match LlmPlanner::<&dyn Completion>::parse_reply(raw) {
            Err(Error::PlanningMalformed { raw: captured, .. }) => assert_eq!(captured, raw),
            other => panic!("unexpected {:?}", other),
        }
    }
}
