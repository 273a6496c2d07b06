//! SCL code generation for the paste steps.

use crate::error::{Error, Result};
use crate::instruction::{preview, Instruction};
use crate::llm::{strip_code_fence, Completion, CompletionRequest};
use tracing::{debug, info};

const GENERATOR_PROMPT: &str = r#"You are an expert programmer of Siemens S7-1200 PLCs in SCL (Structured Control Language).

Write the SCL code for this requirement:
"{requirement}"

IMPORTANT RULES:
- Output ONLY the SCL code, starting at the first IF statement and ending with the final state of Q_Motor.
- Do NOT write explanations, comments, or the words "SCL" or "code" around it.
- Do NOT use markdown code blocks.
- The function block is called as follows, so use exactly these variable names:

"MarchaParo_1"(
    Start := "Tag_1",
    Stop := "Tag_2",
    Q_Motor => "Tag_3"
);

Start is the start signal, Stop is the stop signal and Q_Motor is the motor output."#;

/// Produces the text pasted by `texto` steps
pub trait CodeGenerator {
    fn generate(&self, instruction: &Instruction) -> Result<String>;
}

/// Code generator backed by an LLM completion
pub struct LlmCodeGenerator<C> {
    llm: C,
    temperature: f32,
    max_tokens: u32,
}

impl<C: Completion> LlmCodeGenerator<C> {
    pub fn new(llm: C) -> Self {
        Self {
            llm,
            temperature: 0.3,
            max_tokens: 500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build_prompt(instruction: &Instruction) -> String {
        GENERATOR_PROMPT.replace("{requirement}", instruction.as_str().trim())
    }
}

impl<C: Completion> CodeGenerator for LlmCodeGenerator<C> {
    fn generate(&self, instruction: &Instruction) -> Result<String> {
        info!(order = %instruction.preview(50), "Generating SCL code");

        let request = CompletionRequest::new(Self::build_prompt(instruction), self.temperature)
            .with_max_tokens(self.max_tokens);
        let raw = self
            .llm
            .complete(&request)
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?;

        let code = strip_code_fence(&raw);
        if code.is_empty() {
            return Err(Error::GenerationUnavailable(
                "model returned no code".to_string(),
            ));
        }

        debug!(code = %preview(code, 50), "Generated code");
        Ok(code.to_string())
    }
}
