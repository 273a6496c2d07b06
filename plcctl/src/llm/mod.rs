//! LLM completion backends.
//!
//! The planner and the code generator only need "prompt in, text out", so
//! they depend on the [`Completion`] trait rather than on [`LlmClient`].

pub mod client;

pub use client::{LlmClient, LlmConfig};

use crate::error::Result;

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Anything that turns a prompt into text
pub trait Completion {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

impl<T: Completion + ?Sized> Completion for &T {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }
}

impl<T: Completion + ?Sized> Completion for Box<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }
}

/// Remove a surrounding markdown code fence (```lang ... ```), if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "scl", ...) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Cut the JSON document out of a model reply that may wrap it in prose or fences
pub fn extract_json(text: &str) -> &str {
    let unfenced = match (text.find("```"), text.rfind("```")) {
        (Some(start), Some(end)) if end > start => strip_code_fence(&text[start..end + 3]),
        _ => text.trim(),
    };

    let start = unfenced.find(&['[', '{'][..]);
    let end = unfenced.rfind(&[']', '}'][..]);
    match (start, end) {
        (Some(start), Some(end)) if end >= start => &unfenced[start..=end],
        _ => unfenced,
    }
}
