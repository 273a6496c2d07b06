use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Instruction file not found: {}", .path.display())]
    InputMissing { path: PathBuf },

    #[error("Planner returned malformed steps: {reason}")]
    PlanningMalformed { reason: String, raw: String },

    #[error("Planner unavailable: {0}")]
    PlanningUnavailable(String),

    #[error("Code generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Element '{template}' not found on screen (threshold {threshold})")]
    ElementNotFound { template: String, threshold: f32 },

    #[error("Paste step on '{template}' has no text to paste")]
    MissingText { template: String },

    #[error("Step {step} still failing after {attempts} attempts")]
    RetriesExhausted { step: usize, attempts: u32 },

    #[error("Invalid step list: {0}")]
    StepList(String),

    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Input error: {0}")]
    Input(#[from] inputctl::Error),

    #[error("LLM API error: {0}")]
    LlmApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Fatal errors end the run; everything else raised while executing a
    /// step is retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::InputMissing { .. }
                | Error::PlanningMalformed { .. }
                | Error::PlanningUnavailable(_)
                | Error::RetriesExhausted { .. }
                | Error::StepList(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_failures_are_fatal() {
        assert!(Error::Configuration("no key".into()).is_fatal());
        assert!(Error::PlanningUnavailable("401".into()).is_fatal());
        assert!(Error::PlanningMalformed {
            reason: "x".into(),
            raw: String::new()
        }
        .is_fatal());
    }

    #[test]
    fn step_failures_are_transient() {
        let not_found = Error::ElementNotFound {
            template: "i1.png".into(),
            threshold: 0.8,
        };
        assert!(!not_found.is_fatal());
        assert!(!Error::MissingText {
            template: "i2.png".into()
        }
        .is_fatal());
        assert!(!Error::GenerationUnavailable("timeout".into()).is_fatal());
        assert_eq!(
            not_found.to_string(),
            "Element 'i1.png' not found on screen (threshold 0.8)"
        );
    }
}
