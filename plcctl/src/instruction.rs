use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// The operator's natural-language order, read once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction(String);

impl Instruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the instruction file written by the front-end
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::InputMissing {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a new instruction, refusing an empty one
    pub fn store(path: &Path, text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Configuration(
                "the order is empty; write or dictate one first".to_string(),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(Self(text.to_string()))
    }

    /// First `max` characters, for log lines
    pub fn preview(&self, max: usize) -> String {
        preview(self.0.trim(), max)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Truncate on a character boundary, marking the cut with "..."
pub(crate) fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
