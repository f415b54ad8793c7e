//! Interactive text entry port.

use inquire::{InquireError, Text};

use crate::error::PromptError;

/// Obtain a line of text, offering `default`.
pub trait Prompt {
    fn ask(&self, prompt: &str, default: &str) -> Result<String, PromptError>;
}

/// Reads from the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&self, prompt: &str, default: &str) -> Result<String, PromptError> {
        let mut text = Text::new(prompt);
        if !default.is_empty() {
            text = text.with_default(default);
        }
        text.prompt().map_err(|e| match e {
            InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                PromptError::Cancelled
            }
            other => PromptError::Failed(other.to_string()),
        })
    }
}

/// Answers without a human: the fixed text, or the default when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedResponse {
    answer: Option<String>,
}

impl FixedResponse {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
        }
    }

    /// Always accept the offered default.
    pub fn accept_default() -> Self {
        Self::default()
    }
}

impl Prompt for FixedResponse {
    fn ask(&self, prompt: &str, default: &str) -> Result<String, PromptError> {
        tracing::debug!("prompt answered without terminal: {prompt}");
        Ok(self.answer.clone().unwrap_or_else(|| default.to_string()))
    }
}
