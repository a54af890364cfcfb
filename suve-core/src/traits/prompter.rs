//! Interactive choice abstract Trait

use async_trait::async_trait;

use crate::error::CoreResult;

/// One labeled option of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Short label
    pub label: String,
    /// One-line explanation
    pub description: String,
}

impl Choice {
    #[must_use]
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Asks the user to pick among labeled choices
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Whether a terminal is attached and prompts can be shown
    fn is_interactive(&self) -> bool;

    /// Ask the user to pick one of `choices`
    ///
    /// # Returns
    /// * `Ok(Some(index))` - selected choice
    /// * `Ok(None)` - user cancelled
    async fn choose(&self, message: &str, choices: &[Choice]) -> CoreResult<Option<usize>>;
}

/// Prompter for contexts without a terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

#[async_trait]
impl Prompter for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn choose(&self, _message: &str, _choices: &[Choice]) -> CoreResult<Option<usize>> {
        Ok(None)
    }
}
