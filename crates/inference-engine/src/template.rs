//! Prompt templates with a single `{prompt}` slot

use common::error::{Error, Result};

/// Placeholder replaced by the prompt text
pub const PROMPT_SLOT: &str = "{prompt}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Wraps `template`, which must contain `{prompt}`
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(PROMPT_SLOT) {
            return Err(Error::InvalidArgument(format!(
                "prompt template must contain {}",
                PROMPT_SLOT
            )));
        }
        Ok(Self { template })
    }

    /// Substitutes `prompt` into the slot
    pub fn render(&self, prompt: &str) -> String {
        self.template.replace(PROMPT_SLOT, prompt)
    }
}

impl std::str::FromStr for PromptTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
