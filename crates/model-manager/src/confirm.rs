//! Download confirmation gate

use dialoguer::Input;

use common::error::Result;

/// The only answer that counts as consent
pub const ACCEPT_TOKEN: &str = "Y";

/// Asks the user whether to go ahead with a download
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Returns true only for the exact, case-sensitive accept token
pub fn is_accepted(answer: &str) -> bool {
    answer.trim_end_matches(['\r', '\n']) == ACCEPT_TOKEN
}

/// Reads one line from the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, message: &str) -> Result<bool> {
        let answer = Input::<String>::new()
            .with_prompt(format!("{} (Y/n)", message))
            .allow_empty(true)
            .interact_text()?;
        Ok(is_accepted(&answer))
    }
}

/// Answers every question the same way without prompting
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _message: &str) -> Result<bool> {
        Ok(self.0)
    }
}
