use colored::Colorize;
use inquire::{Confirm, InquireError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PromptError {
    #[error("Error occurred trying to prompt user")]
    #[diagnostic(
        code(kopye_markdown::prompt::inquire),
        help("Pass --yes to skip the confirmation when not running in a terminal")
    )]
    Inquire(#[from] InquireError),
}

/// Asks whether the previewed project should be written.
pub fn confirm_changes() -> Result<bool, PromptError> {
    let question = format!("{}", "Apply changes?".bright_green());

    let answer = Confirm::new(&question).with_default(false).prompt()?;

    Ok(answer)
}
