//! Command input handling.
//!
//! A curl invocation reaches the library either as a raw command string
//! (copied from a terminal or documentation) or as an already-split argument
//! vector. Both forms are modeled by [`Command`] and converge on the same
//! token stream.

pub mod tokenizer;

pub use tokenizer::{tokenize, tokens_from_args, Segment, Token, TokenKind, TokenizerError};

/// A curl invocation in one of its two accepted forms.
///
/// `Raw` is a full command string that goes through the shell-aware
/// tokenizer; `Args` is a pre-tokenized argument vector (quoting already
/// resolved by whoever split it) that only goes through variable-reference
/// scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A raw command string, e.g. `curl -X POST https://example.com -d '{}'`.
    Raw(String),
    /// A pre-tokenized argument vector, e.g. `["-X", "POST", "https://example.com"]`.
    Args(Vec<String>),
}

impl Command {
    /// Converts the command into the token stream the rest of the pipeline
    /// consumes.
    pub fn into_tokens(self) -> Result<Vec<Token>, TokenizerError> {
        match self {
            Command::Raw(input) => tokenize(&input),
            Command::Args(args) => Ok(tokens_from_args(&args)),
        }
    }
}

impl From<&str> for Command {
    fn from(input: &str) -> Self {
        Command::Raw(input.to_string())
    }
}

impl From<String> for Command {
    fn from(input: String) -> Self {
        Command::Raw(input)
    }
}

impl From<Vec<String>> for Command {
    fn from(args: Vec<String>) -> Self {
        Command::Args(args)
    }
}

impl From<&[String]> for Command {
    fn from(args: &[String]) -> Self {
        Command::Args(args.to_vec())
    }
}

impl From<Vec<&str>> for Command {
    fn from(args: Vec<&str>) -> Self {
        Command::Args(args.into_iter().map(str::to_string).collect())
    }
}
