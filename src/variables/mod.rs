//! Variable substitution for curl commands.
//!
//! Replaces `$NAME` and `${NAME}` references in token values with entries
//! from a caller-supplied map. The process environment is never consulted:
//! command strings frequently originate from documentation or user input and
//! must not be able to exfiltrate secrets by naming arbitrary environment
//! variables. Callers who want environment values build an explicit snapshot
//! with [`vars_from_env`].
//!
//! Replacements are spliced in verbatim and never re-scanned, so a value
//! containing `$OTHER` stays literal and expansion cannot loop.

use crate::command::tokenizer::{Segment, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Finite substitution map handed to [`expand_tokens`].
pub type VarMap = HashMap<String, String>;

/// Matches `$NAME` (longest identifier run) or `${NAME}` (any non-`}` run).
static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:([A-Za-z_][A-Za-z0-9_]*)|\{([^}]*)\})").expect("variable pattern compiles")
});

/// Placeholder for a `$` that must stay literal (escaped or single-quoted).
/// Private-use codepoint, swapped back after reference scanning.
pub(crate) const ESCAPED_DOLLAR: char = '\u{E000}';

/// Errors that can occur during variable expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpanderError {
    /// A referenced variable has no entry in the substitution map.
    Undefined(String),
}

impl std::fmt::Display for ExpanderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpanderError::Undefined(name) => write!(f, "undefined variable: {}", name),
        }
    }
}

impl std::error::Error for ExpanderError {}

fn unmark(text: &str) -> String {
    text.replace(ESCAPED_DOLLAR, "$")
}

/// Splits marked text (literal dollars already replaced by the placeholder)
/// into literal and variable segments.
pub(crate) fn split_marked(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for cap in VARIABLE_REGEX.captures_iter(raw) {
        let whole = cap.get(0).expect("match has a whole group");
        if whole.start() > last {
            segments.push(Segment::Literal(unmark(&raw[last..whole.start()])));
        }
        let name = cap
            .get(1)
            .or_else(|| cap.get(2))
            .map(|g| g.as_str())
            .unwrap_or("");
        segments.push(Segment::Variable(unmark(name)));
        last = whole.end();
    }
    if last < raw.len() || segments.is_empty() {
        segments.push(Segment::Literal(unmark(&raw[last..])));
    }
    segments
}

/// Splits a plain string into segments, honoring the `\$` escape.
pub(crate) fn split_escaped(text: &str) -> Vec<Segment> {
    let marked = text.replace("\\$", &ESCAPED_DOLLAR.to_string());
    split_marked(&marked)
}

/// Expands every variable reference in the token stream.
///
/// Each replacement is a pure string splice; the spliced text is not
/// re-scanned, which makes a second pass over already-expanded tokens a
/// no-op. Tokens of kind [`TokenKind::Variable`] become plain values.
///
/// # Errors
///
/// [`ExpanderError::Undefined`] when a referenced name is missing from the
/// map. Callers wanting pass-through must supply empty strings explicitly.
pub fn expand_tokens(tokens: Vec<Token>, vars: &VarMap) -> Result<Vec<Token>, ExpanderError> {
    tokens
        .into_iter()
        .map(|token| expand_token(token, vars))
        .collect()
}

fn expand_token(token: Token, vars: &VarMap) -> Result<Token, ExpanderError> {
    if token.literal().is_some() {
        // Already fully literal; nothing to splice.
        return Ok(token);
    }
    let mut value = String::new();
    for segment in &token.segments {
        match segment {
            Segment::Literal(text) => value.push_str(text),
            Segment::Variable(name) => {
                let replacement = vars
                    .get(name)
                    .ok_or_else(|| ExpanderError::Undefined(name.clone()))?;
                value.push_str(replacement);
            }
        }
    }
    let kind = match token.kind {
        TokenKind::Variable => TokenKind::Value,
        other => other,
    };
    Ok(Token::literal_token(kind, value))
}

/// Builds a substitution map from named process-environment variables.
///
/// This is the explicit "environment snapshot" escape hatch: only the names
/// listed by the caller are looked up, and absent variables are simply
/// omitted from the map (a later reference to them still fails as
/// undefined).
pub fn vars_from_env<I, S>(names: I) -> VarMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut vars = VarMap::new();
    for name in names {
        let name = name.as_ref();
        if let Ok(value) = std::env::var(name) {
            vars.insert(name.to_string(), value);
        }
    }
    vars
}
