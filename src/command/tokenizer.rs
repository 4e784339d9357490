//! Shell-aware tokenizer for curl command lines.
//!
//! Segments a command string into typed tokens, honoring POSIX-style quoting,
//! backslash escapes, line continuations, and embedded variable references.
//! Only the subset of shell lexing that curl commands actually use is
//! implemented; shell *evaluation* (expansions, substitutions, redirections)
//! is out of scope and control operators are surfaced as [`TokenKind::Operator`]
//! so later stages can reject them.

use crate::variables::{split_escaped, split_marked, ESCAPED_DOLLAR};

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A command-line switch. The token text keeps its leading dashes so the
    /// resolver can distinguish `-H` from `--header`.
    Flag,
    /// A plain value: flag arguments and URL candidates.
    Value,
    /// The unique positional value, assigned by the resolver (never emitted
    /// lexically).
    Url,
    /// A token consisting of exactly one variable reference; carries the
    /// name only. Gone after expansion.
    Variable,
    /// An unquoted shell control token (`|`, `;`, `&&`, `>` ...). The
    /// resolver rejects these.
    Operator,
}

/// One piece of a token's value: a literal run or an embedded variable
/// reference (name only, `$`/`${}` already stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

/// A single token of a curl command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub segments: Vec<Segment>,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, segments: Vec<Segment>) -> Self {
        Self { kind, segments }
    }

    /// Convenience constructor for a fully literal token.
    pub fn literal_token(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            segments: vec![Segment::Literal(value.into())],
        }
    }

    /// Returns the token text if it is fully expanded (no variable
    /// references remain), `None` otherwise.
    pub fn literal(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [] => Some(""),
            [Segment::Literal(s)] => Some(s),
            _ => None,
        }
    }

    /// Renders the token text, re-emitting unexpanded references as
    /// `${name}`. Used for diagnostics.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Variable(name) => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Name of the first unexpanded variable reference, if any.
    pub fn unresolved_variable(&self) -> Option<&str> {
        self.segments.iter().find_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Errors that can occur during tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    /// A quote opened at the given byte offset was never closed.
    UnterminatedQuote(usize),
    /// The input ends with a bare backslash.
    DanglingEscape,
}

impl std::fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenizerError::UnterminatedQuote(pos) => {
                write!(f, "unterminated quote opened at byte {}", pos)
            }
            TokenizerError::DanglingEscape => write!(f, "dangling backslash at end of input"),
        }
    }
}

impl std::error::Error for TokenizerError {}

/// Per-token lexer state, reset at every token boundary.
#[derive(Default)]
struct Pending {
    raw: String,
    active: bool,
    leading_unquoted_dash: bool,
    plain: bool,
}

impl Pending {
    fn start(&mut self) {
        if !self.active {
            self.active = true;
            self.plain = true;
        }
    }

    fn push(&mut self, ch: char) {
        self.start();
        self.raw.push(ch);
    }

    fn finish(&mut self, tokens: &mut Vec<Token>) {
        if !self.active {
            return;
        }
        let token = if self.plain && is_operator(&self.raw) {
            Token::literal_token(TokenKind::Operator, self.raw.clone())
        } else {
            let segments = split_marked(&self.raw);
            let kind = if self.leading_unquoted_dash {
                TokenKind::Flag
            } else if matches!(segments.as_slice(), [Segment::Variable(_)]) {
                TokenKind::Variable
            } else {
                TokenKind::Value
            };
            Token::new(kind, segments)
        };
        tokens.push(token);
        self.raw.clear();
        self.active = false;
        self.leading_unquoted_dash = false;
        self.plain = false;
    }
}

fn is_operator(raw: &str) -> bool {
    matches!(raw, "|" | "||" | ";" | "&" | "&&" | "<" | ">" | ">>")
}

/// Tokenizes a curl command string.
///
/// A leading `curl` word is accepted and discarded. Quoting rules:
///
/// - single quotes are fully literal (no escapes, no variable markers);
/// - double quotes recognize the escapes `\\ \" \$ \n \t \r` and keep
///   `$NAME` / `${NAME}` as embedded variable markers;
/// - unquoted backslash escapes the single following character;
/// - backslash-newline is consumed and acts as whitespace.
///
/// # Examples
///
/// ```
/// use curlrun::command::{tokenize, TokenKind};
///
/// let tokens = tokenize(r#"curl -H "Accept: text/plain" https://example.com"#).unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::Flag);
/// assert_eq!(tokens[1].literal(), Some("Accept: text/plain"));
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizerError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut pending = Pending::default();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            '\'' => {
                pending.start();
                pending.plain = false;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(TokenizerError::UnterminatedQuote(pos)),
                        Some((_, '\'')) => break,
                        Some((_, '$')) => pending.raw.push(ESCAPED_DOLLAR),
                        Some((_, c)) => pending.raw.push(*c),
                    }
                    i += 1;
                }
                i += 1;
            }
            '"' => {
                pending.start();
                pending.plain = false;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(TokenizerError::UnterminatedQuote(pos)),
                        Some((_, '"')) => break,
                        Some((_, '\\')) => {
                            let next = match chars.get(i + 1) {
                                None => return Err(TokenizerError::UnterminatedQuote(pos)),
                                Some((_, c)) => *c,
                            };
                            match next {
                                '\\' => pending.raw.push('\\'),
                                '"' => pending.raw.push('"'),
                                '$' => pending.raw.push(ESCAPED_DOLLAR),
                                'n' => pending.raw.push('\n'),
                                't' => pending.raw.push('\t'),
                                'r' => pending.raw.push('\r'),
                                // Continuation inside quotes joins the lines.
                                '\n' => {}
                                other => {
                                    pending.raw.push('\\');
                                    pending.raw.push(other);
                                }
                            }
                            i += 2;
                            continue;
                        }
                        Some((_, c)) => pending.raw.push(*c),
                    }
                    i += 1;
                }
                i += 1;
            }
            '\\' => {
                match chars.get(i + 1) {
                    None => return Err(TokenizerError::DanglingEscape),
                    // Line continuation: both characters consumed, acts as
                    // whitespace.
                    Some((_, '\n')) => {
                        pending.finish(&mut tokens);
                        i += 2;
                    }
                    Some((_, '\r')) if matches!(chars.get(i + 2), Some((_, '\n'))) => {
                        pending.finish(&mut tokens);
                        i += 3;
                    }
                    Some((_, '$')) => {
                        pending.start();
                        pending.plain = false;
                        pending.raw.push(ESCAPED_DOLLAR);
                        i += 2;
                    }
                    Some((_, c)) => {
                        pending.start();
                        pending.plain = false;
                        pending.raw.push(*c);
                        i += 2;
                    }
                }
            }
            c if c.is_whitespace() => {
                pending.finish(&mut tokens);
                i += 1;
            }
            _ => {
                if !pending.active {
                    pending.start();
                    pending.leading_unquoted_dash = ch == '-';
                }
                pending.push(ch);
                i += 1;
            }
        }
    }
    pending.finish(&mut tokens);

    discard_leading_curl(&mut tokens);
    Ok(tokens)
}

/// Builds the token stream from a pre-tokenized argument vector.
///
/// Quoting has already been resolved by whoever split the vector, so only
/// variable-reference scanning applies (`\$` still suppresses a reference).
/// A leading `curl` argument is discarded.
pub fn tokens_from_args<S: AsRef<str>>(args: &[S]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(args.len());
    for arg in args {
        let arg = arg.as_ref();
        let segments = split_escaped(arg);
        let kind = if arg.starts_with('-') {
            TokenKind::Flag
        } else if matches!(segments.as_slice(), [Segment::Variable(_)]) {
            TokenKind::Variable
        } else {
            TokenKind::Value
        };
        tokens.push(Token::new(kind, segments));
    }
    discard_leading_curl(&mut tokens);
    tokens
}

fn discard_leading_curl(tokens: &mut Vec<Token>) {
    let is_curl_word = tokens
        .first()
        .map(|t| t.kind == TokenKind::Value && t.literal() == Some("curl"))
        .unwrap_or(false);
    if is_curl_word {
        tokens.remove(0);
    }
}
