//! Top-level error taxonomy.
//!
//! Every stage of the pipeline keeps its own error type; this enum is the
//! disjoint union the facade surfaces, with the original cause preserved
//! through [`std::error::Error::source`]. Malformed input is always an error
//! value, never a panic.

use crate::builder::BuildError;
use crate::command::TokenizerError;
use crate::executor::{CancelReason, ExecError, TransportError};
use crate::models::Response;
use crate::resolver::ResolverError;
use crate::variables::ExpanderError;
use std::io;

/// Any failure the pipeline can surface.
#[derive(Debug)]
pub enum Error {
    /// The command string could not be tokenized.
    Tokenize(TokenizerError),
    /// A variable reference could not be expanded.
    Expand(ExpanderError),
    /// The flag walk rejected the command.
    Resolve(ResolverError),
    /// The options could not be materialized into a request.
    Build(BuildError),
    /// Reading a file/stdin `@` argument (or a streaming request body)
    /// failed.
    Io { context: String, source: io::Error },
    /// The final attempt failed at the transport level.
    Transport {
        attempts: u32,
        source: TransportError,
    },
    /// The call was cancelled (caller token, or transport-reported
    /// cancellation/deadline). `attempt` counts attempts performed.
    Cancelled { attempt: u32, reason: CancelReason },
    /// Retries were configured and exhausted on retry-worthy statuses; the
    /// final response is attached.
    RetryExhausted { attempts: u32, response: Box<Response> },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Tokenize(e) => write!(f, "tokenizer error: {}", e),
            Error::Expand(e) => write!(f, "expansion error: {}", e),
            Error::Resolve(e) => write!(f, "flag error: {}", e),
            Error::Build(e) => write!(f, "request build error: {}", e),
            Error::Io { context, source } => write!(f, "I/O error ({}): {}", context, source),
            Error::Transport { attempts, source } => {
                write!(f, "request failed after {} attempt(s): {}", attempts, source)
            }
            Error::Cancelled { attempt, reason } => {
                write!(f, "request {} after {} attempt(s)", reason, attempt)
            }
            Error::RetryExhausted { attempts, response } => write!(
                f,
                "retries exhausted after {} attempt(s); last status {}",
                attempts,
                response.status()
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Tokenize(e) => Some(e),
            Error::Expand(e) => Some(e),
            Error::Resolve(e) => Some(e),
            Error::Build(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            Error::Transport { source, .. } => Some(source),
            Error::Cancelled { .. } => None,
            Error::RetryExhausted { .. } => None,
        }
    }
}

impl From<TokenizerError> for Error {
    fn from(e: TokenizerError) -> Self {
        Error::Tokenize(e)
    }
}

impl From<ExpanderError> for Error {
    fn from(e: ExpanderError) -> Self {
        Error::Expand(e)
    }
}

impl From<ResolverError> for Error {
    fn from(e: ResolverError) -> Self {
        // File read failures keep their own top-level kind.
        match e {
            ResolverError::Io { path, source } => Error::Io {
                context: path,
                source,
            },
            other => Error::Resolve(other),
        }
    }
}

impl From<BuildError> for Error {
    fn from(e: BuildError) -> Self {
        Error::Build(e)
    }
}

impl From<ExecError> for Error {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::BodyRead(source) => Error::Io {
                context: "request body".to_string(),
                source,
            },
            ExecError::Cancelled { attempt, reason } => Error::Cancelled { attempt, reason },
            ExecError::Transport { attempts, source } => Error::Transport { attempts, source },
            ExecError::RetryExhausted { attempts, response } => {
                Error::RetryExhausted { attempts, response }
            }
        }
    }
}
