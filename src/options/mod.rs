//! Normalized request description.
//!
//! [`RequestOptions`] is what the flag resolver produces and what
//! `execute` consumes: a finalized, immutable record of everything a curl
//! invocation asked for. The request builder later materializes it into a
//! concrete [`crate::models::HttpRequest`].

use crate::executor::cancellation::CancellationToken;
use crate::models::Headers;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Request body, at most one variant active per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    /// No body.
    None,
    /// Raw bytes, sent as-is (`-d` family; chunks already joined).
    Raw(Vec<u8>),
    /// Key/value pairs, percent-encoded and joined by the builder.
    UrlEncodedForm(Vec<(String, String)>),
    /// Multipart form (`-F`), assembled per RFC 7578 by the builder.
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Whether any body variant is active.
    pub fn is_present(&self) -> bool {
        !matches!(self, RequestBody::None)
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::None
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartPart {
    /// Field name.
    pub name: String,
    /// File name announced in the part's `Content-Disposition`, for `@file`
    /// fields or an explicit `;filename=` annotation.
    pub filename: Option<String>,
    /// Part `Content-Type` from a `;type=` annotation.
    pub content_type: Option<String>,
    /// Part contents.
    pub data: Vec<u8>,
}

/// Retry policy (`--retry`, `--retry-delay`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Fixed delay between attempts. `None` selects exponential backoff
    /// (100ms doubling, capped at 5s).
    pub delay: Option<Duration>,
    /// Status codes that trigger a retry. Empty selects the default set
    /// {429, 500, 502, 503, 504}.
    pub retry_on_http: Vec<u16>,
}

impl RetryConfig {
    /// Policy with `max_retries` extra attempts, backoff delays, and the
    /// default retryable status set.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: None,
            retry_on_http: Vec::new(),
        }
    }
}

/// Response decompression behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// Advertise `gzip, deflate, br` and decompress transparently
    /// (`--compressed`).
    Auto,
    /// Leave the response body as the server sent it.
    None,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

/// The normalized description of one curl invocation.
///
/// Produced by the flag resolver (or built directly by callers that bypass
/// command parsing) and treated as immutable afterwards: retries never
/// mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Explicit method (`-X`). When unset, the builder derives GET, or POST
    /// if a body is present, or HEAD for `-I`.
    pub method: Option<String>,
    /// Target URL; exactly one per invocation.
    pub url: String,
    /// User headers in command-line order, duplicate names preserved.
    pub headers: Headers,
    /// Query pairs to append to the URL (`--url-query`, `-G` + `-d`).
    /// Values are stored already encoded; the builder joins them verbatim.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
    /// Cookie pairs (`-b`), joined into one `Cookie` header by the builder.
    pub cookies: Vec<(String, String)>,
    /// Basic credentials (`-u user:pass`).
    pub basic_auth: Option<(String, String)>,
    /// Bearer token (`--oauth2-bearer`).
    pub bearer_token: Option<String>,
    /// Follow redirects (`-L`).
    pub follow_redirects: bool,
    /// Redirect cap (`--max-redirs`).
    pub max_redirects: u32,
    /// Skip TLS verification (`-k`).
    pub insecure_tls: bool,
    /// CA bundle path (`--cacert`).
    pub ca_bundle: Option<PathBuf>,
    /// Client certificate and key paths (`--cert` / `--key`).
    pub client_cert: Option<(PathBuf, PathBuf)>,
    /// Proxy URL (`-x`).
    pub proxy: Option<String>,
    /// Decompression behavior (`--compressed`).
    pub compression: Compression,
    /// Total deadline (`--max-time`).
    pub timeout: Option<Duration>,
    /// Connection-phase deadline (`--connect-timeout`).
    pub connect_timeout: Option<Duration>,
    /// Retry policy (`--retry`, `--retry-delay`).
    pub retry: Option<RetryConfig>,
    /// `-o` target, recorded for the caller; the library never writes files.
    pub output: Option<String>,
    /// `-i` was given. Informational, no effect on the wire.
    pub include_headers: bool,
    /// `-s` was given. Informational.
    pub silent: bool,
    /// `-v` was given. Informational.
    pub verbose: bool,
    /// Cancellation signal, injected by the caller rather than by flags.
    #[serde(skip)]
    pub context: CancellationToken,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: None,
            url: String::new(),
            headers: Headers::new(),
            query: Vec::new(),
            body: RequestBody::None,
            cookies: Vec::new(),
            basic_auth: None,
            bearer_token: None,
            follow_redirects: false,
            max_redirects: 50,
            insecure_tls: false,
            ca_bundle: None,
            client_cert: None,
            proxy: None,
            compression: Compression::None,
            timeout: None,
            connect_timeout: None,
            retry: None,
            output: None,
            include_headers: false,
            silent: false,
            verbose: false,
            context: CancellationToken::default(),
        }
    }
}

impl RequestOptions {
    /// Options for a plain GET of `url`.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Replaces the cancellation token, consuming and returning the options.
    pub fn with_context(mut self, context: CancellationToken) -> Self {
        self.context = context;
        self
    }

    /// Replaces the retry policy, consuming and returning the options.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}
