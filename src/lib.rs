//! curlrun — a programmatic HTTP client whose contract is a curl command.
//!
//! Copy a curl invocation verbatim from a terminal or documentation into
//! application code and it just runs: the command is tokenized with
//! shell-aware quoting rules, variables are substituted from an explicit
//! map, curl's flag grammar is resolved into a normalized request, and the
//! request is executed with retry, body rewind, and cooperative
//! cancellation.
//!
//! # Architecture
//!
//! The pipeline, leaves first:
//!
//! - **command**: raw-string/argv input and the shell-aware tokenizer
//! - **variables**: `$NAME` / `${NAME}` expansion from a caller-supplied map
//! - **resolver**: curl flag grammar → [`RequestOptions`]
//! - **builder**: [`RequestOptions`] → concrete [`HttpRequest`]
//! - **executor**: retry loop over the injected [`HttpClient`] capability
//! - **transport**: the stock blocking reqwest client
//! - **models**: headers, requests, and the lazy-bodied [`Response`]
//!
//! # Usage
//!
//! ```no_run
//! use curlrun::vars_from_env;
//!
//! let vars = vars_from_env(["TOKEN"]);
//! let mut response = curlrun::request_with_vars(
//!     r#"curl -X POST https://api.example.com/v1/users
//!        -H "Authorization: Bearer $TOKEN"
//!        -d '{"name":"Ada"}'"#,
//!     &vars,
//! )?;
//! println!("{} {}", response.status(), response.text()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Every side effect goes through an injected capability — [`HttpClient`]
//! for the exchange, [`FileReader`] / [`StdinReader`] for `@` body
//! arguments — so the whole pipeline runs against stubs in tests.

pub mod builder;
pub mod command;
pub mod error;
pub mod executor;
pub mod models;
pub mod options;
pub mod resolver;
pub mod transport;
pub mod variables;

pub use command::Command;
pub use error::Error;
pub use executor::{CancelReason, CancellationToken, HttpClient, RawResponse, TransportError};
pub use models::{
    DecodeError, Headers, HttpMethod, HttpRequest, RequestPayload, Response, TransportConfig,
};
pub use options::{Compression, MultipartPart, RequestBody, RequestOptions, RetryConfig};
pub use resolver::{DiskFileReader, FileReader, ProcessStdinReader, StdinReader};
pub use transport::ReqwestTransport;
pub use variables::{vars_from_env, VarMap};

use std::sync::Arc;

/// Entry point holding the injected capabilities.
///
/// The default client wires the reqwest transport and the real filesystem;
/// no stdin reader is attached, so `@-` arguments fail until one is
/// injected.
#[derive(Clone)]
pub struct CurlClient {
    http: Arc<dyn HttpClient>,
    files: Arc<dyn FileReader>,
    stdin: Option<Arc<dyn StdinReader>>,
}

impl Default for CurlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CurlClient {
    /// Client with the stock transport and disk file reader.
    pub fn new() -> Self {
        Self {
            http: Arc::new(ReqwestTransport::new()),
            files: Arc::new(DiskFileReader),
            stdin: None,
        }
    }

    /// Replaces the HTTP transport.
    pub fn with_http_client(mut self, client: impl HttpClient + 'static) -> Self {
        self.http = Arc::new(client);
        self
    }

    /// Replaces the file reader serving `@path` arguments.
    pub fn with_file_reader(mut self, files: impl FileReader + 'static) -> Self {
        self.files = Arc::new(files);
        self
    }

    /// Attaches a stdin reader serving `@-` arguments.
    pub fn with_stdin_reader(mut self, stdin: impl StdinReader + 'static) -> Self {
        self.stdin = Some(Arc::new(stdin));
        self
    }

    /// Parses `command` into [`RequestOptions`] without executing it.
    ///
    /// Useful for attaching a cancellation token or adjusting the retry
    /// policy before [`CurlClient::execute`].
    pub fn options(
        &self,
        command: impl Into<Command>,
        vars: &VarMap,
    ) -> Result<RequestOptions, Error> {
        let tokens = command.into().into_tokens()?;
        let tokens = variables::expand_tokens(tokens, vars)?;
        let options = resolver::resolve(&tokens, &*self.files, self.stdin.as_deref())?;
        Ok(options)
    }

    /// Parses and executes `command` with variable substitution.
    pub fn request(
        &self,
        command: impl Into<Command>,
        vars: &VarMap,
    ) -> Result<Response, Error> {
        let options = self.options(command, vars)?;
        self.execute(options)
    }

    /// Executes an already-normalized [`RequestOptions`], bypassing the
    /// tokenizer and resolver.
    pub fn execute(&self, options: RequestOptions) -> Result<Response, Error> {
        let request = builder::build(&options)?;
        let response = executor::execute(
            request,
            options.retry.as_ref(),
            &options.context,
            &*self.http,
        )?;
        Ok(response)
    }
}

/// Runs a curl command with no variable substitution, over a default
/// [`CurlClient`].
pub fn request(command: impl Into<Command>) -> Result<Response, Error> {
    CurlClient::new().request(command, &VarMap::new())
}

/// Runs a curl command with variable substitution, over a default
/// [`CurlClient`].
pub fn request_with_vars(command: impl Into<Command>, vars: &VarMap) -> Result<Response, Error> {
    CurlClient::new().request(command, vars)
}

/// Executes pre-built [`RequestOptions`] over a default [`CurlClient`].
pub fn execute(options: RequestOptions) -> Result<Response, Error> {
    CurlClient::new().execute(options)
}
