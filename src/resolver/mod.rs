//! Flag-semantics resolver.
//!
//! Walks the expanded token stream and produces a normalized
//! [`RequestOptions`]. curl's flag set is fixed and small, so this is a
//! hand-written walk rather than a general getopt: each flag either stands
//! alone or consumes exactly the next token, repeated flags accumulate
//! (`-H`, `-d`, `-F`, `-b`), and any token not consumed by a flag is a URL
//! candidate, of which exactly one may exist.

pub mod files;

pub use files::{DiskFileReader, FileReader, ProcessStdinReader, StdinReader};

use crate::builder::urlencode;
use crate::command::tokenizer::{Token, TokenKind};
use crate::options::{Compression, MultipartPart, RequestBody, RequestOptions, RetryConfig};
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur while resolving flags.
#[derive(Debug)]
pub enum ResolverError {
    /// A flag the resolver does not know.
    UnknownFlag(String),
    /// A flag that takes a value sat at the end of the command.
    MissingArgument(String),
    /// Zero or more than one positional URL candidate.
    UrlAmbiguous(usize),
    /// Two flags that cannot be combined (e.g. `-d` with `-F`).
    Conflict(String, String),
    /// A `-H` value without a colon.
    BadHeader(String),
    /// A flag value that does not parse (number, duration, form field).
    BadValue { flag: String, value: String },
    /// A `-b` chunk without `=` (cookie files are not supported).
    BadCookie(String),
    /// An unquoted shell control token reached the resolver.
    UnexpectedOperator(String),
    /// A token still contains a variable reference; expansion was skipped.
    UnresolvedVariable(String),
    /// `@-` was used but no stdin capability was injected.
    StdinUnavailable,
    /// Reading an `@path` argument failed.
    Io { path: String, source: io::Error },
}

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolverError::UnknownFlag(flag) => write!(f, "unknown flag: {}", flag),
            ResolverError::MissingArgument(flag) => {
                write!(f, "flag {} is missing its argument", flag)
            }
            ResolverError::UrlAmbiguous(count) => match count {
                0 => write!(f, "no URL found in command"),
                n => write!(f, "expected exactly one URL, found {}", n),
            },
            ResolverError::Conflict(a, b) => write!(f, "{} cannot be combined with {}", a, b),
            ResolverError::BadHeader(text) => write!(f, "malformed header (no colon): {}", text),
            ResolverError::BadValue { flag, value } => {
                write!(f, "invalid value for {}: {}", flag, value)
            }
            ResolverError::BadCookie(text) => write!(f, "malformed cookie pair: {}", text),
            ResolverError::UnexpectedOperator(op) => {
                write!(f, "shell operator {:?} is not part of a curl command", op)
            }
            ResolverError::UnresolvedVariable(name) => {
                write!(f, "token still references unexpanded variable: {}", name)
            }
            ResolverError::StdinUnavailable => {
                write!(f, "@- requires an injected stdin reader")
            }
            ResolverError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for ResolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolverError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Where the most recent authentication instruction came from. Later flags
/// win, matching curl's command-line-order precedence.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AuthSource {
    Basic,
    Bearer,
    Header,
}

struct Resolver<'a> {
    tokens: &'a [Token],
    index: usize,
    files: &'a dyn FileReader,
    stdin: Option<&'a dyn StdinReader>,

    options: RequestOptions,
    positionals: Vec<String>,
    data_chunks: Vec<Vec<u8>>,
    form_parts: Vec<MultipartPart>,
    data_flag: Option<String>,
    form_flag: Option<String>,
    get_query: bool,
    head: bool,
    json: bool,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
    last_auth: Option<AuthSource>,
}

/// Resolves an expanded token stream into [`RequestOptions`].
///
/// `files` serves `@path` body arguments; `stdin`, when present, serves
/// `@-`. This is the only pipeline stage that may touch the filesystem.
pub fn resolve(
    tokens: &[Token],
    files: &dyn FileReader,
    stdin: Option<&dyn StdinReader>,
) -> Result<RequestOptions, ResolverError> {
    debug!("resolving {} tokens", tokens.len());
    let mut resolver = Resolver {
        tokens,
        index: 0,
        files,
        stdin,
        options: RequestOptions::default(),
        positionals: Vec::new(),
        data_chunks: Vec::new(),
        form_parts: Vec::new(),
        data_flag: None,
        form_flag: None,
        get_query: false,
        head: false,
        json: false,
        cert: None,
        key: None,
        last_auth: None,
    };
    resolver.walk()?;
    resolver.finish()
}

impl<'a> Resolver<'a> {
    fn walk(&mut self) -> Result<(), ResolverError> {
        while self.index < self.tokens.len() {
            let token = &self.tokens[self.index];
            self.index += 1;
            if let Some(name) = token.unresolved_variable() {
                return Err(ResolverError::UnresolvedVariable(name.to_string()));
            }
            match token.kind {
                TokenKind::Operator => {
                    return Err(ResolverError::UnexpectedOperator(token.text()))
                }
                TokenKind::Flag => {
                    let flag = token.text();
                    self.apply_flag(&flag)?;
                }
                _ => self.positionals.push(token.text()),
            }
        }
        Ok(())
    }

    /// Consumes the next token as the argument of `flag`.
    fn value_of(&mut self, flag: &str) -> Result<String, ResolverError> {
        let token = self
            .tokens
            .get(self.index)
            .ok_or_else(|| ResolverError::MissingArgument(flag.to_string()))?;
        self.index += 1;
        if let Some(name) = token.unresolved_variable() {
            return Err(ResolverError::UnresolvedVariable(name.to_string()));
        }
        if token.kind == TokenKind::Operator {
            return Err(ResolverError::UnexpectedOperator(token.text()));
        }
        Ok(token.text())
    }

    fn apply_flag(&mut self, flag: &str) -> Result<(), ResolverError> {
        match flag {
            "-X" | "--request" => {
                let value = self.value_of(flag)?;
                self.options.method = Some(value.to_uppercase());
            }
            "-H" | "--header" => {
                let value = self.value_of(flag)?;
                self.add_header(&value)?;
            }
            "-d" | "--data" | "--data-ascii" => {
                let value = self.value_of(flag)?;
                let chunk = self.data_chunk(&value, true)?;
                self.push_data(flag, chunk)?;
            }
            "--data-raw" => {
                // Never reads files; a leading @ is literal.
                let value = self.value_of(flag)?;
                self.push_data(flag, value.into_bytes())?;
            }
            "--data-binary" => {
                let value = self.value_of(flag)?;
                let chunk = self.data_chunk(&value, false)?;
                self.push_data(flag, chunk)?;
            }
            "--data-urlencode" => {
                let value = self.value_of(flag)?;
                let chunk = self.urlencoded_chunk(&value)?;
                self.push_data(flag, chunk.into_bytes())?;
            }
            "--json" => {
                let value = self.value_of(flag)?;
                let chunk = self.data_chunk(&value, false)?;
                self.push_data(flag, chunk)?;
                self.json = true;
            }
            "-F" | "--form" => {
                let value = self.value_of(flag)?;
                let part = self.form_part(flag, &value)?;
                if let Some(data_flag) = &self.data_flag {
                    return Err(ResolverError::Conflict(data_flag.clone(), flag.to_string()));
                }
                self.form_flag.get_or_insert_with(|| flag.to_string());
                self.form_parts.push(part);
            }
            "-G" | "--get" => self.get_query = true,
            "-u" | "--user" => {
                let value = self.value_of(flag)?;
                let (user, pass) = match value.split_once(':') {
                    Some((user, pass)) => (user.to_string(), pass.to_string()),
                    None => (value.clone(), String::new()),
                };
                self.options.basic_auth = Some((user, pass));
                self.last_auth = Some(AuthSource::Basic);
            }
            "--oauth2-bearer" => {
                let value = self.value_of(flag)?;
                self.options.bearer_token = Some(value);
                self.last_auth = Some(AuthSource::Bearer);
            }
            "-b" | "--cookie" => {
                let value = self.value_of(flag)?;
                self.add_cookies(&value)?;
            }
            "-e" | "--referer" => {
                let value = self.value_of(flag)?;
                self.options.headers.set("Referer", value);
            }
            "-A" | "--user-agent" => {
                let value = self.value_of(flag)?;
                self.options.headers.set("User-Agent", value);
            }
            "-L" | "--location" => self.options.follow_redirects = true,
            "--max-redirs" => {
                let value = self.value_of(flag)?;
                let parsed: i64 = value
                    .parse()
                    .map_err(|_| bad_value(flag, &value))?;
                self.options.max_redirects = if parsed < 0 { u32::MAX } else { parsed as u32 };
            }
            "-k" | "--insecure" => self.options.insecure_tls = true,
            "--cacert" => {
                let value = self.value_of(flag)?;
                self.options.ca_bundle = Some(PathBuf::from(value));
            }
            "--cert" => {
                let value = self.value_of(flag)?;
                self.cert = Some(PathBuf::from(value));
            }
            "--key" => {
                let value = self.value_of(flag)?;
                self.key = Some(PathBuf::from(value));
            }
            "-x" | "--proxy" => {
                let value = self.value_of(flag)?;
                self.options.proxy = Some(value);
            }
            "--compressed" => self.options.compression = Compression::Auto,
            "-m" | "--max-time" => {
                let value = self.value_of(flag)?;
                self.options.timeout = Some(parse_seconds(flag, &value)?);
            }
            "--connect-timeout" => {
                let value = self.value_of(flag)?;
                self.options.connect_timeout = Some(parse_seconds(flag, &value)?);
            }
            "--retry" => {
                let value = self.value_of(flag)?;
                let count: u32 = value
                    .parse()
                    .map_err(|_| bad_value(flag, &value))?;
                self.retry_config().max_retries = count;
            }
            "--retry-delay" => {
                let value = self.value_of(flag)?;
                let delay = parse_seconds(flag, &value)?;
                self.retry_config().delay = Some(delay);
            }
            "--url" => {
                let value = self.value_of(flag)?;
                self.positionals.push(value);
            }
            "--url-query" => {
                let value = self.value_of(flag)?;
                let chunk = self.urlencoded_chunk(&value)?;
                self.options.query.push(chunk_to_pair(&chunk));
            }
            "-o" | "--output" => {
                let value = self.value_of(flag)?;
                self.options.output = Some(value);
            }
            "-I" | "--head" => self.head = true,
            "-i" | "--include" => self.options.include_headers = true,
            "-s" | "--silent" => self.options.silent = true,
            "-v" | "--verbose" => self.options.verbose = true,
            _ => return self.try_clustered_booleans(flag),
        }
        Ok(())
    }

    /// Expands clustered boolean shorts (`-sL`). Any non-boolean member
    /// makes the whole cluster unknown.
    fn try_clustered_booleans(&mut self, flag: &str) -> Result<(), ResolverError> {
        let cluster = flag.strip_prefix('-').unwrap_or(flag);
        let is_cluster = !flag.starts_with("--")
            && cluster.len() > 1
            && cluster.chars().all(|c| "sLkivIG".contains(c));
        if !is_cluster {
            return Err(ResolverError::UnknownFlag(flag.to_string()));
        }
        for c in cluster.chars() {
            match c {
                's' => self.options.silent = true,
                'L' => self.options.follow_redirects = true,
                'k' => self.options.insecure_tls = true,
                'i' => self.options.include_headers = true,
                'v' => self.options.verbose = true,
                'I' => self.head = true,
                'G' => self.get_query = true,
                _ => return Err(ResolverError::UnknownFlag(flag.to_string())),
            }
        }
        Ok(())
    }

    fn add_header(&mut self, text: &str) -> Result<(), ResolverError> {
        let (name, value) = text
            .split_once(':')
            .ok_or_else(|| ResolverError::BadHeader(text.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ResolverError::BadHeader(text.to_string()));
        }
        if name.eq_ignore_ascii_case("authorization") {
            self.last_auth = Some(AuthSource::Header);
        }
        self.options.headers.append(name, value.trim());
        Ok(())
    }

    fn add_cookies(&mut self, text: &str) -> Result<(), ResolverError> {
        for piece in text.split(';') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let (name, value) = piece
                .split_once('=')
                .ok_or_else(|| ResolverError::BadCookie(piece.to_string()))?;
            self.options
                .cookies
                .push((name.trim().to_string(), value.to_string()));
        }
        Ok(())
    }

    fn push_data(&mut self, flag: &str, chunk: Vec<u8>) -> Result<(), ResolverError> {
        if let Some(form_flag) = &self.form_flag {
            return Err(ResolverError::Conflict(form_flag.clone(), flag.to_string()));
        }
        self.data_flag.get_or_insert_with(|| flag.to_string());
        self.data_chunks.push(chunk);
        Ok(())
    }

    /// Resolves a `-d` family value: `@-` reads stdin, `@path` reads a file,
    /// anything else is literal. `strip_newlines` implements the `--data`
    /// behavior of dropping CR/LF from file contents; `--data-binary` keeps
    /// them.
    fn data_chunk(&mut self, value: &str, strip_newlines: bool) -> Result<Vec<u8>, ResolverError> {
        let Some(source) = value.strip_prefix('@') else {
            return Ok(value.as_bytes().to_vec());
        };
        let mut bytes = self.read_source(source)?;
        if strip_newlines {
            bytes.retain(|b| *b != b'\n' && *b != b'\r');
        }
        Ok(bytes)
    }

    /// Builds a `--data-urlencode` / `--url-query` chunk following curl's
    /// forms: `content`, `=content`, `name=content`, `@file`, `name@file`.
    fn urlencoded_chunk(&mut self, value: &str) -> Result<String, ResolverError> {
        if let Some((name, content)) = value.split_once('=') {
            let encoded = urlencode(content.as_bytes());
            return Ok(if name.is_empty() {
                encoded
            } else {
                format!("{}={}", name, encoded)
            });
        }
        if let Some((name, source)) = value.split_once('@') {
            let bytes = self.read_source(source)?;
            let encoded = urlencode(&bytes);
            return Ok(if name.is_empty() {
                encoded
            } else {
                format!("{}={}", name, encoded)
            });
        }
        Ok(urlencode(value.as_bytes()))
    }

    fn read_source(&mut self, source: &str) -> Result<Vec<u8>, ResolverError> {
        if source == "-" {
            let stdin = self.stdin.ok_or(ResolverError::StdinUnavailable)?;
            return stdin.read_all().map_err(|e| ResolverError::Io {
                path: "<stdin>".to_string(),
                source: e,
            });
        }
        self.files
            .read(Path::new(source))
            .map_err(|e| ResolverError::Io {
                path: source.to_string(),
                source: e,
            })
    }

    /// Parses a `-F` field: `name=value`, `name=@path`, with optional
    /// `;type=` / `;filename=` annotations.
    fn form_part(&mut self, flag: &str, value: &str) -> Result<MultipartPart, ResolverError> {
        let (name, rest) = value
            .split_once('=')
            .ok_or_else(|| bad_value(flag, value))?;
        let mut pieces = rest.split(';');
        let first = pieces.next().unwrap_or_default();

        let mut part = if let Some(path) = first.strip_prefix('@') {
            let data = self.read_source(path)?;
            let filename = Path::new(path)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned());
            MultipartPart {
                name: name.to_string(),
                filename,
                content_type: None,
                data,
            }
        } else {
            MultipartPart {
                name: name.to_string(),
                filename: None,
                content_type: None,
                data: first.as_bytes().to_vec(),
            }
        };

        for annotation in pieces {
            let annotation = annotation.trim();
            if let Some(content_type) = annotation.strip_prefix("type=") {
                part.content_type = Some(content_type.to_string());
            } else if let Some(filename) = annotation.strip_prefix("filename=") {
                part.filename = Some(filename.to_string());
            } else if !annotation.is_empty() {
                return Err(bad_value(flag, value));
            }
        }
        Ok(part)
    }

    fn retry_config(&mut self) -> &mut RetryConfig {
        self.options.retry.get_or_insert_with(|| RetryConfig::new(0))
    }

    fn finish(mut self) -> Result<RequestOptions, ResolverError> {
        // Exactly one URL.
        if self.positionals.len() != 1 {
            return Err(ResolverError::UrlAmbiguous(self.positionals.len()));
        }
        self.options.url = self.positionals.remove(0);

        // -G promotes accumulated data chunks into query parameters.
        if self.get_query {
            for chunk in self.data_chunks.drain(..) {
                let text = String::from_utf8(chunk).map_err(|_| ResolverError::BadValue {
                    flag: "-G".to_string(),
                    value: "<non-UTF-8 data>".to_string(),
                })?;
                self.options.query.push(chunk_to_pair(&text));
            }
        }

        if !self.form_parts.is_empty() {
            self.options.body = RequestBody::Multipart(std::mem::take(&mut self.form_parts));
        } else if !self.data_chunks.is_empty() {
            self.options.body = RequestBody::Raw(self.data_chunks.join(&b'&'));
        }

        // Default Content-Type for -d bodies; --json also defaults Accept.
        if self.json {
            if !self.options.headers.contains("content-type") {
                self.options.headers.append("Content-Type", "application/json");
            }
            if !self.options.headers.contains("accept") {
                self.options.headers.append("Accept", "application/json");
            }
        } else if matches!(self.options.body, RequestBody::Raw(_))
            && !self.options.headers.contains("content-type")
        {
            self.options
                .headers
                .append("Content-Type", "application/x-www-form-urlencoded");
        }

        if self.head && self.options.method.is_none() {
            self.options.method = Some("HEAD".to_string());
        }

        // Later auth instruction wins, per command-line order.
        match self.last_auth {
            Some(AuthSource::Basic) => {
                self.options.bearer_token = None;
                self.options.headers.remove("Authorization");
            }
            Some(AuthSource::Bearer) => {
                self.options.basic_auth = None;
                self.options.headers.remove("Authorization");
            }
            Some(AuthSource::Header) => {
                self.options.basic_auth = None;
                self.options.bearer_token = None;
            }
            None => {}
        }

        match (self.cert.take(), self.key.take()) {
            (Some(cert), Some(key)) => self.options.client_cert = Some((cert, key)),
            // A cert file may carry its own key.
            (Some(cert), None) => self.options.client_cert = Some((cert.clone(), cert)),
            (None, Some(_)) => warn!("--key given without --cert; ignored"),
            (None, None) => {}
        }

        Ok(self.options)
    }
}

fn bad_value(flag: &str, value: &str) -> ResolverError {
    ResolverError::BadValue {
        flag: flag.to_string(),
        value: value.to_string(),
    }
}

fn parse_seconds(flag: &str, value: &str) -> Result<Duration, ResolverError> {
    let seconds: f64 = value.parse().map_err(|_| bad_value(flag, value))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(bad_value(flag, value));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn chunk_to_pair(chunk: &str) -> (String, String) {
    match chunk.split_once('=') {
        Some((name, value)) => (name.to_string(), value.to_string()),
        None => (chunk.to_string(), String::new()),
    }
}
