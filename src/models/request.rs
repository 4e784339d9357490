//! Materialized HTTP request values.
//!
//! An [`HttpRequest`] is the deterministic output of the request builder:
//! method, final URL, wire headers, an optional body payload, and the
//! transport knobs the client applies (redirects, TLS, proxy, timeouts).

use super::headers::Headers;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP request method.
///
/// The named variants cover the methods in RFC 7231 and RFC 5789; anything
/// else (`-X PURGE`, WebDAV verbs) is carried through as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
    TRACE,
    CONNECT,
    Custom(String),
}

impl HttpMethod {
    /// Parses a method name, uppercasing it. Never fails: unknown names
    /// become [`HttpMethod::Custom`].
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => HttpMethod::GET,
            "POST" => HttpMethod::POST,
            "PUT" => HttpMethod::PUT,
            "DELETE" => HttpMethod::DELETE,
            "PATCH" => HttpMethod::PATCH,
            "OPTIONS" => HttpMethod::OPTIONS,
            "HEAD" => HttpMethod::HEAD,
            "TRACE" => HttpMethod::TRACE,
            "CONNECT" => HttpMethod::CONNECT,
            other => HttpMethod::Custom(other.to_string()),
        }
    }

    /// Returns the wire representation of the method.
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::TRACE => "TRACE",
            HttpMethod::CONNECT => "CONNECT",
            HttpMethod::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport configuration carried alongside the request.
///
/// These knobs come from `RequestOptions` and are applied by the HTTP
/// client capability; stub clients in tests are free to ignore them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Follow 3xx redirects (`-L`).
    pub follow_redirects: bool,
    /// Redirect cap when following (`--max-redirs`).
    pub max_redirects: u32,
    /// Skip TLS certificate verification (`-k`).
    pub insecure_tls: bool,
    /// Extra CA bundle in PEM format (`--cacert`).
    pub ca_bundle: Option<PathBuf>,
    /// Client certificate and key paths (`--cert` / `--key`).
    pub client_cert: Option<(PathBuf, PathBuf)>,
    /// Proxy URL (`-x`).
    pub proxy: Option<String>,
    /// Total request deadline (`--max-time`).
    pub timeout: Option<Duration>,
    /// Connection-phase deadline (`--connect-timeout`).
    pub connect_timeout: Option<Duration>,
    /// Transparently decompress the response body (`--compressed`).
    pub decompress: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            follow_redirects: false,
            max_redirects: 50,
            insecure_tls: false,
            ca_bundle: None,
            client_cert: None,
            proxy: None,
            timeout: None,
            connect_timeout: None,
            decompress: false,
        }
    }
}

/// Request body payload.
///
/// The builder always emits `Bytes`. `Reader` exists for callers that hand
/// the executor a streaming body; the executor materializes it into an owned
/// buffer before the first attempt so every retry sends identical bytes.
pub enum RequestPayload {
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl RequestPayload {
    /// Buffered bytes, if already materialized.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestPayload::Bytes(bytes) => Some(bytes),
            RequestPayload::Reader(_) => None,
        }
    }
}

impl std::fmt::Debug for RequestPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestPayload::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestPayload::Reader(_) => write!(f, "Reader(..)"),
        }
    }
}

impl From<Vec<u8>> for RequestPayload {
    fn from(bytes: Vec<u8>) -> Self {
        RequestPayload::Bytes(bytes)
    }
}

/// A fully materialized HTTP request, ready for the executor.
#[derive(Debug)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Final URL, query string already merged.
    pub url: String,
    /// Wire headers in send order, duplicates preserved.
    pub headers: Headers,
    /// Optional body payload.
    pub body: Option<RequestPayload>,
    /// Transport knobs for the HTTP client capability.
    pub transport: TransportConfig,
}

impl HttpRequest {
    /// Creates a bodyless request with default transport settings.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            transport: TransportConfig::default(),
        }
    }

    /// Whether a body payload is attached.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// The buffered body bytes, if the payload has been materialized.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_ref().and_then(RequestPayload::as_bytes)
    }

    /// First `Content-Type` header value, if set.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}
