//! Request executor.
//!
//! Drives a materialized [`HttpRequest`] through an injected [`HttpClient`]
//! with retry, body buffering, and cooperative cancellation. The executor is
//! blocking and strictly sequential: one attempt at a time, a cancellable
//! sleep between attempts, and no internal concurrency.

pub mod cancellation;

pub use cancellation::{CancelReason, CancellationToken};

use crate::models::{Headers, HttpRequest, RequestPayload, Response};
use crate::options::RetryConfig;
use log::{debug, warn};
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Statuses retried when `retry_on_http` is empty.
pub const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// The transport capability: one blocking exchange per call.
///
/// Implementations are shared across calls (typical transports pool
/// connections) and must be safe to call from multiple threads; the executor
/// itself performs no locking around them.
pub trait HttpClient: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

/// What the transport hands back: status line, headers, and an unread body
/// stream. The response wrapper takes care of reading it at most once.
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    /// Final URL after any transport-followed redirects.
    pub url: String,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Errors surfaced by [`HttpClient`] implementations.
#[derive(Debug)]
pub enum TransportError {
    /// The exchange was interrupted by cancellation.
    Cancelled,
    /// A configured deadline passed mid-exchange.
    Timeout,
    /// Connecting to the host (or proxy) failed.
    Connect(String),
    /// TLS setup or verification failed.
    Tls(String),
    /// Any other transport-level failure.
    Network(String),
    /// The request could not be turned into a wire request (bad header
    /// bytes, unusable URL).
    InvalidRequest(String),
}

impl TransportError {
    /// Cancellation and deadline conditions are terminal: the executor never
    /// retries them.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TransportError::Cancelled | TransportError::Timeout)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Cancelled => write!(f, "request cancelled"),
            TransportError::Timeout => write!(f, "request deadline exceeded"),
            TransportError::Connect(msg) => write!(f, "connection failed: {}", msg),
            TransportError::Tls(msg) => write!(f, "TLS error: {}", msg),
            TransportError::Network(msg) => write!(f, "network error: {}", msg),
            TransportError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors produced by the retry loop.
#[derive(Debug)]
pub enum ExecError {
    /// Buffering a streaming request body failed before the first attempt.
    BodyRead(io::Error),
    /// The cancellation token fired (or the transport reported
    /// cancellation/deadline). `attempt` counts attempts performed so far.
    Cancelled { attempt: u32, reason: CancelReason },
    /// The final attempt failed at the transport level.
    Transport {
        attempts: u32,
        source: TransportError,
    },
    /// Retries were configured and the final attempt still returned a
    /// retry-worthy status; the final response is attached.
    RetryExhausted { attempts: u32, response: Box<Response> },
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::BodyRead(e) => write!(f, "failed to read request body: {}", e),
            ExecError::Cancelled { attempt, reason } => {
                write!(f, "request {} after {} attempt(s)", reason, attempt)
            }
            ExecError::Transport { attempts, source } => {
                write!(f, "request failed after {} attempt(s): {}", attempts, source)
            }
            ExecError::RetryExhausted { attempts, response } => write!(
                f,
                "retries exhausted after {} attempt(s); last status {}",
                attempts,
                response.status()
            ),
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::BodyRead(e) => Some(e),
            ExecError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Whether `status` warrants another attempt under the given status list
/// (empty list selects [`DEFAULT_RETRY_STATUSES`]).
pub fn should_retry(status: u16, retry_on_http: &[u16]) -> bool {
    if retry_on_http.is_empty() {
        DEFAULT_RETRY_STATUSES.contains(&status)
    } else {
        retry_on_http.contains(&status)
    }
}

/// Executes `request` through `client`, retrying per `retry`.
///
/// The request body is buffered into an owned byte buffer before the first
/// attempt, so every attempt sends identical bytes; response bodies of
/// non-final attempts are drained and dropped before the next attempt. With
/// `retry` absent, responses are never considered retry-worthy and a single
/// attempt is made.
pub fn execute(
    mut request: HttpRequest,
    retry: Option<&RetryConfig>,
    context: &CancellationToken,
    client: &dyn HttpClient,
) -> Result<Response, ExecError> {
    let started = Instant::now();

    if let Some(reason) = context.reason() {
        return Err(ExecError::Cancelled { attempt: 0, reason });
    }

    // Buffer the body once; the buffer outlives every attempt.
    if let Some(payload) = request.body.take() {
        let bytes = match payload {
            RequestPayload::Bytes(bytes) => bytes,
            RequestPayload::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map_err(ExecError::BodyRead)?;
                buf
            }
        };
        request.body = Some(RequestPayload::Bytes(bytes));
    }

    let max_retries = retry.map(|r| r.max_retries).unwrap_or(0);
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            if let Some(reason) = context.reason() {
                return Err(ExecError::Cancelled { attempt, reason });
            }
        }
        debug!(
            "sending {} {} (attempt {}/{})",
            request.method,
            request.url,
            attempt + 1,
            max_retries + 1
        );
        match client.send(&request) {
            Err(source) if source.is_cancellation() => {
                let reason = match source {
                    TransportError::Timeout => CancelReason::DeadlineExceeded,
                    _ => CancelReason::Cancelled,
                };
                return Err(ExecError::Cancelled {
                    attempt: attempt + 1,
                    reason,
                });
            }
            Err(source) => {
                if attempt < max_retries {
                    warn!("attempt {} failed: {}; retrying", attempt + 1, source);
                    pause(retry, attempt, context).map_err(|reason| ExecError::Cancelled {
                        attempt: attempt + 1,
                        reason,
                    })?;
                    attempt += 1;
                    continue;
                }
                return Err(ExecError::Transport {
                    attempts: attempt + 1,
                    source,
                });
            }
            Ok(raw) => {
                let retry_worthy = retry
                    .map(|r| should_retry(raw.status, &r.retry_on_http))
                    .unwrap_or(false);
                if !retry_worthy {
                    return Ok(into_response(raw, attempt + 1, started.elapsed()));
                }
                if attempt < max_retries {
                    warn!(
                        "attempt {} returned retryable status {}; retrying",
                        attempt + 1,
                        raw.status
                    );
                    drain(raw.body);
                    pause(retry, attempt, context).map_err(|reason| ExecError::Cancelled {
                        attempt: attempt + 1,
                        reason,
                    })?;
                    attempt += 1;
                    continue;
                }
                return Err(ExecError::RetryExhausted {
                    attempts: attempt + 1,
                    response: Box::new(into_response(raw, attempt + 1, started.elapsed())),
                });
            }
        }
    }
}

fn into_response(raw: RawResponse, attempts: u32, elapsed: Duration) -> Response {
    Response::new(
        raw.status,
        raw.status_text,
        raw.headers,
        raw.url,
        raw.body,
        attempts,
        elapsed,
    )
}

/// Cancellable inter-attempt sleep: the configured fixed delay, or
/// exponential backoff `100ms · 2^attempt` capped at 5s.
fn pause(
    retry: Option<&RetryConfig>,
    attempt: u32,
    context: &CancellationToken,
) -> Result<(), CancelReason> {
    let delay = retry
        .and_then(|r| r.delay)
        .unwrap_or_else(|| backoff_delay(attempt));
    debug!("sleeping {:?} before retry", delay);
    context.sleep(delay)
}

fn backoff_delay(attempt: u32) -> Duration {
    let doubled = BACKOFF_BASE.saturating_mul(1u32 << attempt.min(16));
    doubled.min(BACKOFF_CAP)
}

/// Reads a non-final response body to EOF and drops it, releasing the
/// underlying connection before the next attempt.
fn drain(mut body: Box<dyn Read + Send>) {
    let _ = io::copy(&mut body, &mut io::sink());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    enum Outcome {
        Status(u16),
        Fail(TransportError),
    }

    /// Scripted `HttpClient` stub that records every request body it sees.
    struct StubClient {
        script: Mutex<VecDeque<Outcome>>,
        bodies: Mutex<Vec<Option<Vec<u8>>>>,
        drained: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl StubClient {
        fn new(script: Vec<Outcome>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                bodies: Mutex::new(Vec::new()),
                drained: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.bodies.lock().unwrap().len()
        }
    }

    /// Body reader that flips a flag once fully consumed.
    struct TrackedBody {
        inner: Cursor<Vec<u8>>,
        done: Arc<AtomicBool>,
    }

    impl Read for TrackedBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            if n == 0 {
                self.done.store(true, Ordering::SeqCst);
            }
            Ok(n)
        }
    }

    impl HttpClient for StubClient {
        fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
            self.bodies
                .lock()
                .unwrap()
                .push(request.body_bytes().map(|b| b.to_vec()));
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Outcome::Status(200));
            match outcome {
                Outcome::Fail(e) => Err(e),
                Outcome::Status(status) => {
                    let done = Arc::new(AtomicBool::new(false));
                    self.drained.lock().unwrap().push(done.clone());
                    Ok(RawResponse {
                        status,
                        status_text: String::new(),
                        headers: Headers::new(),
                        url: request.url.clone(),
                        body: Box::new(TrackedBody {
                            inner: Cursor::new(format!("status {}", status).into_bytes()),
                            done,
                        }),
                    })
                }
            }
        }
    }

    fn request_with_body(bytes: &[u8]) -> HttpRequest {
        let mut request = HttpRequest::new(HttpMethod::POST, "https://example.com/");
        request.body = Some(RequestPayload::Bytes(bytes.to_vec()));
        request
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            delay: Some(Duration::from_millis(1)),
            retry_on_http: Vec::new(),
        }
    }

    #[test]
    fn test_single_success() {
        let client = StubClient::new(vec![Outcome::Status(200)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let response = execute(request, None, &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.attempts(), 1);
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_error_status_without_retry_config_is_returned() {
        let client = StubClient::new(vec![Outcome::Status(503)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let response = execute(request, None, &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 503);
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_retry_until_success_with_identical_bodies() {
        let client = StubClient::new(vec![
            Outcome::Status(503),
            Outcome::Status(503),
            Outcome::Status(200),
        ]);
        let request = request_with_body(b"payload");
        let retry = fast_retry(2);
        let mut response =
            execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.attempts(), 3);
        assert_eq!(client.calls(), 3);
        assert_eq!(response.bytes().unwrap(), b"status 200");

        let bodies = client.bodies.lock().unwrap();
        assert!(bodies.iter().all(|b| b.as_deref() == Some(&b"payload"[..])));
    }

    #[test]
    fn test_exactly_max_retries_plus_one_attempts() {
        let client = StubClient::new(vec![
            Outcome::Status(503),
            Outcome::Status(503),
            Outcome::Status(503),
        ]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let retry = fast_retry(2);
        let err = execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap_err();

        match err {
            ExecError::RetryExhausted { attempts, response } => {
                assert_eq!(attempts, 3);
                assert_eq!(response.status(), 503);
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn test_non_final_response_bodies_are_drained() {
        let client = StubClient::new(vec![Outcome::Status(503), Outcome::Status(200)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let retry = fast_retry(1);
        let response =
            execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 200);

        let drained = client.drained.lock().unwrap();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].load(Ordering::SeqCst), "503 body must be drained");
        assert!(!drained[1].load(Ordering::SeqCst), "final body is left unread");
    }

    #[test]
    fn test_custom_retry_statuses_replace_defaults() {
        let retry = RetryConfig {
            max_retries: 1,
            delay: Some(Duration::from_millis(1)),
            retry_on_http: vec![418],
        };

        // 500 is not in the custom list, so it is returned as-is.
        let client = StubClient::new(vec![Outcome::Status(500)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let response =
            execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 500);
        assert_eq!(client.calls(), 1);

        // 418 is, so it retries.
        let client = StubClient::new(vec![Outcome::Status(418), Outcome::Status(200)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let response =
            execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn test_transport_error_retried_then_success() {
        let client = StubClient::new(vec![
            Outcome::Fail(TransportError::Connect("refused".to_string())),
            Outcome::Status(200),
        ]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let retry = fast_retry(1);
        let response =
            execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn test_transport_error_exhausts_attempts() {
        let client = StubClient::new(vec![
            Outcome::Fail(TransportError::Network("reset".to_string())),
            Outcome::Fail(TransportError::Network("reset".to_string())),
        ]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let retry = fast_retry(1);
        let err = execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap_err();
        match err {
            ExecError::Transport { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(source, TransportError::Network(_)));
            }
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_before_dispatch_reaches_no_client() {
        let client = StubClient::new(vec![Outcome::Status(200)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let context = CancellationToken::new();
        context.cancel();

        let err = execute(request, None, &context, &client).unwrap_err();
        assert!(matches!(
            err,
            ExecError::Cancelled {
                attempt: 0,
                reason: CancelReason::Cancelled
            }
        ));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_transport_cancellation_is_never_retried() {
        let client = StubClient::new(vec![Outcome::Fail(TransportError::Cancelled)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let retry = fast_retry(5);
        let err = execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { attempt: 1, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_transport_deadline_maps_to_deadline_reason() {
        let client = StubClient::new(vec![Outcome::Fail(TransportError::Timeout)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let err = execute(request, None, &CancellationToken::new(), &client).unwrap_err();
        assert!(matches!(
            err,
            ExecError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }

    #[test]
    fn test_cancel_interrupts_backoff_sleep() {
        let client = StubClient::new(vec![Outcome::Status(503), Outcome::Status(200)]);
        let request = HttpRequest::new(HttpMethod::GET, "https://example.com/");
        let retry = RetryConfig {
            max_retries: 1,
            delay: Some(Duration::from_secs(30)),
            retry_on_http: Vec::new(),
        };
        let context = CancellationToken::new();
        let firing = context.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            firing.cancel();
        });

        let started = Instant::now();
        let err = execute(request, Some(&retry), &context, &client).unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, ExecError::Cancelled { attempt: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_streaming_body_is_buffered_once() {
        let client = StubClient::new(vec![Outcome::Status(503), Outcome::Status(200)]);
        let mut request = HttpRequest::new(HttpMethod::POST, "https://example.com/");
        request.body = Some(RequestPayload::Reader(Box::new(Cursor::new(
            b"stream once".to_vec(),
        ))));
        let retry = fast_retry(1);
        let response =
            execute(request, Some(&retry), &CancellationToken::new(), &client).unwrap();
        assert_eq!(response.status(), 200);

        let bodies = client.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(bodies.iter().all(|b| b.as_deref() == Some(&b"stream once"[..])));
    }

    #[test]
    fn test_backoff_delay_caps_at_five_seconds() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
        assert_eq!(backoff_delay(6), Duration::from_secs(5));
        assert_eq!(backoff_delay(30), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_default_set() {
        for status in DEFAULT_RETRY_STATUSES {
            assert!(should_retry(status, &[]));
        }
        assert!(!should_retry(200, &[]));
        assert!(!should_retry(404, &[]));
        assert!(should_retry(404, &[404]));
        assert!(!should_retry(500, &[404]));
    }
}
