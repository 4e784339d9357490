//! HTTP response wrapper.
//!
//! Wraps the raw response delivered by the HTTP client capability with a
//! lazy, at-most-once body read: the underlying stream is consumed and
//! dropped the first time the body is requested, and every later call sees
//! the cached buffer. A failed read is cached too, so the stream is never
//! touched twice.

use super::headers::Headers;
use std::io::{self, Read};
use std::time::Duration;

enum BodyState {
    Pending(Box<dyn Read + Send>),
    Loaded(Vec<u8>),
    Failed(io::ErrorKind, String),
}

/// An executed HTTP response.
pub struct Response {
    status: u16,
    status_text: String,
    headers: Headers,
    url: String,
    elapsed: Duration,
    attempts: u32,
    body: BodyState,
}

impl Response {
    pub(crate) fn new(
        status: u16,
        status_text: String,
        headers: Headers,
        url: String,
        body: Box<dyn Read + Send>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            status,
            status_text,
            headers,
            url,
            elapsed,
            attempts,
            body: BodyState::Pending(body),
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Human-readable status text ("OK", "Not Found", ...). Empty when the
    /// transport did not supply one.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers in received order, duplicates preserved.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of the given response header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// First `Content-Type` header value, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Final URL of the response (after any redirects the transport
    /// followed).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wall-clock duration of the whole call, retries included.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of attempts performed to obtain this response.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is in the 3xx range.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Whether the status is in the 4xx range.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Whether the status is in the 5xx range.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    fn fill(&mut self) {
        let state = std::mem::replace(&mut self.body, BodyState::Loaded(Vec::new()));
        self.body = match state {
            BodyState::Pending(mut reader) => {
                let mut buf = Vec::new();
                match reader.read_to_end(&mut buf) {
                    Ok(_) => BodyState::Loaded(buf),
                    // The reader is dropped (closing the stream) whether the
                    // read succeeded or not; the failure is cached so the
                    // stream is never retried.
                    Err(e) => BodyState::Failed(e.kind(), e.to_string()),
                }
            }
            loaded => loaded,
        };
    }

    /// Body bytes, read from the underlying stream on first call and cached
    /// afterwards.
    pub fn bytes(&mut self) -> io::Result<&[u8]> {
        self.fill();
        match &self.body {
            BodyState::Loaded(bytes) => Ok(bytes),
            BodyState::Failed(kind, msg) => Err(io::Error::new(*kind, msg.clone())),
            BodyState::Pending(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "response body state poisoned",
            )),
        }
    }

    /// Body decoded as UTF-8 text. Invalid sequences become replacement
    /// characters rather than errors.
    pub fn text(&mut self) -> io::Result<String> {
        Ok(String::from_utf8_lossy(self.bytes()?).into_owned())
    }

    /// Deserializes the body as JSON into `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T, DecodeError> {
        let bytes = self.bytes().map_err(DecodeError::Read)?;
        serde_json::from_slice(bytes).map_err(DecodeError::Json)
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            BodyState::Pending(_) => "<unread>".to_string(),
            BodyState::Loaded(bytes) => format!("{} bytes", bytes.len()),
            BodyState::Failed(kind, _) => format!("<failed: {:?}>", kind),
        };
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("attempts", &self.attempts)
            .field("body", &body)
            .finish()
    }
}

/// Errors from the response body decoders.
#[derive(Debug)]
pub enum DecodeError {
    /// Reading the body stream failed.
    Read(io::Error),
    /// The body was not valid JSON for the target type.
    Json(serde_json::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Read(e) => write!(f, "failed to read response body: {}", e),
            DecodeError::Json(e) => write!(f, "failed to decode response body as JSON: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Read(e) => Some(e),
            DecodeError::Json(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn response_with_body(body: Box<dyn Read + Send>) -> Response {
        Response::new(
            200,
            "OK".to_string(),
            Headers::new(),
            "https://example.com/".to_string(),
            body,
            1,
            Duration::from_millis(5),
        )
    }

    /// Reader that counts how many times it is read and fails on demand.
    struct CountingReader {
        reads: Arc<AtomicUsize>,
        fail: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "boom"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_bytes_reads_once_and_caches() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader {
            reads: reads.clone(),
            fail: false,
            inner: Cursor::new(b"hello".to_vec()),
        };
        let mut response = response_with_body(Box::new(reader));

        assert_eq!(response.bytes().unwrap(), b"hello");
        let after_first = reads.load(Ordering::SeqCst);
        assert_eq!(response.bytes().unwrap(), b"hello");
        assert_eq!(reads.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn test_failed_read_is_cached() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader {
            reads: reads.clone(),
            fail: true,
            inner: Cursor::new(Vec::new()),
        };
        let mut response = response_with_body(Box::new(reader));

        assert!(response.bytes().is_err());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        // Second call reports the cached failure without touching a stream.
        let err = response.bytes().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_text_replaces_invalid_utf8() {
        let mut response = response_with_body(Box::new(Cursor::new(vec![0x68, 0x69, 0xFF])));
        assert_eq!(response.text().unwrap(), "hi\u{FFFD}");
    }

    #[test]
    fn test_json_decoding() {
        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }
        let mut response = response_with_body(Box::new(Cursor::new(b"{\"ok\":true}".to_vec())));
        let payload: Payload = response.json().unwrap();
        assert!(payload.ok);
    }

    #[test]
    fn test_json_error_on_malformed_body() {
        let mut response = response_with_body(Box::new(Cursor::new(b"not json".to_vec())));
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_status_predicates() {
        let mut ok = response_with_body(Box::new(Cursor::new(Vec::new())));
        ok.status = 204;
        assert!(ok.is_success());
        ok.status = 302;
        assert!(ok.is_redirect());
        ok.status = 404;
        assert!(ok.is_client_error());
        ok.status = 503;
        assert!(ok.is_server_error());
    }
}
