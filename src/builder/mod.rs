//! Request builder.
//!
//! Deterministic materialization of [`RequestOptions`] into a concrete
//! [`HttpRequest`]: method derivation, query-string merging, body encoding
//! (raw, url-encoded form, RFC 7578 multipart), cookie joining, and late
//! synthesis of authentication headers. The one non-deterministic input is
//! the multipart boundary, drawn fresh per build.

use crate::models::{Headers, HttpMethod, HttpRequest, RequestPayload, TransportConfig};
use crate::options::{Compression, MultipartPart, RequestBody, RequestOptions};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Errors that can occur while materializing a request.
#[derive(Debug)]
pub enum BuildError {
    /// The URL could not be parsed.
    InvalidUrl(String),
    /// The URL scheme is not `http` or `https`.
    UnsupportedProtocol(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
            BuildError::UnsupportedProtocol(scheme) => {
                write!(f, "only HTTP and HTTPS are supported, got: {}", scheme)
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Percent-encodes with curl's unreserved set: everything except
/// `[A-Za-z0-9._~-]`, space becoming `%20`.
const URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn urlencode(bytes: &[u8]) -> String {
    percent_encoding::percent_encode(bytes, URLENCODE_SET).to_string()
}

/// Materializes `options` into an [`HttpRequest`].
///
/// Headers are copied verbatim, preserving order and duplicates; cookies and
/// auth are appended after them so explicit headers come first on the wire.
pub fn build(options: &RequestOptions) -> Result<HttpRequest, BuildError> {
    let url = merge_query(&options.url, &options.query)?;

    let method = match &options.method {
        Some(name) => HttpMethod::parse(name),
        None if options.body.is_present() => HttpMethod::POST,
        None => HttpMethod::GET,
    };

    let mut headers = Headers::new();
    for (name, value) in &options.headers {
        headers.append(name, value);
    }

    let body = encode_body(&options.body, &mut headers);
    if let Some(bytes) = &body {
        if !headers.contains("content-length") {
            headers.append("Content-Length", bytes.len().to_string());
        }
    }

    if !options.cookies.is_empty() {
        let joined = options
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        headers.append("Cookie", joined);
    }

    // Auth comes last: user headers keep their position, credentials are
    // appended the way curl appends its own.
    if let Some((user, pass)) = &options.basic_auth {
        let credentials = format!("{}:{}", user, pass);
        headers.append(
            "Authorization",
            format!("Basic {}", STANDARD.encode(credentials.as_bytes())),
        );
    }
    if let Some(token) = &options.bearer_token {
        headers.append("Authorization", format!("Bearer {}", token));
    }

    let decompress = options.compression == Compression::Auto;
    if decompress && !headers.contains("accept-encoding") {
        headers.append("Accept-Encoding", "gzip, deflate, br");
    }

    Ok(HttpRequest {
        method,
        url,
        headers,
        body: body.map(RequestPayload::Bytes),
        transport: TransportConfig {
            follow_redirects: options.follow_redirects,
            max_redirects: options.max_redirects,
            insecure_tls: options.insecure_tls,
            ca_bundle: options.ca_bundle.clone(),
            client_cert: options.client_cert.clone(),
            proxy: options.proxy.clone(),
            timeout: options.timeout,
            connect_timeout: options.connect_timeout,
            decompress,
        },
    })
}

/// Validates the URL and appends query pairs, preserving any existing query
/// string. Pair values arrive already encoded and are joined verbatim.
fn merge_query(url: &str, query: &[(String, String)]) -> Result<String, BuildError> {
    let parsed = url::Url::parse(url).map_err(|e| BuildError::InvalidUrl(e.to_string()))?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(BuildError::UnsupportedProtocol(scheme.to_string()));
    }

    if query.is_empty() {
        return Ok(url.to_string());
    }
    let mut out = url.to_string();
    if out.contains('?') {
        if !out.ends_with('?') && !out.ends_with('&') {
            out.push('&');
        }
    } else {
        out.push('?');
    }
    let joined = query
        .iter()
        .map(|(name, value)| {
            if value.is_empty() {
                name.clone()
            } else {
                format!("{}={}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    out.push_str(&joined);
    Ok(out)
}

fn encode_body(body: &RequestBody, headers: &mut Headers) -> Option<Vec<u8>> {
    match body {
        RequestBody::None => None,
        RequestBody::Raw(bytes) => Some(bytes.clone()),
        RequestBody::UrlEncodedForm(pairs) => {
            if !headers.contains("content-type") {
                headers.append("Content-Type", "application/x-www-form-urlencoded");
            }
            let encoded = pairs
                .iter()
                .map(|(name, value)| {
                    format!("{}={}", urlencode(name.as_bytes()), urlencode(value.as_bytes()))
                })
                .collect::<Vec<_>>()
                .join("&");
            Some(encoded.into_bytes())
        }
        RequestBody::Multipart(parts) => {
            let boundary = format!("{:032x}", rand::random::<u128>());
            if !headers.contains("content-type") {
                headers.append(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                );
            }
            Some(encode_multipart(parts, &boundary))
        }
    }
}

/// Assembles a multipart/form-data body per RFC 7578.
fn encode_multipart(parts: &[MultipartPart], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", quote(&part.name));
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", quote(filename)));
        }
        disposition.push_str("\r\n");
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;

    #[test]
    fn test_urlencode_keeps_unreserved() {
        assert_eq!(urlencode(b"a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(urlencode(b"a b&c"), "a%20b%26c");
        assert_eq!(urlencode(b"\n"), "%0A");
    }

    #[test]
    fn test_method_derivation() {
        let options = RequestOptions::for_url("https://example.com");
        assert_eq!(build(&options).unwrap().method, HttpMethod::GET);

        let mut options = RequestOptions::for_url("https://example.com");
        options.body = RequestBody::Raw(b"x".to_vec());
        assert_eq!(build(&options).unwrap().method, HttpMethod::POST);

        let mut options = RequestOptions::for_url("https://example.com");
        options.method = Some("DELETE".to_string());
        options.body = RequestBody::Raw(b"x".to_vec());
        assert_eq!(build(&options).unwrap().method, HttpMethod::DELETE);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let options = RequestOptions::for_url("not a url");
        assert!(matches!(build(&options), Err(BuildError::InvalidUrl(_))));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let options = RequestOptions::for_url("ftp://example.com");
        assert!(matches!(
            build(&options),
            Err(BuildError::UnsupportedProtocol(scheme)) if scheme == "ftp"
        ));
    }

    #[test]
    fn test_query_appended_with_question_mark() {
        let mut options = RequestOptions::for_url("https://example.com/search");
        options.query = vec![("q".to_string(), "a%20b".to_string())];
        assert_eq!(build(&options).unwrap().url, "https://example.com/search?q=a%20b");
    }

    #[test]
    fn test_query_appended_to_existing_query_string() {
        let mut options = RequestOptions::for_url("https://example.com/search?x=1");
        options.query = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        assert_eq!(
            build(&options).unwrap().url,
            "https://example.com/search?x=1&a=1&b=2"
        );
    }

    #[test]
    fn test_bare_query_key_has_no_equals() {
        let mut options = RequestOptions::for_url("https://example.com/");
        options.query = vec![("flag".to_string(), String::new())];
        assert_eq!(build(&options).unwrap().url, "https://example.com/?flag");
    }

    #[test]
    fn test_headers_copied_with_duplicates() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.headers.append("X-N", "v1");
        options.headers.append("X-N", "v2");
        let request = build(&options).unwrap();
        assert_eq!(request.headers.get_all("x-n"), vec!["v1", "v2"]);
    }

    #[test]
    fn test_raw_body_sets_content_length() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.body = RequestBody::Raw(b"hello".to_vec());
        let request = build(&options).unwrap();
        assert_eq!(request.body_bytes(), Some(&b"hello"[..]));
        assert_eq!(request.headers.get("content-length"), Some("5"));
    }

    #[test]
    fn test_explicit_content_length_not_duplicated() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.headers.append("Content-Length", "5");
        options.body = RequestBody::Raw(b"hello".to_vec());
        let request = build(&options).unwrap();
        assert_eq!(request.headers.get_all("content-length"), vec!["5"]);
    }

    #[test]
    fn test_urlencoded_form_encoding() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.body = RequestBody::UrlEncodedForm(vec![
            ("name".to_string(), "Ada Lovelace".to_string()),
            ("tag".to_string(), "a&b".to_string()),
        ]);
        let request = build(&options).unwrap();
        assert_eq!(request.body_bytes(), Some(&b"name=Ada%20Lovelace&tag=a%26b"[..]));
        assert_eq!(
            request.headers.get("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_multipart_assembly() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.body = RequestBody::Multipart(vec![
            MultipartPart {
                name: "field".to_string(),
                filename: None,
                content_type: None,
                data: b"value".to_vec(),
            },
            MultipartPart {
                name: "file".to_string(),
                filename: Some("a.png".to_string()),
                content_type: Some("image/png".to_string()),
                data: b"\x89PNG".to_vec(),
            },
        ]);
        let request = build(&options).unwrap();

        let content_type = request.headers.get("content-type").unwrap().to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        assert_eq!(boundary.len(), 32);

        let body = String::from_utf8_lossy(request.body_bytes().unwrap()).into_owned();
        assert!(body.contains(&format!("--{}\r\n", boundary)));
        assert!(body.contains("Content-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n"));
        assert!(body.contains(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n"
        ));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_fresh_boundary_per_build() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.body = RequestBody::Multipart(vec![MultipartPart {
            name: "a".to_string(),
            filename: None,
            content_type: None,
            data: Vec::new(),
        }]);
        let first = build(&options).unwrap();
        let second = build(&options).unwrap();
        assert_ne!(
            first.headers.get("content-type"),
            second.headers.get("content-type")
        );
    }

    #[test]
    fn test_cookie_header_joined() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.cookies = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        let request = build(&options).unwrap();
        assert_eq!(request.headers.get_all("cookie"), vec!["a=1; b=2"]);
    }

    #[test]
    fn test_basic_auth_header_value() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.basic_auth = Some(("alice".to_string(), "secret".to_string()));
        let request = build(&options).unwrap();
        assert_eq!(
            request.headers.get("authorization"),
            Some("Basic YWxpY2U6c2VjcmV0")
        );
    }

    #[test]
    fn test_bearer_auth_header_value() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.bearer_token = Some("tok123".to_string());
        let request = build(&options).unwrap();
        assert_eq!(request.headers.get("authorization"), Some("Bearer tok123"));
    }

    #[test]
    fn test_compressed_advertises_encodings() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.compression = Compression::Auto;
        let request = build(&options).unwrap();
        assert_eq!(
            request.headers.get("accept-encoding"),
            Some("gzip, deflate, br")
        );
        assert!(request.transport.decompress);
    }

    #[test]
    fn test_user_accept_encoding_wins_over_compressed() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.compression = Compression::Auto;
        options.headers.append("Accept-Encoding", "gzip");
        let request = build(&options).unwrap();
        assert_eq!(request.headers.get_all("accept-encoding"), vec!["gzip"]);
        // Decompression stays enabled even though the user chose the header.
        assert!(request.transport.decompress);
    }

    #[test]
    fn test_transport_settings_copied() {
        let mut options = RequestOptions::for_url("https://example.com");
        options.follow_redirects = true;
        options.max_redirects = 7;
        options.insecure_tls = true;
        options.proxy = Some("http://proxy:3128".to_string());
        let request = build(&options).unwrap();
        assert!(request.transport.follow_redirects);
        assert_eq!(request.transport.max_redirects, 7);
        assert!(request.transport.insecure_tls);
        assert_eq!(request.transport.proxy.as_deref(), Some("http://proxy:3128"));
    }
}
