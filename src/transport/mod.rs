//! Default blocking HTTP transport built on reqwest.
//!
//! One [`ReqwestTransport`] instance serves every call; a reqwest client is
//! configured per request because the transport knobs (redirect policy, TLS
//! settings, proxy, timeouts) travel with the request itself.

use crate::executor::{HttpClient, RawResponse, TransportError};
use crate::models::{Headers, HttpRequest, TransportConfig};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

/// The stock [`HttpClient`]: blocking reqwest with decompression support.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }
}

impl HttpClient for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let client = build_client(&request.transport)?;

        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut header_map = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header value: {}", e)))?;
            header_map.append(name, value);
        }

        let mut builder = client.request(method, &request.url).headers(header_map);
        if let Some(bytes) = request.body_bytes() {
            builder = builder.body(bytes.to_vec());
        }

        debug!("dispatching {} {}", request.method, request.url);
        let response = builder.send().map_err(map_send_error)?;

        let status = response.status();
        let url = response.url().to_string();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers.append(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            url,
            // reqwest's blocking response implements Read; the wrapper
            // drains it at most once.
            body: Box::new(response),
        })
    }
}

fn build_client(config: &TransportConfig) -> Result<Client, TransportError> {
    let redirect = if config.follow_redirects {
        Policy::limited(config.max_redirects as usize)
    } else {
        Policy::none()
    };

    let mut builder = Client::builder()
        .redirect(redirect)
        .timeout(config.timeout)
        .gzip(config.decompress)
        .brotli(config.decompress)
        .deflate(config.decompress);

    if let Some(connect_timeout) = config.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    if config.insecure_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(path) = &config.ca_bundle {
        let pem = std::fs::read(path)
            .map_err(|e| TransportError::Tls(format!("reading {}: {}", path.display(), e)))?;
        let certificate = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        builder = builder.add_root_certificate(certificate);
    }
    if let Some((cert_path, key_path)) = &config.client_cert {
        let cert = std::fs::read(cert_path)
            .map_err(|e| TransportError::Tls(format!("reading {}: {}", cert_path.display(), e)))?;
        let key = std::fs::read(key_path)
            .map_err(|e| TransportError::Tls(format!("reading {}: {}", key_path.display(), e)))?;
        let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        builder = builder.identity(identity);
    }
    if let Some(proxy) = &config.proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| TransportError::InvalidRequest(format!("proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

fn map_send_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}
