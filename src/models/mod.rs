//! Core data structures: headers, materialized requests, and responses.

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::{HttpMethod, HttpRequest, RequestPayload, TransportConfig};
pub use response::{DecodeError, Response};
