//! Error types for the protocol core.
//!
//! # Design
//! `ResponseError` is a closed union: every way a response can fail to yield
//! a value has exactly one variant, and the only catch-all is `Http`. Local
//! failures keep the original bytes for diagnosis. A remote exception is a
//! separate type because, depending on configuration, it is either wrapped in
//! `ResponseError::RemoteException` or propagated to the caller directly.

use thiserror::Error;

use crate::types::Term;

/// An exception raised by the peer while executing the call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("remote {class} exception: {reason}")]
pub struct RemoteException {
    pub class: Term,
    pub reason: Term,
    pub trace: Term,
}

/// Classified failures of a single response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    #[error("bad request: {}", lossy(.0))]
    BadRequest(Vec<u8>),

    #[error("unauthorized: {}", lossy(.0))]
    Unauthorized(Vec<u8>),

    #[error("forbidden: {}", lossy(.0))]
    Forbidden(Vec<u8>),

    #[error("not found: {}", lossy(.0))]
    NotFound(Vec<u8>),

    #[error("not acceptable: {}", lossy(.0))]
    NotAcceptable(Vec<u8>),

    #[error("payload too large: {}", lossy(.0))]
    PayloadTooLarge(Vec<u8>),

    #[error("unsupported media type: {}", lossy(.0))]
    UnsupportedMediaType(Vec<u8>),

    #[error("internal server error: {}", lossy(.0))]
    InternalError(Vec<u8>),

    /// Any status without a dedicated variant, and malformed 200 responses.
    #[error("HTTP {status}: {}", lossy(.body))]
    Http { status: u16, body: Vec<u8> },

    /// The content-type header was present but held no media type.
    #[error("HTTP {status}: invalid content-type {raw:?}")]
    InvalidContentType { status: u16, raw: String },

    #[error("HTTP {status}: unknown content-type {raw:?}")]
    UnknownContentType { status: u16, raw: String },

    #[error("HTTP {status}: unknown content-encoding {raw:?}")]
    UnknownContentEncoding { status: u16, raw: String },

    #[error("HTTP {status}: undecodable body ({} bytes)", .raw.len())]
    UndecodableBody { status: u16, raw: Vec<u8> },

    /// A structured error term sent by the peer with a non-200 status.
    #[error("HTTP {status}: peer error {term}")]
    Peer { status: u16, term: Term },

    #[error(transparent)]
    RemoteException(RemoteException),
}

impl ResponseError {
    /// Map a status code and an opaque body through the fixed status table.
    pub fn from_status(status: u16, body: Vec<u8>) -> Self {
        match status {
            400 => ResponseError::BadRequest(body),
            401 => ResponseError::Unauthorized(body),
            403 => ResponseError::Forbidden(body),
            404 => ResponseError::NotFound(body),
            406 => ResponseError::NotAcceptable(body),
            413 => ResponseError::PayloadTooLarge(body),
            415 => ResponseError::UnsupportedMediaType(body),
            500 => ResponseError::InternalError(body),
            status => ResponseError::Http { status, body },
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Failures while building a request. None occur for well-formed input.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("argument encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("body compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("endpoint is not a valid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Failures of the term codec.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed term: {0}")]
    Malformed(#[from] bincode::error::DecodeError),

    #[error("{0} trailing bytes after term")]
    TrailingBytes(usize),

    #[error("refusing to introduce unknown symbol {0:?}")]
    UnsafeSymbol(String),

    #[error("term nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Failures while inflating a gzip body.
#[derive(Debug, Error)]
pub enum InflateError {
    #[error("corrupt gzip body: {0}")]
    Corrupt(#[from] std::io::Error),

    #[error("inflated body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Failures while producing or checking an HTTP signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("invalid signing key")]
    InvalidKey,

    #[error("missing authorization header")]
    MissingAuthorization,

    #[error("malformed authorization header")]
    MalformedAuthorization,

    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("signature does not cover {0:?}")]
    Uncovered(&'static str),

    #[error("signed header {0:?} is missing")]
    MissingHeader(String),

    #[error("digest does not match body")]
    DigestMismatch,

    #[error("signature mismatch")]
    Mismatch,

    #[error("credentials mismatch")]
    BadCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        let body = b"oops".to_vec();
        let cases: [(u16, fn(Vec<u8>) -> ResponseError); 8] = [
            (400, ResponseError::BadRequest),
            (401, ResponseError::Unauthorized),
            (403, ResponseError::Forbidden),
            (404, ResponseError::NotFound),
            (406, ResponseError::NotAcceptable),
            (413, ResponseError::PayloadTooLarge),
            (415, ResponseError::UnsupportedMediaType),
            (500, ResponseError::InternalError),
        ];
        for (status, variant) in cases {
            assert_eq!(ResponseError::from_status(status, body.clone()), variant(body.clone()));
        }
    }

    #[test]
    fn unlisted_status_is_http() {
        assert_eq!(
            ResponseError::from_status(418, b"teapot".to_vec()),
            ResponseError::Http {
                status: 418,
                body: b"teapot".to_vec()
            }
        );
    }

    #[test]
    fn display_includes_body_text() {
        let err = ResponseError::from_status(404, b"no such function".to_vec());
        assert_eq!(err.to_string(), "not found: no such function");
    }
}
