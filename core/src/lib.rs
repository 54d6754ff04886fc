//! Client-side protocol core for term RPC over HTTP.
//!
//! # Overview
//! Turns a logical call (version, module, function, arguments) into a signed,
//! optionally compressed `HttpRequest`, and turns an `HttpResponse` back into
//! the call's value or a precisely classified error. The caller executes the
//! HTTP round-trip (host-does-IO pattern), so everything here is a pure,
//! synchronous computation over its inputs.
//!
//! # Design
//! - `RpcClient` is stateless: it holds a read-only `ClientConfig` and the
//!   `SymbolTable` used for safe decoding, and may be shared across threads.
//! - `build_call` produces the request, `parse_response` classifies the
//!   response; the I/O boundary sits between them.
//! - `signing` is kept standalone so the receiving peer can reproduce the
//!   canonical signing string exactly (see `signing::verify`).
//! - Errors form closed enums; nothing is reported as an opaque error.

pub mod client;
pub mod codec;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod signing;
pub mod types;

pub use client::{ResponseOutcome, RpcClient};
pub use codec::{SymbolTable, TERM_MEDIA_TYPE};
pub use config::{Authentication, ClientConfig};
pub use error::{
    DecodeError, InflateError, RemoteException, RequestError, ResponseError, SignatureError,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use types::{Call, Reply, Term};
