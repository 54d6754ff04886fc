//! A mock peer for term RPC.
//!
//! # Design
//! Mirrors what a real server does with a call produced by `termrpc-core`:
//! authenticate (Basic or signature), negotiate content, decode the argument
//! list, dispatch, and reply with a `success`/`exception` term. Protocol
//! failures are answered with plain bodies and no content-type so that the
//! client maps them through its status table; an arity mismatch is answered
//! with a structured error term.

pub mod functions;

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{
        header::{CONTENT_ENCODING, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    response::Response,
    routing::post,
    Router,
};
use termrpc_core::codec::{self, SymbolTable, TERM_MEDIA_TYPE};
use termrpc_core::content::{self, ContentEncoding, ContentType, COMPRESSION_THRESHOLD, GZIP};
use termrpc_core::http::find_header;
use termrpc_core::{signing, Authentication, InflateError, SignatureError, Term};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const SUPPORTED_VERSION: &str = "1";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub authentication: Authentication,
    pub decode_unsafe_terms: bool,
    /// Largest accepted body, before and after decompression. Inflation
    /// stops once this is exceeded.
    pub max_body_bytes: usize,
    pub symbols: SymbolTable,
}

impl ServerConfig {
    pub fn new(authentication: Authentication) -> Self {
        Self {
            authentication,
            decode_unsafe_terms: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            symbols: SymbolTable::new(),
        }
    }
}

type Shared = Arc<ServerConfig>;

pub fn app(config: ServerConfig) -> Router {
    Router::new()
        .route("/{version}/{module}/{function}/{arity}", post(call))
        .with_state(Arc::new(config))
}

pub async fn run(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

async fn call(
    State(config): State<Shared>,
    Path((version, module, function, arity)): Path<(String, String, String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = header_pairs(&headers);
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let gzip_ok = content::accepts(find_header(&headers, "accept-encoding"), GZIP);

    if let Err(err) = authenticate(&config, method.as_str(), target, &headers, &body) {
        warn!(%err, path = %target, "rejected call");
        return plain(StatusCode::UNAUTHORIZED, &err.to_string());
    }

    let is_term = find_header(&headers, "content-type")
        .and_then(ContentType::parse)
        .is_some_and(|ct| ct.is(TERM_MEDIA_TYPE));
    if !is_term {
        return plain(StatusCode::UNSUPPORTED_MEDIA_TYPE, "expected a term body");
    }
    if !content::accepts(find_header(&headers, "accept"), TERM_MEDIA_TYPE) {
        return plain(StatusCode::NOT_ACCEPTABLE, "caller does not accept terms");
    }
    if body.len() > config.max_body_bytes {
        return plain(StatusCode::PAYLOAD_TOO_LARGE, "body too large");
    }

    let body = match ContentEncoding::from_header(find_header(&headers, "content-encoding")) {
        ContentEncoding::Identity => body.to_vec(),
        ContentEncoding::Gzip => match content::gzip_decode(&body, config.max_body_bytes) {
            Ok(inflated) => inflated,
            Err(InflateError::TooLarge(_)) => {
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "inflated body too large")
            }
            Err(InflateError::Corrupt(_)) => {
                return plain(StatusCode::BAD_REQUEST, "corrupt gzip body")
            }
        },
        ContentEncoding::Unknown(_) => {
            return plain(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported content-encoding")
        }
    };

    let args = match codec::decode_term(&body, config.decode_unsafe_terms, &config.symbols) {
        Ok(Term::List(args)) => args,
        Ok(_) => return plain(StatusCode::BAD_REQUEST, "arguments must be a list"),
        Err(err) => return plain(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    if version != SUPPORTED_VERSION {
        return plain(StatusCode::NOT_FOUND, "unsupported version");
    }
    if arity.parse::<usize>().ok() != Some(args.len()) {
        let error = Term::Tuple(vec![Term::atom("error"), Term::atom("badarity")]);
        return term_response(StatusCode::BAD_REQUEST, error, gzip_ok);
    }

    match functions::dispatch(&module, &function, &args) {
        Some(reply) => {
            debug!(%module, %function, arity = args.len(), "call handled");
            term_response(StatusCode::OK, reply.into_term(), gzip_ok)
        }
        None => {
            info!(%module, %function, %arity, "unknown function");
            plain(StatusCode::NOT_FOUND, "no such function")
        }
    }
}

fn authenticate(
    config: &ServerConfig,
    method: &str,
    target: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<(), SignatureError> {
    match &config.authentication {
        Authentication::Basic { username, password } => {
            signing::verify_basic(headers, username, password)
        }
        Authentication::Signature { key } => {
            signing::verify(headers, method, target, key.as_bytes(), body)
        }
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// A bare body with no content-type.
fn plain(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response
}

fn term_response(status: StatusCode, term: Term, gzip_ok: bool) -> Response {
    let encoded = match codec::encode_term(&term) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!(%err, "reply failed to encode");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "reply failed to encode");
        }
    };

    let mut compressed = false;
    let body = if gzip_ok && encoded.len() > COMPRESSION_THRESHOLD {
        match content::gzip_encode(&encoded) {
            Ok(packed) => {
                compressed = true;
                packed
            }
            Err(_) => encoded,
        }
    } else {
        encoded
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TERM_MEDIA_TYPE));
    if compressed {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(GZIP));
    }
    response
}
