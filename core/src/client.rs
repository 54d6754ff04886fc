//! Stateless request encoder and response decoder for term RPC calls.
//!
//! # Design
//! `RpcClient` holds only its configuration and the symbol table used for
//! safe decoding, and carries no mutable state between calls. A call is
//! split into `build_call`, which produces an `HttpRequest`, and
//! `parse_response`, which consumes the `HttpResponse`. The caller executes
//! the HTTP round-trip in between, keeping this core deterministic and free
//! of I/O.
//!
//! Request headers are prepended as they are produced. Each step sees the
//! headers added before it, so the signature covers the digest and the
//! content-encoding of the body actually sent.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use crate::codec::{self, SymbolTable, DECODE_LIMIT, TERM_MEDIA_TYPE};
use crate::config::{Authentication, ClientConfig};
use crate::content::{self, ContentEncoding, ContentType, COMPRESSION_THRESHOLD, GZIP};
use crate::error::{RemoteException, RequestError, ResponseError};
use crate::http::{find_header, normalize_headers, Headers, HttpMethod, HttpRequest, HttpResponse};
use crate::signing;
use crate::types::{Call, Reply, Term};

/// Everything but unreserved characters is escaped in path segments.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The value of a call, or the classified reason there is none.
pub type ResponseOutcome = Result<Term, ResponseError>;

/// What the body of a response turned out to be.
enum Content {
    /// The decoded term and the inflated bytes it was read from.
    Term(Term, Vec<u8>),
    Raw(Vec<u8>),
}

/// Synchronous, stateless client for term RPC.
#[derive(Debug, Clone)]
pub struct RpcClient {
    config: ClientConfig,
    base_url: String,
    symbols: SymbolTable,
}

impl RpcClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_symbols(config, SymbolTable::new())
    }

    pub fn with_symbols(config: ClientConfig, symbols: SymbolTable) -> Self {
        let base_url = config.endpoint.trim_end_matches('/').to_string();
        Self {
            config,
            base_url,
            symbols,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_call(&self, call: &Call) -> Result<HttpRequest, RequestError> {
        let encoded = codec::encode_args(&call.args)?;
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.base_url,
            escape(&call.version),
            escape(&call.module),
            escape(&call.function),
            call.arity()
        );

        let mut headers: Headers = vec![
            ("accept".to_string(), TERM_MEDIA_TYPE.to_string()),
            ("accept-encoding".to_string(), GZIP.to_string()),
            ("content-type".to_string(), TERM_MEDIA_TYPE.to_string()),
        ];

        let compressed = encoded.len() > COMPRESSION_THRESHOLD;
        let body = if compressed {
            headers.insert(0, ("content-encoding".to_string(), GZIP.to_string()));
            content::gzip_encode(&encoded)?
        } else {
            encoded
        };

        let method = HttpMethod::Post;
        match &self.config.authentication {
            Authentication::Basic { username, password } => {
                headers.insert(
                    0,
                    (
                        "authorization".to_string(),
                        signing::basic_authorization(username, password),
                    ),
                );
            }
            Authentication::Signature { key } => {
                headers.insert(0, ("digest".to_string(), signing::digest(&body)));
                let target = signing::request_target(&url)
                    .ok_or_else(|| RequestError::InvalidUrl(url.clone()))?;
                let authorization =
                    signing::sign(&headers, method.as_str(), &target, key.as_bytes())?;
                headers.insert(0, ("authorization".to_string(), authorization));
            }
        }

        debug!(
            module = %call.module,
            function = %call.function,
            arity = call.arity(),
            body_len = body.len(),
            compressed,
            "built call request"
        );

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Classify a response.
    ///
    /// The inner result is the call's value or its `ResponseError`. The outer
    /// `Err` is only produced when `rethrow_remote_exceptions` is set and the
    /// peer raised; callers propagate it with `?` like a local error.
    pub fn parse_response(
        &self,
        response: &HttpResponse,
    ) -> Result<ResponseOutcome, RemoteException> {
        let status = response.status;
        let headers = normalize_headers(&response.headers);
        let content = self.decode_content(status, &headers, &response.body);

        if status != 200 {
            let outcome = match content {
                Ok(Content::Term(term, _)) => ResponseError::Peer { status, term },
                Ok(Content::Raw(body)) => ResponseError::from_status(status, body),
                Err(err) => err,
            };
            debug!(status, error = %outcome, "call failed");
            return Ok(Err(outcome));
        }

        let (term, raw) = match content {
            Ok(Content::Term(term, body)) => (term, body),
            Ok(Content::Raw(body)) => {
                warn!("success response without a term body");
                return Ok(Err(ResponseError::Http { status, body }));
            }
            Err(err) => return Ok(Err(err)),
        };

        match Reply::from_term(term) {
            Some(Reply::Success(value)) => {
                debug!(status, "call succeeded");
                Ok(Ok(value))
            }
            Some(Reply::Exception(exception)) if self.config.rethrow_remote_exceptions => {
                debug!(class = %exception.class, "rethrowing remote exception");
                Err(exception)
            }
            Some(Reply::Exception(exception)) => {
                debug!(class = %exception.class, "remote exception");
                Ok(Err(ResponseError::RemoteException(exception)))
            }
            None => {
                warn!("success response is neither a success nor an exception");
                Ok(Err(ResponseError::UndecodableBody { status, raw }))
            }
        }
    }

    /// Resolve content-encoding, then content-type. Headers are already
    /// lower-cased.
    ///
    /// `UndecodableBody` carries the bytes handed to the step that failed:
    /// the body as received when it does not inflate, and the inflated body
    /// when it is not a term or not a reply.
    fn decode_content(
        &self,
        status: u16,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<Content, ResponseError> {
        let body = match ContentEncoding::from_header(find_header(headers, "content-encoding")) {
            ContentEncoding::Identity => body.to_vec(),
            ContentEncoding::Gzip => content::gzip_decode(body, DECODE_LIMIT).map_err(|err| {
                warn!(status, %err, "response body failed to decompress");
                ResponseError::UndecodableBody {
                    status,
                    raw: body.to_vec(),
                }
            })?,
            ContentEncoding::Unknown(raw) => {
                warn!(status, encoding = %raw, "unknown content-encoding");
                return Err(ResponseError::UnknownContentEncoding { status, raw });
            }
        };

        let Some(raw) = find_header(headers, "content-type") else {
            return Ok(Content::Raw(body));
        };
        let Some(content_type) = ContentType::parse(raw) else {
            warn!(status, "invalid content-type");
            return Err(ResponseError::InvalidContentType {
                status,
                raw: raw.to_string(),
            });
        };
        if !content_type.is(TERM_MEDIA_TYPE) {
            warn!(status, media_type = %content_type.media_type, "unknown content-type");
            return Err(ResponseError::UnknownContentType {
                status,
                raw: content_type.media_type,
            });
        }

        match codec::decode_term(&body, self.config.decode_unsafe_terms, &self.symbols) {
            Ok(term) => Ok(Content::Term(term, body)),
            Err(err) => {
                warn!(status, %err, "response term failed to decode");
                Err(ResponseError::UndecodableBody { status, raw: body })
            }
        }
    }
}

fn escape(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
