//! HTTP message signatures and Basic credentials.
//!
//! # Design
//! The canonical signing string covers every header present at signing time
//! plus the `(request-target)` pseudo-header, which binds the signature to the
//! method and path. Names are lower-cased, deduplicated and sorted; each line
//! is `name: value` with the first value for that name, trimmed. Lines are
//! joined with `\n` and the result is HMAC-SHA256'd with the shared key.
//!
//! The peer rebuilds the same string from the `headers` parameter of the
//! authorization value, so `signing_string` is shared by `sign` and `verify`.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::SignatureError;
use crate::http::find_header;

type HmacSha256 = Hmac<Sha256>;

pub const REQUEST_TARGET: &str = "(request-target)";
pub const ALGORITHM: &str = "hmac-sha256";
pub const KEY_ID: &str = "key";
pub const DIGEST_PREFIX: &str = "SHA-256=";
const DIGEST_HEADER: &str = "digest";

/// `SHA-256=<base64 sha256(body)>`, the value of the `digest` header.
pub fn digest(body: &[u8]) -> String {
    format!("{DIGEST_PREFIX}{}", STANDARD.encode(Sha256::digest(body)))
}

pub fn basic_authorization(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Path and query of `url`, taken from the URL itself.
pub fn request_target(url: &str) -> Option<String> {
    let uri: http::Uri = url.parse().ok()?;
    Some(
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
    )
}

/// Every header name (lower-cased, deduplicated) plus `(request-target)`,
/// in sorted order.
pub fn signed_header_names(headers: &[(String, String)]) -> Vec<String> {
    let mut names: BTreeSet<String> = headers
        .iter()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect();
    names.insert(REQUEST_TARGET.to_string());
    names.into_iter().collect()
}

pub fn signing_string(
    names: &[String],
    headers: &[(String, String)],
    method: &str,
    target: &str,
) -> Result<String, SignatureError> {
    let lines = names
        .iter()
        .map(|name| -> Result<String, SignatureError> {
            if name == REQUEST_TARGET {
                return Ok(format!(
                    "{REQUEST_TARGET}: {} {target}",
                    method.to_ascii_lowercase()
                ));
            }
            let value = find_header(headers, name)
                .ok_or_else(|| SignatureError::MissingHeader(name.clone()))?;
            Ok(format!("{name}: {}", value.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Produce the `authorization` value for a request carrying `headers`.
pub fn sign(
    headers: &[(String, String)],
    method: &str,
    target: &str,
    key: &[u8],
) -> Result<String, SignatureError> {
    let names = signed_header_names(headers);
    let text = signing_string(&names, headers, method, target)?;
    let signature = mac(key, &text)?.finalize().into_bytes();
    Ok(authorization_value(&[
        ("keyId", KEY_ID.to_string()),
        ("algorithm", ALGORITHM.to_string()),
        ("headers", names.join(" ")),
        ("signature", STANDARD.encode(signature)),
    ]))
}

/// `Signature k1="v1",k2="v2"`. Values are quoted but not escaped.
fn authorization_value(params: &[(&str, String)]) -> String {
    let params: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect();
    format!("Signature {}", params.join(","))
}

pub fn parse_authorization(value: &str) -> Result<Vec<(String, String)>, SignatureError> {
    let params = value
        .trim()
        .strip_prefix("Signature ")
        .ok_or(SignatureError::MalformedAuthorization)?;
    params
        .split(',')
        .map(|pair| -> Result<(String, String), SignatureError> {
            let (key, value) = pair
                .split_once('=')
                .ok_or(SignatureError::MalformedAuthorization)?;
            let value = value
                .trim()
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or(SignatureError::MalformedAuthorization)?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Check a signed request the way the receiving peer does.
///
/// The signature must cover `(request-target)` and `digest`, the digest must
/// match `body`, and the MAC is compared in constant time.
pub fn verify(
    headers: &[(String, String)],
    method: &str,
    target: &str,
    key: &[u8],
    body: &[u8],
) -> Result<(), SignatureError> {
    let authorization =
        find_header(headers, "authorization").ok_or(SignatureError::MissingAuthorization)?;
    let params = parse_authorization(authorization)?;

    let algorithm = param(&params, "algorithm")?;
    if algorithm != ALGORITHM {
        return Err(SignatureError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    let names: Vec<String> = param(&params, "headers")?
        .split(' ')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    for required in [REQUEST_TARGET, DIGEST_HEADER] {
        if !names.iter().any(|name| name == required) {
            return Err(SignatureError::Uncovered(required));
        }
    }

    let sent_digest = find_header(headers, DIGEST_HEADER)
        .ok_or_else(|| SignatureError::MissingHeader(DIGEST_HEADER.to_string()))?;
    if sent_digest.trim() != digest(body) {
        return Err(SignatureError::DigestMismatch);
    }

    let signature = STANDARD
        .decode(param(&params, "signature")?)
        .map_err(|_| SignatureError::MalformedAuthorization)?;
    let text = signing_string(&names, headers, method, target)?;
    mac(key, &text)?
        .verify_slice(&signature)
        .map_err(|_| SignatureError::Mismatch)
}

pub fn verify_basic(
    headers: &[(String, String)],
    username: &str,
    password: &str,
) -> Result<(), SignatureError> {
    let authorization =
        find_header(headers, "authorization").ok_or(SignatureError::MissingAuthorization)?;
    if authorization.trim() == basic_authorization(username, password) {
        Ok(())
    } else {
        Err(SignatureError::BadCredentials)
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Result<&'a str, SignatureError> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .ok_or(SignatureError::MalformedAuthorization)
}

fn mac(key: &[u8], text: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(text.as_bytes());
    Ok(mac)
}
