//! HTTP-shaped transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe requests and responses as plain data. The core
//! builds `HttpRequest` values and classifies `HttpResponse` values without
//! touching the network; the caller executes the round-trip.
//!
//! Headers are an ordered `Vec` of `(name, value)` pairs. Names are written
//! exactly as constructed and compared case-insensitively only when read,
//! with the first match winning on duplicates.

/// HTTP method for a request. Calls are always posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

pub type Headers = Vec<(String, String)>;

/// An outbound request described as plain data.
///
/// Built by `RpcClient::build_call`. The caller sends it and hands the
/// matching `HttpResponse` back to `RpcClient::parse_response`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An inbound response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Case-insensitive lookup; the first matching header wins.
pub fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Lower-case every header name, preserving order and duplicates.
pub fn normalize_headers(headers: &[(String, String)]) -> Headers {
    headers
        .iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn lookup_ignores_case() {
        let h = headers(&[("Content-Type", "a/b")]);
        assert_eq!(find_header(&h, "content-type"), Some("a/b"));
        assert_eq!(find_header(&h, "CONTENT-TYPE"), Some("a/b"));
        assert_eq!(find_header(&h, "accept"), None);
    }

    #[test]
    fn first_duplicate_wins() {
        let h = headers(&[("X-Dup", "first"), ("x-dup", "second")]);
        assert_eq!(find_header(&h, "x-dup"), Some("first"));
    }

    #[test]
    fn normalize_keeps_order_and_values() {
        let h = headers(&[("B-Header", "One"), ("a-header", "Two")]);
        assert_eq!(
            normalize_headers(&h),
            headers(&[("b-header", "One"), ("a-header", "Two")])
        );
    }
}
