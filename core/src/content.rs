//! Content negotiation helpers shared by the encoder, the decoder and the
//! peer: gzip, `content-encoding` resolution and `content-type` parsing.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::InflateError;

pub const GZIP: &str = "gzip";
pub const IDENTITY: &str = "identity";

/// Bodies strictly larger than this are compressed before sending.
pub const COMPRESSION_THRESHOLD: usize = 300;

pub fn gzip_encode(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Inflate a gzip body, refusing to produce more than `limit` bytes.
pub fn gzip_decode(bytes: &[u8], limit: usize) -> Result<Vec<u8>, InflateError> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(InflateError::TooLarge(limit));
    }
    Ok(out)
}

/// How a body was encoded for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Unknown(String),
}

impl ContentEncoding {
    /// An absent header means identity.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return ContentEncoding::Identity;
        };
        let token = value.trim();
        if token.eq_ignore_ascii_case(IDENTITY) {
            ContentEncoding::Identity
        } else if token.eq_ignore_ascii_case(GZIP) {
            ContentEncoding::Gzip
        } else {
            ContentEncoding::Unknown(value.to_string())
        }
    }
}

/// A parsed `content-type` header: the media type and any attribute tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: String,
    pub attributes: Vec<String>,
}

impl ContentType {
    /// Split on `;`, space, CR and LF, dropping empty tokens. Returns `None`
    /// when nothing is left.
    pub fn parse(value: &str) -> Option<Self> {
        let mut tokens = value
            .split(|c: char| matches!(c, ';' | ' ' | '\r' | '\n'))
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        let media_type = tokens.next()?;
        Some(Self {
            media_type,
            attributes: tokens.collect(),
        })
    }

    pub fn is(&self, media_type: &str) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type)
    }
}

/// True when an `accept` or `accept-encoding` style header lists `token`
/// (or a wildcard).
pub fn accepts(header: Option<&str>, token: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    header.split(',').any(|item| {
        let item = item.split(';').next().unwrap_or("").trim();
        item == "*" || item == "*/*" || item.eq_ignore_ascii_case(token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_restores_input() {
        let input = b"hello hello hello hello".repeat(20);
        let packed = gzip_encode(&input).unwrap();
        assert_ne!(packed, input);
        assert_eq!(gzip_decode(&packed, input.len()).unwrap(), input);
    }

    #[test]
    fn gzip_decode_rejects_garbage() {
        let err = gzip_decode(b"definitely not gzip", 1024).unwrap_err();
        assert!(matches!(err, InflateError::Corrupt(_)));
    }

    #[test]
    fn gzip_decode_stops_at_limit() {
        let packed = gzip_encode(&vec![0u8; 8 * 1024 * 1024]).unwrap();
        assert!(packed.len() < 64 * 1024);

        let err = gzip_decode(&packed, 1024 * 1024).unwrap_err();
        assert!(matches!(err, InflateError::TooLarge(limit) if limit == 1024 * 1024));
        assert_eq!(gzip_decode(&packed, 8 * 1024 * 1024).unwrap().len(), 8 * 1024 * 1024);
    }

    #[test]
    fn encoding_resolution() {
        assert_eq!(ContentEncoding::from_header(None), ContentEncoding::Identity);
        assert_eq!(
            ContentEncoding::from_header(Some("identity")),
            ContentEncoding::Identity
        );
        assert_eq!(ContentEncoding::from_header(Some(" GZIP ")), ContentEncoding::Gzip);
        assert_eq!(
            ContentEncoding::from_header(Some("br")),
            ContentEncoding::Unknown("br".to_string())
        );
    }

    #[test]
    fn content_type_with_attributes() {
        let parsed = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(parsed.media_type, "text/plain");
        assert_eq!(parsed.attributes, vec!["charset=utf-8".to_string()]);
        assert!(parsed.is("TEXT/PLAIN"));
    }

    #[test]
    fn content_type_of_separators_only_is_invalid() {
        assert_eq!(ContentType::parse(" ;\r\n; "), None);
        assert_eq!(ContentType::parse(""), None);
    }

    #[test]
    fn accept_lists() {
        assert!(accepts(Some("gzip, deflate"), "gzip"));
        assert!(accepts(Some("text/html;q=0.9, */*"), "application/x-termrpc-bincode"));
        assert!(!accepts(Some("br"), "gzip"));
        assert!(!accepts(None, "gzip"));
    }
}
