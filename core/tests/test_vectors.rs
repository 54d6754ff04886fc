//! Verify signing and response classification against JSON test vectors
//! stored in `test-vectors/`.
//!
//! The signing vectors pin the canonical string and the full authorization
//! value byte for byte, since the receiving peer must reproduce both. The
//! response vectors cover raw (non-term) bodies and negotiation failures.

use termrpc_core::signing;
use termrpc_core::{Authentication, ClientConfig, HttpResponse, ResponseError, RpcClient};

fn pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn client() -> RpcClient {
    RpcClient::new(ClientConfig {
        endpoint: "http://localhost:3000".to_string(),
        authentication: Authentication::Basic {
            username: "u".to_string(),
            password: "p".to_string(),
        },
        rethrow_remote_exceptions: false,
        decode_unsafe_terms: false,
    })
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

#[test]
fn signing_test_vectors() {
    let raw = include_str!("../../test-vectors/signing.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let headers = pairs(&case["headers"]);
        let method = case["method"].as_str().unwrap();
        let target = case["target"].as_str().unwrap();
        let key = case["key"].as_str().unwrap().as_bytes();

        let names = signing::signed_header_names(&headers);
        let expected_names: Vec<String> = case["expected_names"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n.as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, expected_names, "{name}: names");

        let text = signing::signing_string(&names, &headers, method, target).unwrap();
        assert_eq!(
            text,
            case["expected_signing_string"].as_str().unwrap(),
            "{name}: signing string"
        );

        let authorization = signing::sign(&headers, method, target, key).unwrap();
        assert_eq!(
            authorization,
            case["expected_authorization"].as_str().unwrap(),
            "{name}: authorization"
        );
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status = case["status"].as_u64().unwrap() as u16;
        let body = case["body"].as_str().unwrap().as_bytes().to_vec();
        let response = HttpResponse {
            status,
            headers: pairs(&case["headers"]),
            body: body.clone(),
        };

        let err = c
            .parse_response(&response)
            .unwrap()
            .expect_err(&format!("{name}: expected an error"));
        let expected_status = case["expected_status"].as_u64().map(|s| s as u16);
        let expected_raw = case["expected_raw"].as_str();

        match (case["expected_error"].as_str().unwrap(), err) {
            ("BadRequest", ResponseError::BadRequest(b))
            | ("Unauthorized", ResponseError::Unauthorized(b))
            | ("Forbidden", ResponseError::Forbidden(b))
            | ("NotFound", ResponseError::NotFound(b))
            | ("NotAcceptable", ResponseError::NotAcceptable(b))
            | ("PayloadTooLarge", ResponseError::PayloadTooLarge(b))
            | ("UnsupportedMediaType", ResponseError::UnsupportedMediaType(b))
            | ("InternalError", ResponseError::InternalError(b)) => {
                assert_eq!(b, body, "{name}: body");
            }
            ("Http", ResponseError::Http { status, body: b }) => {
                assert_eq!(Some(status), expected_status, "{name}: status");
                assert_eq!(b, body, "{name}: body");
            }
            ("UnknownContentEncoding", ResponseError::UnknownContentEncoding { status, raw })
            | ("InvalidContentType", ResponseError::InvalidContentType { status, raw })
            | ("UnknownContentType", ResponseError::UnknownContentType { status, raw }) => {
                assert_eq!(Some(status), expected_status, "{name}: status");
                assert_eq!(Some(raw.as_str()), expected_raw, "{name}: raw");
            }
            ("UndecodableBody", ResponseError::UndecodableBody { status, raw }) => {
                assert_eq!(Some(status), expected_status, "{name}: status");
                let expected = expected_raw.map(|r| r.as_bytes().to_vec()).unwrap_or(body);
                assert_eq!(raw, expected, "{name}: raw");
            }
            (expected, other) => panic!("{name}: expected {expected}, got {other:?}"),
        }
    }
}
