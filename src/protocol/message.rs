//! Request and Response message types.
//!
//! Defines the wire format exchanged with the feed service and the codec
//! boundary the transport consumes: encode a message to UTF-8 JSON bytes,
//! decode received bytes back into a message.
//!
//! # Format
//!
//! Request (client → service, or an unsolicited push from the service):
//!
//! ```json
//! {
//!   "method": "GET",
//!   "resource": "/feeds/office/temperature",
//!   "token": "uuid",
//!   "headers": { "authorization": "BASIC ..." },
//!   "body": { ... }
//! }
//! ```
//!
//! Response:
//!
//! ```json
//! {
//!   "status": 200,
//!   "token": "uuid",
//!   "body": { ... }
//! }
//! ```
//!
//! Classification is by field presence: a frame with a `status` field is a
//! [`Response`], a frame with a `method` field is a [`Request`]. Anything else
//! is a protocol error. The transport never interprets `body` contents.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::Token;

// ============================================================================
// Request
// ============================================================================

/// A service request, or a push command received from the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request method: GET, POST, PUT, DELETE, or a push method like "cmd".
    pub method: String,

    /// Fully qualified resource path, e.g. `/feeds/office/temperature`.
    pub resource: String,

    /// Correlation token. Auto-generated unless the caller supplies one.
    ///
    /// Inbound frames may omit the field or carry `null`; a fresh token is
    /// generated so such pushes still decode and dispatch.
    #[serde(default = "Token::generate", deserialize_with = "token_or_generated")]
    pub token: Token,

    /// Request headers.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,

    /// Optional payload. Opaque to the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Request {
    /// Creates a new request with an auto-generated token.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            resource: resource.into(),
            token: Token::generate(),
            headers: Map::new(),
            body: None,
        }
    }

    /// Creates a new request with a specific token.
    #[inline]
    #[must_use]
    pub fn with_token(
        method: impl Into<String>,
        resource: impl Into<String>,
        token: Token,
    ) -> Self {
        Self {
            method: method.into(),
            resource: resource.into(),
            token,
            headers: Map::new(),
            body: None,
        }
    }

    /// Sets the request body.
    #[inline]
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a request header.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Gets a header value by case-insensitive name.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
    }
}

/// Accepts a string token or `null`, generating one when absent.
fn token_or_generated<'de, D>(deserializer: D) -> std::result::Result<Token, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Token>::deserialize(deserializer)?.unwrap_or_else(Token::generate))
}

// ============================================================================
// Response
// ============================================================================

/// A response from the feed service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Status code, HTTP-style (200, 201, 204, 404, ...).
    pub status: u16,

    /// Token of the request this answers. Absent tokens never match a call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,

    /// Resource the response refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Response headers.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,

    /// Optional payload. Opaque to the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// Creates a response with the given status and no token.
    #[inline]
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            token: None,
            resource: None,
            headers: Map::new(),
            body: None,
        }
    }

    /// Sets the correlation token.
    #[inline]
    #[must_use]
    pub fn token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the response body.
    #[inline]
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns `true` for 2xx statuses.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Extracts the body, or an [`Error::Status`] for non-success responses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for 404 and [`Error::Status`] for any other
    /// non-2xx status.
    pub fn into_body(self) -> Result<Value> {
        let resource = self.resource.unwrap_or_default();
        match self.status {
            s if (200..300).contains(&s) => Ok(self.body.unwrap_or(Value::Null)),
            404 => Err(Error::not_found(resource)),
            s => Err(Error::status(s, resource)),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A decoded inbound frame: response to one of our calls, or a push request.
#[derive(Debug, Clone)]
pub enum Message {
    /// A response carrying a `status` field.
    Response(Response),
    /// A server-initiated request carrying a `method` field.
    Request(Request),
}

impl Message {
    /// Decodes one complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::Protocol`] for
    /// an object that is neither a request nor a response.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;

        if value.get("status").is_some() {
            Ok(Self::Response(serde_json::from_value(value)?))
        } else if value.get("method").is_some() {
            Ok(Self::Request(serde_json::from_value(value)?))
        } else {
            Err(Error::protocol("frame has neither status nor method"))
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a message as one UTF-8 JSON frame.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new("GET", "/feeds/office")
            .header("authorization", "BASIC dXNlcjpwYXNz");

        let bytes = encode(&request).expect("encode");
        let json: Value = serde_json::from_slice(&bytes).expect("parse");

        assert_eq!(json["method"], "GET");
        assert_eq!(json["resource"], "/feeds/office");
        assert!(json["token"].is_string());
        assert_eq!(json["headers"]["authorization"], "BASIC dXNlcjpwYXNz");
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_request_header_lookup_case_insensitive() {
        let request = Request::new("GET", "/feeds").header("Authorization", "x");
        assert_eq!(request.get_header("authorization"), Some("x"));
        assert_eq!(request.get_header("AUTHORIZATION"), Some("x"));
        assert_eq!(request.get_header("x-apikey"), None);
    }

    #[test]
    fn test_classify_response() {
        let bytes = br#"{"status":200,"token":"t-1","body":{"name":"office"}}"#;
        let message = Message::decode(bytes).expect("decode");

        match message {
            Message::Response(response) => {
                assert_eq!(response.status, 200);
                assert_eq!(response.token, Some(Token::new("t-1")));
                assert!(response.is_success());
            }
            Message::Request(_) => panic!("classified as request"),
        }
    }

    #[test]
    fn test_classify_request() {
        let bytes = br#"{"method":"cmd","resource":"/feeds/office","token":"t-2"}"#;
        let message = Message::decode(bytes).expect("decode");

        match message {
            Message::Request(request) => {
                assert_eq!(request.method, "cmd");
                assert_eq!(request.token, Token::new("t-2"));
            }
            Message::Response(_) => panic!("classified as response"),
        }
    }

    #[test]
    fn test_push_without_token_decodes_with_generated_token() {
        // Some services omit or null the token on unsolicited commands.
        for bytes in [
            br#"{"method":"cmd","resource":"/feeds/office"}"#.as_slice(),
            br#"{"method":"cmd","resource":"/feeds/office","token":null}"#.as_slice(),
        ] {
            match Message::decode(bytes).expect("decode") {
                Message::Request(request) => {
                    assert_eq!(request.method, "cmd");
                    assert!(!request.token.as_str().is_empty());
                }
                Message::Response(_) => panic!("classified as response"),
            }
        }
    }

    #[test]
    fn test_classify_neither() {
        let bytes = br#"{"hello":"world"}"#;
        let err = Message::decode(bytes).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_malformed() {
        let err = Message::decode(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_body_preserved_through_round_trip() {
        // Representative payloads: string, integer, float, nested object.
        let body = json!({
            "name": "office",
            "count": 42,
            "reading": 21.5,
            "unit": { "label": "Celsius", "symbol": "C" }
        });

        let request = Request::new("POST", "/feeds").body(body.clone());
        let bytes = encode(&request).expect("encode");

        match Message::decode(&bytes).expect("decode") {
            Message::Request(decoded) => assert_eq!(decoded.body, Some(body)),
            Message::Response(_) => panic!("classified as response"),
        }
    }

    #[test]
    fn test_response_into_body_status_mapping() {
        let ok = Response::new(200).body(json!({"v": 1}));
        assert_eq!(ok.into_body().expect("success"), json!({"v": 1}));

        let created = Response::new(201);
        assert_eq!(created.into_body().expect("success"), Value::Null);

        let missing = Response::new(404);
        assert!(matches!(missing.into_body(), Err(Error::NotFound { .. })));

        let failed = Response::new(500);
        assert!(matches!(
            failed.into_body(),
            Err(Error::Status { status: 500, .. })
        ));
    }
}
