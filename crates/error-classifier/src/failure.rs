use std::fmt;

use serde_json::Value;

/// A failed API request, discriminated where the failure is first captured.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The server answered with a non-success status.
    Response {
        status: u16,
        /// Parsed JSON body, `Value::String` for a non-JSON body,
        /// `Value::Null` when the body was empty or unavailable.
        body: Value,
    },
    /// The request was sent but nothing came back (network down, timeout).
    NoResponse,
    /// The request could not be built or sent.
    Setup { message: String },
}

impl Failure {
    /// Build a response failure from a status and raw body bytes.
    pub fn response(status: u16, body: &[u8]) -> Self {
        Self::Response {
            status,
            body: parse_body(body),
        }
    }

    /// Build a setup failure.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Capture a transport error raised by `reqwest`.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::setup(err.to_string());
        }

        if let Some(status) = err.status() {
            return Self::Response {
                status: status.as_u16(),
                body: Value::Null,
            };
        }

        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            return Self::NoResponse;
        }

        Self::setup(err.to_string())
    }

    /// Capture a non-success HTTP response, reading its body.
    ///
    /// A body that cannot be read is treated as empty.
    pub async fn from_http_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        Self::response(status, &body)
    }

    /// Status code of a response failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(&err)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response { status, .. } => write!(f, "server responded with status {status}"),
            Self::NoResponse => f.write_str("no response received"),
            Self::Setup { message } => write!(f, "request setup failed: {message}"),
        }
    }
}

fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(body).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_parses_json_body() {
        let failure = Failure::response(400, br#"{"detail": "nope"}"#);
        assert_eq!(
            failure,
            Failure::Response {
                status: 400,
                body: json!({"detail": "nope"})
            }
        );
    }

    #[test]
    fn test_response_keeps_plain_text_body() {
        let failure = Failure::response(502, b"Bad Gateway");
        assert_eq!(
            failure,
            Failure::Response {
                status: 502,
                body: Value::String("Bad Gateway".to_owned())
            }
        );
    }

    #[test]
    fn test_response_empty_body_is_null() {
        assert_eq!(
            Failure::response(404, b"  \n"),
            Failure::Response {
                status: 404,
                body: Value::Null
            }
        );
    }

    #[test]
    fn test_builder_error_is_setup_failure() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .expect_err("relative url must not build");
        assert!(matches!(Failure::from(err), Failure::Setup { .. }));
    }

    #[tokio::test]
    async fn test_connect_error_is_no_response() {
        // Nothing listens on the discard port.
        let err = reqwest::get("http://127.0.0.1:9/")
            .await
            .expect_err("connection must be refused");
        assert_eq!(Failure::from(err), Failure::NoResponse);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Failure::setup("boom").to_string(),
            "request setup failed: boom"
        );
        assert_eq!(Failure::response(500, b"").status(), Some(500));
        assert_eq!(Failure::NoResponse.status(), None);
    }
}
