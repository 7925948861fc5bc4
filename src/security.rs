//! HTTP Basic Auth request validation (RFC 7617).
//!
//! [`BasicAuthValidator`] holds the expected credentials and is applied
//! to protected routes through the [`require_basic_auth`] middleware.
//! Which routes are protected is decided in [`crate::server`].

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::api_error::{ApiException, CoreApiError};

#[derive(Debug, Clone)]
pub struct BasicAuthValidator {
    username: String,
    password: String,
    realm: String,
    header_value: String,
}

/// `Basic <base64(username:password)>`.
#[must_use]
pub fn encode_basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Decode an `Authorization` header value into `(username, password)`.
///
/// The scheme is matched case-insensitively; the password may contain `:`.
#[must_use]
pub fn decode_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

impl BasicAuthValidator {
    #[must_use]
    pub fn new(username: &str, password: &str, realm: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            realm: realm.to_string(),
            header_value: encode_basic_auth(username, password),
        }
    }

    /// The `Authorization` header value that passes validation.
    #[must_use]
    pub fn header_value(&self) -> &str {
        &self.header_value
    }

    pub fn validate(&self, headers: &HeaderMap) -> Result<(), ApiException> {
        let supplied = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(decode_basic_auth);

        match supplied {
            Some((user, pass)) if user == self.username && pass == self.password => Ok(()),
            Some((user, _)) => Err(self.unauthorized().with_log_detail("username", user)),
            None => Err(self.unauthorized()),
        }
    }

    fn unauthorized(&self) -> ApiException {
        ApiException::new(CoreApiError::Unauthorized)
            .with_message("basic auth validation failed")
            .with_header(
                header::WWW_AUTHENTICATE.as_str(),
                &format!("Basic realm=\"{}\"", self.realm),
            )
    }
}

pub async fn require_basic_auth(
    State(validator): State<Arc<BasicAuthValidator>>,
    request: Request,
    next: Next,
) -> Response {
    match validator.validate(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn encodes_rfc_example() {
        assert_eq!(
            encode_basic_auth("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn decodes_password_with_colon() {
        let encoded = encode_basic_auth("user", "pa:ss");
        assert_eq!(
            decode_basic_auth(&encoded),
            Some(("user".into(), "pa:ss".into()))
        );
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(decode_basic_auth("Bearer abc").is_none());
        assert!(decode_basic_auth("Basic !!!notbase64").is_none());
    }

    #[test]
    fn validator_accepts_its_own_header() {
        let validator = BasicAuthValidator::new("u", "p", "svc");
        assert!(validator.validate(&headers(validator.header_value())).is_ok());
    }

    #[test]
    fn validator_rejects_missing_and_wrong_credentials() {
        let validator = BasicAuthValidator::new("u", "p", "svc");
        assert!(validator.validate(&HeaderMap::new()).is_err());
        assert!(validator
            .validate(&headers(&encode_basic_auth("u", "wrong")))
            .is_err());
        let prefixed = format!("foo{}", validator.header_value());
        let err = validator.validate(&headers(&prefixed)).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
