//! Request payload deserialization and validation.
//!
//! [`ValidatedJson`] is an axum extractor that reads the body,
//! deserializes it, and runs the payload's [`Validate`] impl. Every
//! failure is mapped onto the error taxonomy so handlers only ever see
//! valid input:
//!
//! - body over `server.max_request_size_bytes` -> `PAYLOAD_TOO_LARGE`
//! - empty or `null` body -> `MISSING_EXPECTED_CONTENT`
//! - unparsable JSON -> `MALFORMED_REQUEST`
//! - JSON of the wrong shape -> `TYPE_CONVERSION_ERROR`
//! - field constraint violations -> the payload's own errors, all at once
//!
//! Handlers that want the raw bytes use [`RequestBody`], which applies
//! the same body-limit mapping.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::api_error::{ApiError, ApiException, CoreApiError};

pub trait Validate {
    /// Every constraint violation; empty when the value is valid.
    fn validate(&self) -> Vec<ApiError>;
}

/// `true` when `value` is absent or only whitespace.
#[must_use]
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Map a failure to buffer the body onto the error taxonomy.
///
/// `DefaultBodyLimit` surfaces as a 413 rejection whether the client sent
/// `Content-Length` or a chunked body.
pub fn body_rejection(rejection: &BytesRejection) -> ApiException {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiException::new(CoreApiError::PayloadTooLarge)
            .with_message("request body exceeds the configured limit")
            .with_log_detail("rejection", rejection.body_text())
    } else {
        ApiException::new(CoreApiError::MalformedRequest)
            .with_message(format!("failed to read request body: {rejection}"))
    }
}

/// The buffered request body, subject to the configured size limit.
#[derive(Debug, Clone)]
pub struct RequestBody(pub Bytes);

impl<S> FromRequest<S> for RequestBody
where
    S: Send + Sync,
{
    type Rejection = ApiException;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Bytes::from_request(req, state)
            .await
            .map(RequestBody)
            .map_err(|e| body_rejection(&e))
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiException;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let RequestBody(body) = RequestBody::from_request(req, state).await?;
        parse_and_validate(&body).map(ValidatedJson)
    }
}

pub fn parse_and_validate<T>(body: &[u8]) -> Result<T, ApiException>
where
    T: DeserializeOwned + Validate,
{
    let trimmed = body.trim_ascii();
    if trimmed.is_empty() || trimmed == b"null" {
        return Err(ApiException::new(CoreApiError::MissingExpectedContent)
            .with_message("request body is empty"));
    }

    let value: T = serde_json::from_slice(body).map_err(|e| {
        let error = match e.classify() {
            Category::Data => CoreApiError::TypeConversionError,
            Category::Io | Category::Syntax | Category::Eof => CoreApiError::MalformedRequest,
        };
        ApiException::new(error).with_message(format!("could not deserialize request body: {e}"))
    })?;

    let violations = value.validate();
    if violations.is_empty() {
        Ok(value)
    } else {
        Err(ApiException::from_errors(violations).with_message("request body failed validation"))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::api_error::ProjectApiError;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: Option<String>,
    }

    impl Validate for Named {
        fn validate(&self) -> Vec<ApiError> {
            if is_blank(self.name.as_deref()) {
                vec![ProjectApiError::ExampleErrorBadInputVal1.into()]
            } else {
                Vec::new()
            }
        }
    }

    fn names(err: &ApiException) -> Vec<&'static str> {
        err.errors().iter().map(|e| e.name).collect()
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some(" \t\n ")));
        assert!(!is_blank(Some("x")));
    }

    #[test]
    fn empty_body_is_missing_content() {
        let err = parse_and_validate::<Named>(b"  ").unwrap_err();
        assert_eq!(names(&err), ["MISSING_EXPECTED_CONTENT"]);
    }

    #[test]
    fn null_body_is_missing_content() {
        for body in [&b"null"[..], b" null\n"] {
            let err = parse_and_validate::<Named>(body).unwrap_err();
            assert_eq!(names(&err), ["MISSING_EXPECTED_CONTENT"]);
        }
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = parse_and_validate::<Named>(b"{\"name\":").unwrap_err();
        assert_eq!(names(&err), ["MALFORMED_REQUEST"]);
    }

    #[test]
    fn wrong_shape_is_type_conversion() {
        let err = parse_and_validate::<Named>(b"{\"name\": 5}").unwrap_err();
        assert_eq!(names(&err), ["TYPE_CONVERSION_ERROR"]);
    }

    #[test]
    fn violations_are_reported() {
        let err = parse_and_validate::<Named>(b"{\"name\": \"  \"}").unwrap_err();
        assert_eq!(names(&err), ["EXAMPLE_ERROR_BAD_INPUT_VAL_1"]);
    }

    #[test]
    fn valid_body_passes() {
        let named = parse_and_validate::<Named>(b"{\"name\": \"x\", \"extra\": 1}").unwrap();
        assert_eq!(named.name.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        use axum::extract::DefaultBodyLimit;
        use axum::http;
        use axum::routing::post;
        use axum::Router;
        use tower::ServiceExt;

        async fn echo(RequestBody(body): RequestBody) -> String {
            body.len().to_string()
        }

        let app = Router::new()
            .route("/", post(echo))
            .layer(DefaultBodyLimit::max(8));

        let small = http::Request::post("/").body(axum::body::Body::from("1234")).unwrap();
        let response = app.clone().oneshot(small).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let large = http::Request::post("/")
            .body(axum::body::Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = app.oneshot(large).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(response.headers().contains_key("error_uid"));
    }
}
