//! Application error taxonomy and the standard JSON error contract.
//!
//! Every failure that reaches a client is described by one or more
//! [`ApiError`] values. They come from two fixed enumerations:
//! [`CoreApiError`] (transport-level failures such as 401/404/405 and
//! malformed payloads) and [`ProjectApiError`] (errors owned by this
//! service). An [`ApiException`] groups them, picks the response status,
//! and renders the [`ErrorContract`] envelope:
//!
//! ```json
//! { "error_id": "…", "errors": [ { "code": "99150", "message": "…" } ] }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub name: &'static str,
    pub code: u32,
    pub message: &'static str,
    pub status: StatusCode,
    pub metadata: Metadata,
}

impl ApiError {
    #[must_use]
    pub fn new(name: &'static str, code: u32, message: &'static str, status: StatusCode) -> Self {
        Self {
            name,
            code,
            message,
            status,
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when `entry` carries this error's code and message.
    #[must_use]
    pub fn matches(&self, entry: &ErrorEntry) -> bool {
        entry.code == self.code.to_string() && entry.message == self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.code, self.status.as_u16())
    }
}

/// Errors shared by every service built from this template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreApiError {
    GenericServiceError,
    OutsideDependencyReturnedAnUnrecoverableError,
    TemporaryServiceProblem,
    GenericBadRequest,
    MissingExpectedContent,
    TypeConversionError,
    MalformedRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    UnsupportedMediaType,
    PayloadTooLarge,
}

impl CoreApiError {
    pub const ALL: &'static [Self] = &[
        Self::GenericServiceError,
        Self::OutsideDependencyReturnedAnUnrecoverableError,
        Self::TemporaryServiceProblem,
        Self::GenericBadRequest,
        Self::MissingExpectedContent,
        Self::TypeConversionError,
        Self::MalformedRequest,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::MethodNotAllowed,
        Self::UnsupportedMediaType,
        Self::PayloadTooLarge,
    ];

    #[must_use]
    pub fn api_error(self) -> ApiError {
        const GENERIC: &str = "An error occurred while fulfilling the request";
        match self {
            Self::GenericServiceError => ApiError::new(
                "GENERIC_SERVICE_ERROR",
                10,
                GENERIC,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Self::OutsideDependencyReturnedAnUnrecoverableError => ApiError::new(
                "OUTSIDE_DEPENDENCY_RETURNED_AN_UNRECOVERABLE_ERROR",
                10,
                GENERIC,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Self::TemporaryServiceProblem => ApiError::new(
                "TEMPORARY_SERVICE_PROBLEM",
                20,
                "A temporary error occurred. The request can be retried",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            Self::GenericBadRequest => ApiError::new(
                "GENERIC_BAD_REQUEST",
                30,
                "Invalid request",
                StatusCode::BAD_REQUEST,
            ),
            Self::MissingExpectedContent => ApiError::new(
                "MISSING_EXPECTED_CONTENT",
                40,
                "Missing expected content",
                StatusCode::BAD_REQUEST,
            ),
            Self::TypeConversionError => ApiError::new(
                "TYPE_CONVERSION_ERROR",
                50,
                "Type conversion error",
                StatusCode::BAD_REQUEST,
            ),
            Self::MalformedRequest => ApiError::new(
                "MALFORMED_REQUEST",
                60,
                "Malformed request",
                StatusCode::BAD_REQUEST,
            ),
            Self::Unauthorized => ApiError::new(
                "UNAUTHORIZED",
                70,
                "Unauthorized access",
                StatusCode::UNAUTHORIZED,
            ),
            Self::Forbidden => ApiError::new(
                "FORBIDDEN",
                80,
                "Forbidden access",
                StatusCode::FORBIDDEN,
            ),
            Self::NotFound => ApiError::new(
                "NOT_FOUND",
                90,
                "The requested resource was not found",
                StatusCode::NOT_FOUND,
            ),
            Self::MethodNotAllowed => ApiError::new(
                "METHOD_NOT_ALLOWED",
                100,
                "Http Request method not allowed for this resource",
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            Self::UnsupportedMediaType => ApiError::new(
                "UNSUPPORTED_MEDIA_TYPE",
                120,
                "Unsupported media type",
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            Self::PayloadTooLarge => ApiError::new(
                "PAYLOAD_TOO_LARGE",
                130,
                "Request payload too large",
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
        }
    }
}

impl From<CoreApiError> for ApiError {
    fn from(value: CoreApiError) -> Self {
        value.api_error()
    }
}

/// Errors specific to this project.
///
/// The `Example*` variants back the example endpoints and go away with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectApiError {
    ExampleErrorBadInputVal1,
    ExampleErrorBadInputVal2,
    ExampleErrorManuallyThrown,
}

impl ProjectApiError {
    pub const ALL: &'static [Self] = &[
        Self::ExampleErrorBadInputVal1,
        Self::ExampleErrorBadInputVal2,
        Self::ExampleErrorManuallyThrown,
    ];

    #[must_use]
    pub fn api_error(self) -> ApiError {
        match self {
            Self::ExampleErrorBadInputVal1 => ApiError::new(
                "EXAMPLE_ERROR_BAD_INPUT_VAL_1",
                99150,
                "Bad request body - null/empty input_val_1",
                StatusCode::BAD_REQUEST,
            ),
            Self::ExampleErrorBadInputVal2 => ApiError::new(
                "EXAMPLE_ERROR_BAD_INPUT_VAL_2",
                99151,
                "Bad request body - null/empty input_val_2",
                StatusCode::BAD_REQUEST,
            ),
            Self::ExampleErrorManuallyThrown => ApiError::new(
                "EXAMPLE_ERROR_MANUALLY_THROWN",
                99152,
                "You asked for an error to be thrown",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .with_metadata("static_metadata_1", "foo")
            .with_metadata("static_metadata_2", 42),
        }
    }
}

impl From<ProjectApiError> for ApiError {
    fn from(value: ProjectApiError) -> Self {
        value.api_error()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContract {
    pub error_id: String,
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl From<&ApiError> for ErrorEntry {
    fn from(error: &ApiError) -> Self {
        Self {
            code: error.code.to_string(),
            message: error.message.to_string(),
            metadata: error.metadata.clone(),
        }
    }
}

fn format_names(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| e.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A request failure carrying one or more [`ApiError`]s.
///
/// Handlers return it as the `Err` side of their result; the
/// [`IntoResponse`] impl logs it and renders the error contract.
#[derive(Debug, thiserror::Error)]
#[error("api exception [{}]: {}", format_names(.errors), .message.as_deref().unwrap_or("-"))]
pub struct ApiException {
    errors: Vec<ApiError>,
    message: Option<String>,
    log_details: Vec<(String, String)>,
    headers: HeaderMap,
}

impl ApiException {
    #[must_use]
    pub fn new(error: impl Into<ApiError>) -> Self {
        Self::from_errors(vec![error.into()])
    }

    #[must_use]
    pub fn from_errors(errors: Vec<ApiError>) -> Self {
        Self {
            errors,
            message: None,
            log_details: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Message written to the log only, never to the client.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds request-specific metadata to every carried error.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        for error in &mut self.errors {
            error.metadata.insert(key.to_string(), value.clone());
        }
        self
    }

    #[must_use]
    pub fn with_log_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.log_details.push((key.into(), value.into()));
        self
    }

    /// Extra response header. Invalid names or values are dropped with a warning.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "invalid error response header, skipping"),
        }
        self
    }

    #[must_use]
    pub fn errors(&self) -> &[ApiError] {
        &self.errors
    }

    /// The status for the whole response.
    ///
    /// 5xx errors take precedence over everything else; within the
    /// candidates the most frequent status wins, ties go to the higher code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        let server_side = self.errors.iter().any(|e| e.status.is_server_error());
        let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
        for error in &self.errors {
            if !server_side || error.status.is_server_error() {
                *counts.entry(error.status.as_u16()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|&(status, count)| (count, status))
            .and_then(|(status, _)| StatusCode::from_u16(status).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[must_use]
    pub fn contract(&self, error_id: String) -> ErrorContract {
        ErrorContract {
            error_id,
            errors: self.errors.iter().map(ErrorEntry::from).collect(),
        }
    }
}

impl From<CoreApiError> for ApiException {
    fn from(value: CoreApiError) -> Self {
        Self::new(value)
    }
}

impl From<ProjectApiError> for ApiException {
    fn from(value: ProjectApiError) -> Self {
        Self::new(value)
    }
}

impl IntoResponse for ApiException {
    fn into_response(self) -> Response {
        let error_id = uuid::Uuid::new_v4().to_string();
        let status = self.status();
        let names = format_names(&self.errors);
        let details = self
            .log_details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                status = status.as_u16(),
                errors = %names,
                reason = self.message.as_deref().unwrap_or(""),
                details = %details,
                "request failed"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                status = status.as_u16(),
                errors = %names,
                reason = self.message.as_deref().unwrap_or(""),
                details = %details,
                "request rejected"
            );
        }

        let contract = self.contract(error_id.clone());
        let mut response = (status, Json(contract)).into_response();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            headers.append(name, value.clone());
        }
        if let Ok(value) = HeaderValue::from_str(&error_id) {
            headers.insert("error_uid", value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn project_codes_are_unique_and_outside_core_range() {
        let core: HashSet<u32> = CoreApiError::ALL.iter().map(|e| e.api_error().code).collect();
        let mut seen = HashSet::new();
        for error in ProjectApiError::ALL {
            let code = error.api_error().code;
            assert!(seen.insert(code), "duplicate project code {code}");
            assert!(!core.contains(&code), "project code {code} collides with core");
        }
    }

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        let all = CoreApiError::ALL
            .iter()
            .map(|e| e.api_error())
            .chain(ProjectApiError::ALL.iter().map(|e| e.api_error()));
        for error in all {
            assert!(seen.insert(error.name), "duplicate name {}", error.name);
        }
    }

    #[test]
    fn manually_thrown_carries_static_metadata() {
        let error = ProjectApiError::ExampleErrorManuallyThrown.api_error();
        assert_eq!(error.metadata["static_metadata_1"], "foo");
        assert_eq!(error.metadata["static_metadata_2"], 42);
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_uses_shared_status() {
        let ex = ApiException::from_errors(vec![
            ProjectApiError::ExampleErrorBadInputVal1.into(),
            ProjectApiError::ExampleErrorBadInputVal2.into(),
        ]);
        assert_eq!(ex.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_errors_win_status_selection() {
        let ex = ApiException::from_errors(vec![
            CoreApiError::MalformedRequest.into(),
            CoreApiError::MissingExpectedContent.into(),
            CoreApiError::TemporaryServiceProblem.into(),
        ]);
        assert_eq!(ex.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn most_frequent_status_wins() {
        let ex = ApiException::from_errors(vec![
            CoreApiError::Unauthorized.into(),
            CoreApiError::MalformedRequest.into(),
            CoreApiError::MissingExpectedContent.into(),
        ]);
        assert_eq!(ex.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_exception_is_server_error() {
        let ex = ApiException::from_errors(Vec::new());
        assert_eq!(ex.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn request_metadata_merges_over_static() {
        let ex = ApiException::new(ProjectApiError::ExampleErrorManuallyThrown)
            .with_metadata("dynamic_metadata", 123);
        let contract = ex.contract("id".into());
        let metadata = &contract.errors[0].metadata;
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata["dynamic_metadata"], 123);
    }

    #[test]
    fn contract_omits_empty_metadata() {
        let ex = ApiException::new(CoreApiError::NotFound);
        let json = serde_json::to_value(ex.contract("abc".into())).unwrap();
        assert_eq!(json["error_id"], "abc");
        assert_eq!(json["errors"][0]["code"], "90");
        assert!(json["errors"][0].get("metadata").is_none());
    }

    #[test]
    fn response_carries_error_uid_and_extra_headers() {
        let response = ApiException::new(ProjectApiError::ExampleErrorManuallyThrown)
            .with_header("useful-error-related-response-header", "foo")
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("error_uid").is_some());
        assert_eq!(
            response.headers()["useful-error-related-response-header"],
            "foo"
        );
    }
}
