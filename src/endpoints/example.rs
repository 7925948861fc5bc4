//! `/example` endpoints: request validation and error handling.
//!
//! `GET` returns a generated [`ExamplePayload`]. `POST` accepts one,
//! validated by [`ValidatedJson`] before the handler runs, and echoes
//! it back with 201. Setting `throwManualError` shows how a handler
//! raises a project error with extra metadata, headers, and log detail.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api_error::{ApiError, ApiException, ProjectApiError};
use crate::validation::{is_blank, Validate, ValidatedJson};

pub const MATCHING_PATH: &str = "/example";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePayload {
    #[serde(default)]
    pub input_val_1: Option<String>,

    #[serde(default)]
    pub input_val_2: Option<String>,

    #[serde(default, rename = "throwManualError")]
    pub throw_manual_error: Option<bool>,
}

impl Validate for ExamplePayload {
    fn validate(&self) -> Vec<ApiError> {
        let mut errors = Vec::new();
        if is_blank(self.input_val_1.as_deref()) {
            errors.push(ProjectApiError::ExampleErrorBadInputVal1.into());
        }
        if is_blank(self.input_val_2.as_deref()) {
            errors.push(ProjectApiError::ExampleErrorBadInputVal2.into());
        }
        errors
    }
}

pub async fn get_example() -> Json<ExamplePayload> {
    Json(ExamplePayload {
        input_val_1: Some(format!("some-val1-{}", uuid::Uuid::new_v4())),
        input_val_2: Some(format!("some-val2-{}", uuid::Uuid::new_v4())),
        throw_manual_error: Some(false),
    })
}

pub async fn post_example(
    ValidatedJson(payload): ValidatedJson<ExamplePayload>,
) -> Result<(StatusCode, Json<ExamplePayload>), ApiException> {
    if payload.throw_manual_error == Some(true) {
        let now_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        return Err(ApiException::new(ProjectApiError::ExampleErrorManuallyThrown)
            .with_message("Manual error throw was requested")
            .with_metadata("dynamic_metadata", now_millis)
            .with_log_detail("some_important_log_info", "foo")
            .with_header("useful-error-related-response-header", "foo"));
    }

    Ok((StatusCode::CREATED, Json(payload)))
}
