//! `/exampleBasicAuth` endpoints.
//!
//! `GET` is open and hands out the `Authorization` header needed to
//! call `POST`, which sits behind [`require_basic_auth`](crate::security::require_basic_auth).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;

pub const MATCHING_PATH: &str = "/exampleBasicAuth";

pub async fn get_auth_header(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "description": format!(
            "The following Authorization header can be used to call POST {MATCHING_PATH} without a validation error."
        ),
        "Authorization": state.auth.header_value(),
    }))
}

pub async fn post_protected() -> impl IntoResponse {
    (
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, "text/plain")],
        "Successful Basic Auth call",
    )
}
