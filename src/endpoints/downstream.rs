//! `/exampleDownstreamHttpAsync` endpoint.
//!
//! Calls `/example` on this same server through the shared outbound
//! client, then decorates the JSON it gets back. The incoming method
//! and body, plus any `Authorization` header, are reused for the
//! downstream call.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method};
use axum::Json;
use http_body_util::Full;
use serde_json::{Map, Value};

use crate::api_error::{ApiException, CoreApiError};
use crate::client;
use crate::endpoints::example;
use crate::server::AppState;
use crate::validation::RequestBody;

pub const MATCHING_PATH: &str = "/exampleDownstreamHttpAsync";

const MARKER_FIELD: &str = "viaAsyncHttpClient";

pub async fn call_downstream(
    State(state): State<Arc<AppState>>,
    method: Method,
    incoming: HeaderMap,
    RequestBody(body): RequestBody,
) -> Result<Json<Map<String, Value>>, ApiException> {
    let url = format!(
        "{}{}?some_query_param=foo",
        state.self_base_url,
        example::MATCHING_PATH
    );

    let mut builder = hyper::Request::builder()
        .method(method.clone())
        .uri(&url)
        .header(header::ACCEPT, "application/json");
    if !body.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    // Needed when every endpoint sits behind basic auth.
    if let Some(auth) = incoming.get(header::AUTHORIZATION) {
        builder = builder.header(header::AUTHORIZATION, auth.clone());
    }
    let request = builder
        .body(Full::new(body))
        .map_err(|e| outside_dependency_error(&url, e))?;

    let timeout = Duration::from_millis(state.config.server.request_timeout_ms);
    let response = client::send(&state.http_client, request, timeout)
        .await
        .map_err(|e| outside_dependency_error(&url, e))?;

    tracing::info!(
        %method,
        status = response.status.as_u16(),
        latency_ms = u64::try_from(response.latency.as_millis()).unwrap_or(u64::MAX),
        "downstream call completed"
    );

    if !response.status.is_success() {
        return Err(ApiException::new(CoreApiError::OutsideDependencyReturnedAnUnrecoverableError)
            .with_message("downstream call returned an error status")
            .with_log_detail("downstream_url", &url)
            .with_log_detail("downstream_status", response.status.as_str()));
    }

    let mut payload: Map<String, Value> =
        serde_json::from_slice(&response.body).map_err(|e| outside_dependency_error(&url, e))?;
    payload.insert(MARKER_FIELD.to_string(), Value::String("true".to_string()));
    Ok(Json(payload))
}

fn outside_dependency_error(url: &str, error: impl std::fmt::Display) -> ApiException {
    ApiException::new(CoreApiError::OutsideDependencyReturnedAnUnrecoverableError)
        .with_message(format!("downstream call failed: {error}"))
        .with_log_detail("downstream_url", url)
}
