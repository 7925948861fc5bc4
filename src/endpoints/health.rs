//! `/healthcheck` endpoint.
//!
//! Answers 200 with an empty body for every method. It tells a load
//! balancer that the process is up and serving, nothing more.

use axum::http::StatusCode;

pub const MATCHING_PATH: &str = "/healthcheck";

pub async fn healthcheck() -> StatusCode {
    StatusCode::OK
}
