//! `/exampleProxy` endpoint: request passthrough.
//!
//! Forwards the incoming request to `/example` on this same server and
//! relays the downstream status, headers, and body. The forwarded
//! request gets hop-by-hop headers stripped, `Host` rewritten,
//! `X-Forwarded-For` appended, and an extra `foobar: baz` header.

use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use axum::extract::{ConnectInfo, FromRequest, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use http_body_util::Full;

use crate::api_error::{ApiException, CoreApiError};
use crate::client;
use crate::endpoints::example;
use crate::server::AppState;
use crate::validation::RequestBody;

pub const MATCHING_PATH: &str = "/exampleProxy";

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers and `content-length` from a relayed response.
///
/// The body is fully collected before relaying, so axum sets the
/// correct `content-length` itself.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: Option<&str>,
    target_url: &url::Url,
) -> HeaderMap {
    let mut headers = original.clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);

    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert(header::HOST, val);
        }
    }

    if let Some(client_ip) = client_ip {
        let xff = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map_or_else(
                || client_ip.to_string(),
                |existing| format!("{existing}, {client_ip}"),
            );
        if let Ok(val) = HeaderValue::from_str(&xff) {
            headers.insert("x-forwarded-for", val);
        }
    }

    headers.insert("foobar", HeaderValue::from_static("baz"));
    headers
}

pub async fn proxy_to_example(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiException> {
    let (parts, body) = request.into_parts();

    let query = parts.uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    let target = format!("{}{}{query}", state.self_base_url, example::MATCHING_PATH);
    let target_url = url::Url::parse(&target).map_err(|e| proxy_error(&target, e))?;

    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let forwarded = build_forwarded_headers(&parts.headers, client_ip.as_deref(), &target_url);
    let method = parts.method.clone();

    let RequestBody(body) =
        RequestBody::from_request(Request::from_parts(parts, body), &()).await?;

    let mut builder = hyper::Request::builder()
        .method(method.clone())
        .uri(target_url.as_str());
    if let Some(headers) = builder.headers_mut() {
        *headers = forwarded;
    }
    let outbound = builder
        .body(Full::new(body))
        .map_err(|e| proxy_error(&target, e))?;

    let timeout = Duration::from_millis(state.config.server.request_timeout_ms);
    let relayed = client::send(&state.http_client, outbound, timeout)
        .await
        .map_err(|e| proxy_error(&target, e))?;

    tracing::debug!(
        %method,
        status = relayed.status.as_u16(),
        latency_ms = u64::try_from(relayed.latency.as_millis()).unwrap_or(u64::MAX),
        "proxied request"
    );

    let mut headers = relayed.headers;
    strip_response_hop_by_hop(&mut headers);
    Ok((relayed.status, headers, relayed.body).into_response())
}

fn proxy_error(target: &str, error: impl std::fmt::Display) -> ApiException {
    ApiException::new(CoreApiError::OutsideDependencyReturnedAnUnrecoverableError)
        .with_message(format!("proxy call failed: {error}"))
        .with_log_detail("proxy_target", target)
}
