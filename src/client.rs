//! Shared outbound HTTP client.
//!
//! One connection-pooled hyper client is built at startup and cloned
//! into everything that calls out: the downstream and proxy example
//! endpoints, the app-info lookup, and service registration.
//! [`send`] wraps a single request with a timeout and collects the body.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Full<Bytes>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid request: {0}")]
    Build(#[from] http::Error),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("body read error: {0}")]
    Body(#[from] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub latency: Duration,
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // Several rustls providers may be compiled in; pin `ring` explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

/// Send `request` and collect the full response, failing after `timeout`.
///
/// The timeout covers both the response head and the body.
pub async fn send(
    client: &HttpClient,
    request: hyper::Request<Full<Bytes>>,
    timeout: Duration,
) -> Result<ClientResponse, ClientError> {
    let start = Instant::now();
    let exchange = async {
        let response = client.request(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await?.to_bytes();
        Ok::<_, ClientError>((status, headers, body))
    };

    let (status, headers, body) = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ClientError::Timeout(timeout))??;

    Ok(ClientResponse {
        status,
        headers,
        body,
        latency: start.elapsed(),
    })
}

/// Convenience `GET` returning the body as text on a 2xx status.
pub async fn get_text(
    client: &HttpClient,
    uri: &str,
    headers: &[(&str, &str)],
    timeout: Duration,
) -> Result<Option<String>, ClientError> {
    let mut builder = hyper::Request::builder().method(http::Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Full::new(Bytes::new()))?;
    let response = send(client, request, timeout).await?;
    if response.status.is_success() {
        Ok(Some(String::from_utf8_lossy(&response.body).into_owned()))
    } else {
        Ok(None)
    }
}
