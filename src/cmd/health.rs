//! `service-template health`: check a running instance.
//!
//! Sends `GET /healthcheck` to the given base URL and reports the
//! outcome as text or JSON. A non-2xx answer is an error.

use std::time::Duration;

use crate::cli::HealthArgs;
use crate::client;
use crate::endpoints::health::MATCHING_PATH;
use crate::error::ServiceError;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn execute(args: &HealthArgs) -> Result<(), ServiceError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(check(args))
}

async fn check(args: &HealthArgs) -> Result<(), ServiceError> {
    let url = format!("{}{MATCHING_PATH}", args.url.trim_end_matches('/'));
    let uri: hyper::Uri = url
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| ServiceError::UriParse {
            source: Box::new(e),
        })?;

    let request = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| ServiceError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = client::send(&client::build_http_client(), request, HEALTH_TIMEOUT)
        .await
        .map_err(|e| ServiceError::HttpRequest {
            source: Box::new(e),
        })?;

    if !response.status.is_success() {
        return Err(ServiceError::HealthCheckFailed(response.status));
    }

    let latency_ms = u64::try_from(response.latency.as_millis()).unwrap_or(u64::MAX);
    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "healthy": true,
                "url": url,
                "status": response.status.as_u16(),
                "latency_ms": latency_ms,
            })
        );
    } else {
        println!("\u{2713} service is healthy ({})", args.url);
        println!("  status:   {}", response.status);
        println!("  latency:  {}", format_latency(latency_ms));
    }

    Ok(())
}

fn format_latency(millis: u64) -> String {
    if millis >= 1000 {
        let secs = millis / 1000;
        let rest = millis % 1000;
        format!("{secs}.{rest:03}s")
    } else {
        format!("{millis}ms")
    }
}
