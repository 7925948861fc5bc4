//! `/exampleCassandraAsync` endpoint: embedded database demo.
//!
//! A [`Database`] is opened at startup from `database.url`. Opening it
//! can fail or be disabled without stopping the server; the endpoint
//! then answers `GENERIC_SERVICE_ERROR`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api_error::{ApiException, CoreApiError};
use crate::config::model::DatabaseConfig;
use crate::server::AppState;

pub const MATCHING_PATH: &str = "/exampleCassandraAsync";

#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "sqlite")]
impl Database {
    /// Open the configured database, or `None` when disabled or unreachable.
    pub async fn open(config: &DatabaseConfig) -> Option<Self> {
        if config.disabled {
            tracing::info!("embedded database disabled by configuration");
            return None;
        }

        // One connection keeps `sqlite::memory:` pointing at a single database.
        let connect = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&config.url)
            .await;

        match connect {
            Ok(pool) => {
                tracing::info!(url = %config.url, "embedded database started");
                Some(Self { pool })
            }
            Err(e) => {
                tracing::error!(url = %config.url, error = %e, "embedded database failed to start");
                None
            }
        }
    }

    pub async fn version(&self) -> Result<String, crate::error::ServiceError> {
        let (version,): (String,) = sqlx::query_as("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(not(feature = "sqlite"))]
#[derive(Debug, Clone)]
pub struct Database {
    _private: (),
}

#[cfg(not(feature = "sqlite"))]
impl Database {
    pub async fn open(config: &DatabaseConfig) -> Option<Self> {
        if !config.disabled {
            tracing::warn!("built without the `sqlite` feature, embedded database unavailable");
        }
        None
    }

    pub async fn version(&self) -> Result<String, crate::error::ServiceError> {
        Ok(String::new())
    }

    pub async fn close(&self) {}
}

pub async fn query_version(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiException> {
    let Some(database) = state.database.as_ref() else {
        return Err(ApiException::new(CoreApiError::GenericServiceError)
            .with_message("embedded database is not available"));
    };

    let version = database.version().await.map_err(|e| {
        ApiException::new(CoreApiError::GenericServiceError)
            .with_message(format!("database query failed: {e}"))
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain")],
        format!("Database query succeeded. Database version: {version}"),
    ))
}
