//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection and the service set handlers share
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and identifier parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use stockroom_infra::{InMemoryStore, PgStore};

use crate::config::{AppConfig, Persistence};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, Backend};

/// Build the full HTTP router for the configured backend (entrypoint used by
/// `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    match &config.persistence {
        Persistence::InMemory => {
            tracing::info!("using in-memory stores");
            Ok(router_for(Arc::new(InMemoryStore::new())))
        }
        Persistence::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PgStore::connect(database_url, *max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!(max_connections, "using postgres stores");
            Ok(router_for(Arc::new(store)))
        }
    }
}

/// Router over an explicit store.
pub fn router_for<S: Backend>(store: S) -> Router {
    let services = Arc::new(AppServices::new(store));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router::<S>())
        .layer(Extension(services))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
