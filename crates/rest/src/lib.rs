//! # storefront-rest - JSON:API HTTP transport
//!
//! This crate exposes the storefront resources over HTTP following the
//! [JSON:API](https://jsonapi.org/format/) conventions. It wraps the
//! `storefront-jsonapi` engine in an Axum router.
//!
//! ## Features
//!
//! - **Resources**: index, show, store, update, destroy and restore for every
//!   registered resource type
//! - **Relationships**: related-resource reads, identifier reads and
//!   relationship replacement
//! - **Queries**: `include`, `fields[type]`, `sort`, `filter[field]` and `page`
//! - **Media types**: `application/vnd.api+json` negotiation (415 / 406)
//! - **Errors**: every failure rendered as a JSON:API error document
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storefront_rest::{create_app_with_config, ServerConfig};
//! use storefront_persistence::backends::sqlite::SqliteBackend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::open("storefront.db")?;
//!     backend.init_schema()?;
//!
//!     let config = ServerConfig::default();
//!     let app = create_app_with_config(backend, config.clone())?;
//!
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Server configuration
//! - [`error`] - Transport errors and their error documents
//! - [`extractors`] - Request body and query extractors
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Media type negotiation
//! - [`responses`] - Document responses
//! - [`routing`] - Route configuration
//! - [`state`] - Shared application state

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routing;
pub mod state;

pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use storefront_jsonapi::SchemaRegistry;
use storefront_jsonapi::registry::RegistryError;
use storefront_persistence::core::ResourceStorage;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with default configuration.
///
/// For more control, use [`create_app_with_config`].
pub fn create_app<S>(storage: S) -> Result<Router, RegistryError>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    create_app_with_config(storage, ServerConfig::default())
}

/// Creates the Axum application serving the storefront resource types.
///
/// Fails only if the built-in schema registry is inconsistent.
pub fn create_app_with_config<S>(storage: S, config: ServerConfig) -> Result<Router, RegistryError>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    let registry = SchemaRegistry::storefront()?;
    Ok(create_app_with_registry(
        Arc::new(storage),
        Arc::new(registry),
        config,
    ))
}

/// Creates the Axum application with a caller-supplied schema registry.
pub fn create_app_with_registry<S>(
    storage: Arc<S>,
    registry: Arc<SchemaRegistry>,
    config: ServerConfig,
) -> Router
where
    S: ResourceStorage + Send + Sync + 'static,
{
    info!(
        backend = storage.backend_name(),
        resource_types = registry.resource_types().len(),
        "Creating JSON:API server"
    );

    let state = AppState::new(storage, registry, config.clone());
    let router = routing::create_routes(state);

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router.layer(service_builder)
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins == "*" {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "storefront_rest={level},storefront_jsonapi={level},storefront_persistence={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
