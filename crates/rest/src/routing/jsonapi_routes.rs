//! JSON:API route configuration.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use storefront_persistence::core::ResourceStorage;

use crate::error::RestError;
use crate::handlers;
use crate::middleware::enforce_media_type;
use crate::state::AppState;

/// Creates all routes of the server.
///
/// # Routes
///
/// ## Root
/// - `GET /health` - Health check
///
/// ## Under the API prefix
/// - `GET /{type}` - Index
/// - `POST /{type}` - Store
/// - `GET /{type}/{id}` - Show
/// - `PATCH /{type}/{id}` - Update
/// - `DELETE /{type}/{id}` - Destroy
/// - `POST /{type}/{id}/restore` - Restore a soft-deleted record
/// - `GET /{type}/{id}/{rel}` - Related resources
/// - `GET /{type}/{id}/relationships/{rel}` - Relationship identifiers
/// - `PATCH /{type}/{id}/relationships/{rel}` - Replace a relationship
///
/// Media type negotiation applies to the API routes only.
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: ResourceStorage + Send + Sync + 'static,
{
    let prefix = state.config().route_prefix();

    let api = Router::new()
        .route(
            "/{resource_type}",
            get(handlers::index_handler::<S>).post(handlers::store_handler::<S>),
        )
        .route(
            "/{resource_type}/{id}",
            get(handlers::show_handler::<S>)
                .patch(handlers::update_handler::<S>)
                .delete(handlers::destroy_handler::<S>),
        )
        .route(
            "/{resource_type}/{id}/restore",
            post(handlers::restore_handler::<S>),
        )
        .route(
            "/{resource_type}/{id}/{relationship}",
            get(handlers::related_handler::<S>),
        )
        .route(
            "/{resource_type}/{id}/relationships/{relationship}",
            get(handlers::relationship_show_handler::<S>)
                .patch(handlers::relationship_update_handler::<S>),
        )
        .route_layer(middleware::from_fn(enforce_media_type));

    let router = Router::new().route("/health", get(handlers::health_handler::<S>));
    // nest() rejects the root path
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    router.fallback(fallback_handler).with_state(state)
}

async fn fallback_handler() -> RestError {
    RestError::NotFound
}
