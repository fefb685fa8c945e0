//! Resource handlers.
//!
//! | Method | URL | Handler |
//! |--------|-----|---------|
//! | GET | `/{type}` | [`index_handler`] |
//! | POST | `/{type}` | [`store_handler`] |
//! | GET | `/{type}/{id}` | [`show_handler`] |
//! | PATCH | `/{type}/{id}` | [`update_handler`] |
//! | DELETE | `/{type}/{id}` | [`destroy_handler`] |
//! | POST | `/{type}/{id}/restore` | [`restore_handler`] |

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use storefront_persistence::core::ResourceStorage;
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::{JsonApiDocument, QueryParams};
use crate::responses::{DocumentResponse, no_content};
use crate::state::AppState;

/// Lists resources of a type.
///
/// # Response
///
/// - `200 OK` - Collection document, with `links` and `meta` when paginated
/// - `400 Bad Request` - Rejected `sort`, `include`, `filter`, `fields` or `page`
/// - `404 Not Found` - Unknown resource type
pub async fn index_handler<S>(
    State(state): State<AppState<S>>,
    Path(resource_type): Path<String>,
    query: QueryParams,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(resource_type = %resource_type, "Processing index request");
    state.schema(&resource_type)?;

    let document = state
        .service()
        .fetch_resources(&resource_type, query.pairs())
        .await?;
    Ok(DocumentResponse::ok(document).into_response())
}

/// Reads one resource.
///
/// # Response
///
/// - `200 OK` - Resource document, with `included` when `include` was given
/// - `404 Not Found` - Unknown type, or no such (non-deleted) record
pub async fn show_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id)): Path<(String, String)>,
    query: QueryParams,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(resource_type = %resource_type, id = %id, "Processing show request");
    state.schema(&resource_type)?;

    let document = state
        .service()
        .fetch_resource(&resource_type, &id, query.pairs())
        .await?;
    Ok(DocumentResponse::ok(document).into_response())
}

/// Creates a resource.
///
/// # Response
///
/// - `201 Created` - Resource document and `Location` header
/// - `422 Unprocessable Entity` - Validation errors with source pointers
pub async fn store_handler<S>(
    State(state): State<AppState<S>>,
    Path(resource_type): Path<String>,
    JsonApiDocument(body): JsonApiDocument,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(resource_type = %resource_type, "Processing store request");
    state.schema(&resource_type)?;

    let created = state.service().create_resource(&resource_type, &body).await?;
    Ok(DocumentResponse::created(created.document, created.location).into_response())
}

/// Updates the attributes of a resource.
///
/// # Response
///
/// - `200 OK` - Updated resource document
/// - `404 Not Found` - No such record
/// - `422 Unprocessable Entity` - Validation errors
pub async fn update_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id)): Path<(String, String)>,
    JsonApiDocument(body): JsonApiDocument,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(resource_type = %resource_type, id = %id, "Processing update request");
    state.schema(&resource_type)?;

    let document = state
        .service()
        .update_resource(&resource_type, &id, &body)
        .await?;
    Ok(DocumentResponse::ok(document).into_response())
}

/// Deletes a resource. Soft-deleting types cascade to dependent records.
///
/// # Response
///
/// - `204 No Content`
/// - `404 Not Found` - No such record
pub async fn destroy_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id)): Path<(String, String)>,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(resource_type = %resource_type, id = %id, "Processing destroy request");
    state.schema(&resource_type)?;

    state.service().delete_resource(&resource_type, &id).await?;
    Ok(no_content())
}

/// Restores a soft-deleted resource and the records its deletion cascaded to.
///
/// # Response
///
/// - `200 OK` - Restored resource document
/// - `404 Not Found` - No such deleted record
pub async fn restore_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id)): Path<(String, String)>,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(resource_type = %resource_type, id = %id, "Processing restore request");
    state.schema(&resource_type)?;

    let document = state.service().restore_resource(&resource_type, &id).await?;
    Ok(DocumentResponse::ok(document).into_response())
}
