//! Relationship handlers.
//!
//! | Method | URL | Handler |
//! |--------|-----|---------|
//! | GET | `/{type}/{id}/{rel}` | [`related_handler`] |
//! | GET | `/{type}/{id}/relationships/{rel}` | [`relationship_show_handler`] |
//! | PATCH | `/{type}/{id}/relationships/{rel}` | [`relationship_update_handler`] |

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use storefront_jsonapi::{Cardinality, RelationshipDef};
use storefront_persistence::core::ResourceStorage;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::{JsonApiDocument, QueryParams};
use crate::responses::{DocumentResponse, no_content};
use crate::state::AppState;

/// Resolves a relationship named in a URL. Unknown types and relationships are not found.
fn resolve<'a, S>(
    state: &'a AppState<S>,
    resource_type: &str,
    relationship: &str,
) -> RestResult<&'a RelationshipDef>
where
    S: ResourceStorage,
{
    state
        .schema(resource_type)?
        .relationship(relationship)
        .ok_or(RestError::NotFound)
}

/// Returns the related resources as full resource objects.
///
/// # Response
///
/// - `200 OK` - A resource (or `null`) for to-one, a collection for to-many
/// - `404 Not Found` - Unknown relationship or owner
pub async fn related_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    query: QueryParams,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(
        resource_type = %resource_type,
        id = %id,
        relationship = %relationship,
        "Processing related request"
    );
    resolve(&state, &resource_type, &relationship)?;

    let document = state
        .service()
        .fetch_related(&resource_type, &id, &relationship, query.pairs())
        .await?;
    Ok(DocumentResponse::ok(document).into_response())
}

/// Returns the resource identifiers of a relationship.
///
/// # Response
///
/// - `200 OK` - Identifier document with `self` and `related` links
/// - `404 Not Found` - Unknown relationship or owner
pub async fn relationship_show_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(
        resource_type = %resource_type,
        id = %id,
        relationship = %relationship,
        "Processing relationship request"
    );
    resolve(&state, &resource_type, &relationship)?;

    let document = state
        .service()
        .fetch_relationship(&resource_type, &id, &relationship)
        .await?;
    Ok(DocumentResponse::ok(document).into_response())
}

/// Replaces a relationship. To-many payloads replace the full member set.
///
/// # Response
///
/// - `204 No Content`
/// - `404 Not Found` - Unknown relationship, owner or target
/// - `422 Unprocessable Entity` - Malformed identifier payload
pub async fn relationship_update_handler<S>(
    State(state): State<AppState<S>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    JsonApiDocument(body): JsonApiDocument,
) -> RestResult<Response>
where
    S: ResourceStorage + Send + Sync + 'static,
{
    debug!(
        resource_type = %resource_type,
        id = %id,
        relationship = %relationship,
        "Processing relationship update request"
    );
    let cardinality = resolve(&state, &resource_type, &relationship)?.cardinality;

    let service = state.service();
    match cardinality {
        Cardinality::ToOne => {
            service
                .update_to_one_relationship(&resource_type, &id, &relationship, &body)
                .await?
        }
        Cardinality::ToMany => {
            service
                .update_to_many_relationship(&resource_type, &id, &relationship, &body)
                .await?
        }
    }
    Ok(no_content())
}
