//! Application state for the Storefront server.
//!
//! The state handed to every handler: the JSON:API engine (which owns the
//! storage backend and the schema registry) and the server configuration.

use std::sync::Arc;

use storefront_jsonapi::{JsonApiService, ResourceSchema, SchemaRegistry};
use storefront_persistence::core::ResourceStorage;

use crate::config::ServerConfig;
use crate::error::{RestError, RestResult};

/// Shared application state.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use storefront_jsonapi::SchemaRegistry;
/// use storefront_persistence::backends::sqlite::SqliteBackend;
/// use storefront_rest::{AppState, ServerConfig};
///
/// let backend = SqliteBackend::in_memory()?;
/// let registry = SchemaRegistry::storefront()?;
/// let state = AppState::new(Arc::new(backend), Arc::new(registry), ServerConfig::default());
/// ```
pub struct AppState<S> {
    service: JsonApiService<S>,
    config: Arc<ServerConfig>,
}

// S sits behind an Arc inside the service and need not be Clone.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ResourceStorage> AppState<S> {
    /// Creates the state, deriving the engine settings from `config`.
    pub fn new(storage: Arc<S>, registry: Arc<SchemaRegistry>, config: ServerConfig) -> Self {
        let service = JsonApiService::new(storage, registry, config.jsonapi_config());
        Self {
            service,
            config: Arc::new(config),
        }
    }

    /// Returns the JSON:API engine.
    pub fn service(&self) -> &JsonApiService<S> {
        &self.service
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &S {
        self.service.storage()
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Resolves a resource type named in a URL. Unknown types are not found.
    pub fn schema(&self, resource_type: &str) -> RestResult<&ResourceSchema> {
        self.service
            .registry()
            .get(resource_type)
            .map_err(|_| RestError::NotFound)
    }
}
