//! # storefront-jsonapi
//!
//! JSON:API resource serialization and mutation engine.
//!
//! The engine sits between the HTTP transport and the storage layer:
//!
//! - [`registry`] - per-type schemas: sorts, filters, includes, rules, relationships
//! - [`projector`] - stored record to `attributes`
//! - [`document`] - resource objects, compound documents, pagination links
//! - [`query`] - `sort`, `include`, `filter`, `fields` and `page` parameters
//! - [`mutator`] - to-one and full-replace to-many relationship updates
//! - [`validation`] - request document rules and error objects
//! - [`service`] - [`JsonApiService`], the operation façade
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use storefront_jsonapi::{JsonApiConfig, JsonApiService, SchemaRegistry};
//! use storefront_persistence::backends::sqlite::SqliteBackend;
//!
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! let service = JsonApiService::new(
//!     Arc::new(backend),
//!     Arc::new(SchemaRegistry::storefront()?),
//!     JsonApiConfig::default(),
//! );
//! let document = service.fetch_resources("shops", &[("sort".into(), "-name".into())]).await?;
//! ```

pub mod document;
pub mod error;
pub mod mutator;
pub mod projector;
pub mod query;
pub mod registry;
pub mod service;
pub mod validation;

pub use document::{Document, PrimaryData, ResourceIdentifier, ResourceObject};
pub use error::{ErrorObject, JsonApiError, JsonApiResult};
pub use query::{PageLimits, QueryPlan};
pub use registry::{Cardinality, RelationshipDef, ResourceSchema, SchemaRegistry};
pub use service::{Created, JsonApiConfig, JsonApiService};
