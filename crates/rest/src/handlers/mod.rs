//! HTTP request handlers.
//!
//! - [`resources`] - Collection and single-resource endpoints
//! - [`relationships`] - Related-resource and relationship endpoints
//! - [`health`] - Health check endpoint

pub mod health;
pub mod relationships;
pub mod resources;

pub use health::health_handler;
pub use relationships::{related_handler, relationship_show_handler, relationship_update_handler};
pub use resources::{
    destroy_handler, index_handler, restore_handler, show_handler, store_handler, update_handler,
};
