//! Storefront persistence layer
//!
//! This crate stores the storefront's records (users, sellers, shops,
//! shop types, brands, product units, products, employees and transactions)
//! in a relational database and exposes them through the
//! [`ResourceStorage`](core::ResourceStorage) trait.
//!
//! # Architecture
//!
//! - [`catalog`] - Table, column and relation definitions
//! - [`types`] - Stored records and listing queries
//! - [`error`] - Error types for all operations
//! - [`core`] - The storage trait
//! - [`backends`] - Backend implementations (SQLite)
//!
//! # Quick Start
//!
//! ```no_run
//! use storefront_persistence::backends::sqlite::SqliteBackend;
//! use storefront_persistence::core::ResourceStorage;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! let attributes = json!({"name": "Acme"}).as_object().cloned().unwrap_or_default();
//! let brand = backend.create("brands", attributes).await?;
//! assert_eq!(brand.url(), "brands/1");
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod catalog;
pub mod core;
pub mod error;
pub mod types;

pub use error::{StorageError, StorageResult};
