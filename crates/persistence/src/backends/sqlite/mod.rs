//! SQLite backend implementation.
//!
//! Supports in-memory databases (used throughout the test suites) and
//! file-based databases. Tables are generated from the [`Catalog`] at
//! [`SqliteBackend::init_schema`].
//!
//! # Example
//!
//! ```no_run
//! use storefront_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! One table per resource type with an `INTEGER PRIMARY KEY` id, plus four
//! join tables (`seller_shop`, `shop_shop_type`, `employee_shop`,
//! `product_shop`) whose rows are removed with either side by
//! `ON DELETE CASCADE`.
//!
//! [`Catalog`]: crate::catalog::Catalog

mod backend;
mod query;
mod schema;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig, StoreLocation};
pub use schema::SCHEMA_VERSION;
