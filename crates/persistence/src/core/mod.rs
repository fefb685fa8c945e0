//! Core storage traits and abstractions.
//!
//! - [`ResourceStorage`] - Record CRUD, relationship reads and writes, and
//!   uniqueness probes

mod storage;

pub use storage::ResourceStorage;
