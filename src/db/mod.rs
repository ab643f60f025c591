//! Database layer
//!
//! Entities are documents stored through the typed [`repositories::Store`]
//! trait. The backend is selected from configuration:
//! - MongoDB (default)
//! - an in-memory store with the same filter/update semantics
//!
//! # Usage
//!
//! ```ignore
//! use charity_hub::config::DatabaseConfig;
//! use charity_hub::db::{Backend, Filter};
//!
//! let backend = Backend::connect(&DatabaseConfig::default()).await?;
//! backend.ensure_indexes().await?;
//! let repos = backend.repositories();
//! let admins = repos.users.count(Filter::all().eq("role", "admin")).await?;
//! ```

pub mod indexes;
pub mod pool;
pub mod query;
pub mod repositories;

pub use pool::Backend;
pub use query::{Filter, Page, Query, SortOrder, Update};
pub use repositories::{Entity, IndexSpec, Repositories, Store, StoreError, StoreResult};
