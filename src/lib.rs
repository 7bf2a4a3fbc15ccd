//! Concurrent in-memory catalog of library materials
//!
//! A [`MaterialStore`] serves many readers and writers at once: queries run on
//! one consistent snapshot through an optimistic read path, mutations are
//! serialized, and closing the store is final. [`AsyncCatalog`] ships the same
//! calls to a bounded worker pool.

// Core modules
pub mod core;
pub mod errors;
pub mod store;
pub mod concurrency;
pub mod persistence;

// Ambient
pub mod config;
pub mod infrastructure;
pub mod cli;

// Re-export commonly used items
pub use core::{Material, MaterialDetails, MaterialType};
pub use errors::{ErrorKind, Result, StoreError};
pub use store::{AccessCoordinator, CatalogStats, MaterialStore};
pub use concurrency::{AsyncCatalog, AutosaveTask, CancellationToken, MaintenanceTask, TaskHandle, WorkerPool};
pub use persistence::{InMemoryRepository, JsonFileRepository, MaterialRepository};
pub use config::{PoolConfig, StoreConfig};
pub use infrastructure::{init_logging, LogConfig, LogFormat, StoreMetrics};
