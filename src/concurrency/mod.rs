//! Asynchronous execution on top of the store
//!
//! - `pool`: bounded worker pool with graceful shutdown
//! - `facade`: task-per-call front end for a shared store
//! - `maintenance`: periodic jobs such as autosave

pub mod facade;
pub mod maintenance;
pub mod pool;

pub use facade::AsyncCatalog;
pub use maintenance::{AutosaveTask, MaintenanceTask};
pub use pool::{CancellationToken, TaskHandle, WorkerPool};
