//! Persistence collaborators
//!
//! The store only needs "load everything" and "save everything"; the file
//! format lives behind [`MaterialRepository`].

mod json;
mod memory;

pub use json::JsonFileRepository;
pub use memory::InMemoryRepository;

use crate::core::Material;
use crate::errors::Result;
use std::sync::Arc;

pub trait MaterialRepository: Send + Sync {
    /// Every persisted record. An absent backing store loads as empty.
    fn load_all(&self) -> Result<Vec<Material>>;

    /// Replace the persisted content with `records`.
    fn save_all(&self, records: &[Arc<Material>]) -> Result<()>;
}
