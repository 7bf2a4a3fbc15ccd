use super::MaterialRepository;
use crate::core::Material;
use crate::errors::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Repository kept in memory; counts saves so callers can observe them.
#[derive(Default)]
pub struct InMemoryRepository {
    records: Mutex<Vec<Material>>,
    saves: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Material>) -> Self {
        Self {
            records: Mutex::new(records),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn records(&self) -> Vec<Material> {
        self.records.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }
}

impl MaterialRepository for InMemoryRepository {
    fn load_all(&self) -> Result<Vec<Material>> {
        Ok(self.records())
    }

    fn save_all(&self, records: &[Arc<Material>]) -> Result<()> {
        *self.records.lock() = records.iter().map(|m| m.as_ref().clone()).collect();
        self.saves.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
