//! Concurrent material store
//!
//! - `coordinator`: optimistic / shared / exclusive acquisition
//! - `table`: the id -> record map
//! - `query`: read-only operations, run on one consistent snapshot
//! - `mutation`: write operations, serialized under the exclusive mode
//! - `lifecycle`: open/closed state checked before any acquisition

pub mod coordinator;
pub mod lifecycle;
pub mod mutation;
pub mod query;
pub mod table;

pub use coordinator::{AccessCoordinator, ReadStamp, Stamp, WriteStamp};
pub use lifecycle::Lifecycle;
pub use query::CatalogStats;
pub use table::RecordTable;

use crate::core::Material;
use crate::errors::Result;
use crate::infrastructure::metrics::StoreMetrics;
use crate::persistence::MaterialRepository;
use std::sync::Arc;
use tracing::info;

/// Thread-safe in-memory catalog. Share it behind an `Arc`.
pub struct MaterialStore {
    table: RecordTable,
    coordinator: AccessCoordinator,
    lifecycle: Lifecycle,
    metrics: Arc<StoreMetrics>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(StoreMetrics::new()))
    }

    pub fn with_metrics(metrics: Arc<StoreMetrics>) -> Self {
        Self {
            table: RecordTable::new(),
            coordinator: AccessCoordinator::new(metrics.clone()),
            lifecycle: Lifecycle::new("material store"),
            metrics,
        }
    }

    /// New store pre-filled from `repository`.
    pub fn from_repository(repository: &dyn MaterialRepository) -> Result<Self> {
        let store = Self::new();
        store.load_from(repository)?;
        Ok(store)
    }

    /// Point lookup; does not touch the coordinator.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Material>>> {
        self.lifecycle.ensure_open()?;
        Ok(self.table.get(id))
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Arc<Material>>> {
        self.get(id)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.lifecycle.ensure_open()?;
        Ok(self.table.contains(id))
    }

    pub fn size(&self) -> Result<usize> {
        self.lifecycle.ensure_open()?;
        Ok(self.table.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    /// Every record as of a single instant.
    pub fn snapshot(&self) -> Result<Vec<Arc<Material>>> {
        self.lifecycle.ensure_open()?;
        Ok(self.consistent_snapshot())
    }

    /// Load every record from `repository`. Ids already present are kept
    /// as they are. Returns the number of records inserted.
    pub fn load_from(&self, repository: &dyn MaterialRepository) -> Result<usize> {
        self.lifecycle.ensure_open()?;
        let records = repository.load_all()?;
        let total = records.len();
        let inserted = self.add_all(records)?;
        info!(total, inserted, "loaded materials from repository");
        Ok(inserted)
    }

    /// Persist one consistent snapshot to `repository`.
    pub fn save_to(&self, repository: &dyn MaterialRepository) -> Result<usize> {
        let snapshot = self.snapshot()?;
        repository.save_all(&snapshot)?;
        info!(records = snapshot.len(), "saved materials to repository");
        Ok(snapshot.len())
    }

    /// Close the store. Waits for the in-flight write, if any, so no
    /// mutation lands after this returns. Idempotent; true on the first call.
    pub fn close(&self) -> bool {
        let _write = self.coordinator.write();
        let first = self.lifecycle.close();
        if first {
            info!(records = self.table.len(), "material store closed");
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.lifecycle.ensure_open()
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    pub fn coordinator(&self) -> &AccessCoordinator {
        &self.coordinator
    }

    fn consistent_snapshot(&self) -> Vec<Arc<Material>> {
        self.coordinator
            .read_consistent(|| self.table.snapshot_values())
    }
}

impl Default for MaterialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MaterialType;
    use crate::errors::ErrorKind;
    use crate::persistence::InMemoryRepository;

    fn book(id: &str, price: f64) -> Material {
        Material::new(id, format!("Title {}", id), "Author", MaterialType::Book, price, 2000).unwrap()
    }

    #[test]
    fn test_point_operations() {
        let store = MaterialStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.add(book("1", 10.0)).unwrap());

        assert!(store.contains("1").unwrap());
        assert_eq!(store.get("1").unwrap().unwrap().price(), 10.0);
        assert!(store.find_by_id("missing").unwrap().is_none());
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn test_closed_store_rejects_everything() {
        let store = MaterialStore::new();
        store.add(book("1", 10.0)).unwrap();

        assert!(store.close());
        assert!(!store.close());
        assert!(store.is_closed());

        assert_eq!(store.get("1").unwrap_err().kind(), ErrorKind::IllegalState);
        assert_eq!(store.size().unwrap_err().kind(), ErrorKind::IllegalState);
        assert_eq!(store.add(book("2", 1.0)).unwrap_err().kind(), ErrorKind::IllegalState);
        assert_eq!(store.remove("1").unwrap_err().kind(), ErrorKind::IllegalState);
        assert_eq!(store.total_value().unwrap_err().kind(), ErrorKind::IllegalState);
        assert_eq!(store.search_by_title("").unwrap_err().kind(), ErrorKind::IllegalState);
        assert!(store.snapshot().is_err());
    }

    #[test]
    fn test_repository_round_trip() {
        let source = InMemoryRepository::with_records(vec![book("1", 10.0), book("2", 20.0)]);
        let store = MaterialStore::from_repository(&source).unwrap();
        assert_eq!(store.size().unwrap(), 2);

        let target = InMemoryRepository::new();
        assert_eq!(store.save_to(&target).unwrap(), 2);

        let mut ids: Vec<_> = target.records().into_iter().map(|m| m.id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_load_keeps_existing_records() {
        let store = MaterialStore::new();
        store.add(book("1", 99.0)).unwrap();

        let repository = InMemoryRepository::with_records(vec![book("1", 10.0), book("2", 20.0)]);
        assert_eq!(store.load_from(&repository).unwrap(), 1);
        assert_eq!(store.get("1").unwrap().unwrap().price(), 99.0);
    }
}
