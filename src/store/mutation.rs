//! Write operations
//!
//! Each one holds the exclusive acquisition for its whole duration, so
//! mutations never interleave and readers see all of a mutation or none.
//! The lifecycle is checked before acquiring and again once the lock is
//! held: a `close` that won the race for the lock wins.

use super::MaterialStore;
use crate::core::Material;
use crate::errors::Result;
use std::sync::Arc;
use tracing::debug;

impl MaterialStore {
    /// Insert a record. Returns false, leaving the stored record untouched,
    /// if the id is already present.
    pub fn add(&self, material: Material) -> Result<bool> {
        self.lifecycle.ensure_open()?;
        material.validate()?;
        let material = Arc::new(material);

        let _write = self.coordinator.write();
        self.lifecycle.ensure_open()?;
        let inserted = self.table.insert_if_absent(material.clone());
        if !inserted {
            debug!(id = material.id(), "add skipped, id already present");
        }
        Ok(inserted)
    }

    /// Insert a batch under a single exclusive acquisition. Every record is
    /// validated first; one invalid record rejects the whole batch. Returns
    /// how many were inserted (id collisions are skipped).
    pub fn add_all(&self, materials: impl IntoIterator<Item = Material>) -> Result<usize> {
        self.lifecycle.ensure_open()?;
        let materials = materials
            .into_iter()
            .map(|material| material.validate().map(|_| Arc::new(material)))
            .collect::<Result<Vec<_>>>()?;

        let _write = self.coordinator.write();
        self.lifecycle.ensure_open()?;
        let inserted = materials
            .into_iter()
            .filter(|material| self.table.insert_if_absent(material.clone()))
            .count();
        debug!(inserted, "batch add");
        Ok(inserted)
    }

    /// Replace the record with the same id, returning the previous version.
    /// Nothing is inserted when the id is absent.
    pub fn update(&self, material: Material) -> Result<Option<Arc<Material>>> {
        self.lifecycle.ensure_open()?;
        material.validate()?;

        let _write = self.coordinator.write();
        self.lifecycle.ensure_open()?;
        Ok(self.table.replace_existing(Arc::new(material)))
    }

    /// Remove by id. A missing id is not an error.
    pub fn remove(&self, id: &str) -> Result<Option<Arc<Material>>> {
        self.lifecycle.ensure_open()?;

        let _write = self.coordinator.write();
        self.lifecycle.ensure_open()?;
        Ok(self.table.remove(id))
    }

    /// Remove every record matching `predicate` in one atomic step.
    pub fn remove_if(&self, predicate: impl Fn(&Material) -> bool) -> Result<Vec<Arc<Material>>> {
        self.lifecycle.ensure_open()?;

        let _write = self.coordinator.write();
        self.lifecycle.ensure_open()?;
        let removed: Vec<_> = self
            .table
            .snapshot_values()
            .into_iter()
            .filter(|material| predicate(material))
            .filter_map(|material| self.table.remove(material.id()))
            .collect();
        debug!(removed = removed.len(), "conditional remove");
        Ok(removed)
    }

    /// Empty the table atomically. Returns how many records were dropped.
    pub fn clear(&self) -> Result<usize> {
        self.lifecycle.ensure_open()?;

        let _write = self.coordinator.write();
        self.lifecycle.ensure_open()?;
        let count = self.table.len();
        self.table.clear();
        debug!(count, "store cleared");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MaterialType;
    use crate::errors::ErrorKind;

    fn material(id: &str, kind: MaterialType, price: f64) -> Material {
        Material::new(id, format!("Title {}", id), "Author", kind, price, 2010).unwrap()
    }

    #[test]
    fn test_add_no_overwrite() {
        let store = MaterialStore::new();
        assert!(store.add(material("1", MaterialType::Book, 10.0)).unwrap());
        assert!(!store.add(material("1", MaterialType::Video, 99.0)).unwrap());

        let stored = store.get("1").unwrap().unwrap();
        assert_eq!(stored.kind(), MaterialType::Book);
        assert_eq!(stored.price(), 10.0);
    }

    #[test]
    fn test_add_rejects_invalid_record() {
        let store = MaterialStore::new();
        let mut raw: Material = serde_json::from_str(
            r#"{"id":"","title":"x","creator":"y","type":"BOOK","price":1.0,"year":1}"#,
        )
        .unwrap();
        assert_eq!(store.add(raw.clone()).unwrap_err().kind(), ErrorKind::InvalidArgument);

        raw = serde_json::from_str(
            r#"{"id":"p","title":"x","creator":"y","type":"BOOK","price":-3.0,"year":1}"#,
        )
        .unwrap();
        assert_eq!(store.add(raw).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_add_all_is_all_or_nothing_on_invalid() {
        let store = MaterialStore::new();
        let bad: Material = serde_json::from_str(
            r#"{"id":"bad","title":" ","creator":"y","type":"BOOK","price":1.0,"year":1}"#,
        )
        .unwrap();

        let result = store.add_all(vec![material("1", MaterialType::Book, 1.0), bad]);
        assert!(result.is_err());
        assert!(store.is_empty().unwrap());

        let inserted = store
            .add_all(vec![
                material("1", MaterialType::Book, 1.0),
                material("2", MaterialType::Book, 2.0),
                material("1", MaterialType::Video, 3.0),
            ])
            .unwrap();
        assert_eq!(inserted, 2);
    }

    #[test]
    fn test_update_existing_only() {
        let store = MaterialStore::new();
        assert!(store.update(material("1", MaterialType::Book, 5.0)).unwrap().is_none());
        assert!(!store.contains("1").unwrap());

        store.add(material("1", MaterialType::Book, 5.0)).unwrap();
        let previous = store.update(material("1", MaterialType::Book, 7.0)).unwrap().unwrap();
        assert_eq!(previous.price(), 5.0);
        assert_eq!(store.get("1").unwrap().unwrap().price(), 7.0);
    }

    #[test]
    fn test_remove_idempotent() {
        let store = MaterialStore::new();
        store.add(material("1", MaterialType::Book, 5.0)).unwrap();

        assert_eq!(store.remove("1").unwrap().unwrap().id(), "1");
        assert!(store.remove("1").unwrap().is_none());
        assert!(store.remove("1").unwrap().is_none());
    }

    #[test]
    fn test_remove_if() {
        let store = MaterialStore::new();
        store
            .add_all(vec![
                material("1", MaterialType::Book, 5.0),
                material("2", MaterialType::Video, 15.0),
                material("3", MaterialType::Video, 25.0),
            ])
            .unwrap();

        let removed = store.remove_if(|m| m.kind() == MaterialType::Video).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn test_clear_twice() {
        let store = MaterialStore::new();
        store.add(material("1", MaterialType::Book, 5.0)).unwrap();

        assert_eq!(store.clear().unwrap(), 1);
        assert_eq!(store.size().unwrap(), 0);
        assert_eq!(store.clear().unwrap(), 0);
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn test_writes_bump_metrics() {
        let store = MaterialStore::new();
        store.add(material("1", MaterialType::Book, 5.0)).unwrap();
        store.remove("1").unwrap();
        assert_eq!(store.metrics().writes(), 2);
    }
}
