//! Record table keyed by material id
//!
//! Point operations are safe on their own (DashMap shards its locks). The
//! coordinator is only needed when a caller wants several records to reflect
//! the same instant.

use crate::core::Material;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct RecordTable {
    records: DashMap<String, Arc<Material>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Insert unless the id is taken. An existing record is never replaced.
    pub fn insert_if_absent(&self, material: Arc<Material>) -> bool {
        match self.records.entry(material.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(material);
                true
            }
        }
    }

    /// Swap in a new version of an existing record, returning the old one.
    /// Absent ids are left absent.
    pub fn replace_existing(&self, material: Arc<Material>) -> Option<Arc<Material>> {
        match self.records.get_mut(material.id()) {
            Some(mut current) => Some(std::mem::replace(current.value_mut(), material)),
            None => None,
        }
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Material>> {
        self.records.remove(id).map(|(_, material)| material)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Material>> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Copy of every record. Only consistent across records if the caller
    /// holds (or validates) a coordinator acquisition around the call.
    pub fn snapshot_values(&self) -> Vec<Arc<Material>> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MaterialType;

    fn material(id: &str, title: &str) -> Arc<Material> {
        Arc::new(Material::new(id, title, "Anon", MaterialType::Book, 5.0, 2001).unwrap())
    }

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let table = RecordTable::new();
        assert!(table.insert_if_absent(material("1", "First")));
        assert!(!table.insert_if_absent(material("1", "Second")));
        assert_eq!(table.get("1").unwrap().title(), "First");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_replace_existing_only() {
        let table = RecordTable::new();
        assert!(table.replace_existing(material("1", "Ghost")).is_none());
        assert!(!table.contains("1"));

        table.insert_if_absent(material("1", "Old"));
        let previous = table.replace_existing(material("1", "New")).unwrap();
        assert_eq!(previous.title(), "Old");
        assert_eq!(table.get("1").unwrap().title(), "New");
    }

    #[test]
    fn test_remove_and_snapshot() {
        let table = RecordTable::new();
        table.insert_if_absent(material("1", "A"));
        table.insert_if_absent(material("2", "B"));

        assert_eq!(table.remove("1").unwrap().id(), "1");
        assert!(table.remove("1").is_none());

        let snapshot = table.snapshot_values();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), "2");

        table.clear();
        assert!(table.is_empty());
    }
}
