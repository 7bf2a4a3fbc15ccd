use material_store::{
    ErrorKind, JsonFileRepository, Material, MaterialDetails, MaterialRepository, MaterialStore,
    MaterialType,
};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn sample_catalog() -> Vec<Material> {
    vec![
        Material::new("b1", "The Rust Book", "Klabnik", MaterialType::Book, 39.99, 2019)
            .unwrap()
            .with_details(MaterialDetails {
                isbn: Some("978-1718500440".into()),
                publisher: Some("No Starch".into()),
                ..MaterialDetails::default()
            }),
        Material::new("m1", "Byte", "McGraw-Hill", MaterialType::Magazine, 4.5, 1984)
            .unwrap()
            .with_details(MaterialDetails {
                issue_number: Some(12),
                ..MaterialDetails::default()
            }),
        Material::new("a1", "Dune", "Herbert", MaterialType::AudioBook, 25.0, 2007)
            .unwrap()
            .with_discount(0.25)
            .unwrap()
            .with_details(MaterialDetails {
                duration_minutes: Some(1260),
                narrator: Some("Scott Brick".into()),
                ..MaterialDetails::default()
            }),
    ]
}

fn as_set(records: &[Material]) -> HashSet<String> {
    records
        .iter()
        .map(|m| serde_json::to_string(m).unwrap())
        .collect()
}

#[test]
fn test_save_load_save_is_stable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    let repository = JsonFileRepository::new(&path);

    let records: Vec<Arc<Material>> = sample_catalog().into_iter().map(Arc::new).collect();
    repository.save_all(&records).unwrap();
    let first = fs::read_to_string(&path).unwrap();

    let loaded = repository.load_all().unwrap();
    assert_eq!(as_set(&loaded), as_set(&sample_catalog()));

    let reloaded: Vec<Arc<Material>> = loaded.into_iter().map(Arc::new).collect();
    repository.save_all(&reloaded).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), first);
}

#[test]
fn test_store_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let repository = JsonFileRepository::new(dir.path().join("catalog.json"));

    let store = MaterialStore::new();
    store.add_all(sample_catalog()).unwrap();
    assert_eq!(store.save_to(&repository).unwrap(), 3);

    let restored = MaterialStore::from_repository(&repository).unwrap();
    assert_eq!(restored.size().unwrap(), 3);
    assert_eq!(restored.aggregate_stats().unwrap(), store.aggregate_stats().unwrap());
    assert_eq!(
        restored.get("a1").unwrap().unwrap().details().narrator.as_deref(),
        Some("Scott Brick")
    );
}

#[test]
fn test_file_uses_type_tag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    let records: Vec<Arc<Material>> = sample_catalog().into_iter().map(Arc::new).collect();
    JsonFileRepository::new(&path).save_all(&records).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"type\": \"AUDIO_BOOK\""));
    assert!(content.find("\"a1\"").unwrap() < content.find("\"b1\"").unwrap());
}

#[test]
fn test_invalid_records_are_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(
        &path,
        r#"[{"id": "x", "title": "Bad", "creator": "Nobody", "type": "BOOK", "price": -3.0, "year": 2000}]"#,
    )
    .unwrap();

    let store = MaterialStore::new();
    let err = store.load_from(&JsonFileRepository::new(&path)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(store.is_empty().unwrap());
}
