use super::MaterialRepository;
use crate::core::Material;
use crate::errors::Result;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// Catalog stored as one pretty-printed JSON array
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MaterialRepository for JsonFileRepository {
    fn load_all(&self) -> Result<Vec<Material>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no catalog file, starting empty");
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let records: Vec<Material> = serde_json::from_reader(BufReader::new(file))?;
        debug!(path = %self.path.display(), records = records.len(), "catalog read");
        Ok(records)
    }

    fn save_all(&self, records: &[Arc<Material>]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Sorted by id so identical content produces identical files
        let mut sorted: Vec<&Material> = records.iter().map(|m| m.as_ref()).collect();
        sorted.sort_by(|a, b| a.id().cmp(b.id()));

        // Uniquely named temp file in the target directory, renamed over the
        // target once synced. Dropped (and deleted) on any error before that.
        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &sorted)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;

        debug!(path = %self.path.display(), records = sorted.len(), "catalog written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MaterialType;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("catalog.json"));
        assert!(repo.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.json");
        let repo = JsonFileRepository::new(&path);

        let record = Arc::new(
            Material::new("b1", "Dune", "Herbert", MaterialType::Book, 9.5, 1965).unwrap(),
        );
        repo.save_all(&[record]).unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
        let loaded = repo.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title(), "Dune");
    }

    #[test]
    fn test_overlapping_saves_publish_whole_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");

        let batch = |prefix: &str, size: usize| -> Vec<Arc<Material>> {
            (0..size)
                .map(|i| {
                    let id = format!("{}-{:04}", prefix, i);
                    Arc::new(Material::new(id, "Title", "Author", MaterialType::Book, 1.0, 2000).unwrap())
                })
                .collect()
        };
        let small = batch("s", 10);
        let large = batch("l", 2000);

        let writers: Vec<_> = [small, large]
            .into_iter()
            .map(|records| {
                let repo = JsonFileRepository::new(&path);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        repo.save_all(&records).unwrap();
                    }
                })
            })
            .collect();

        let reader = JsonFileRepository::new(&path);
        for _ in 0..50 {
            let loaded = reader.load_all().unwrap();
            assert!(loaded.is_empty() || loaded.len() == 10 || loaded.len() == 2000);
        }
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // The target is a directory, so the final rename fails
        let target = dir.path().join("catalog.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let record = Arc::new(Material::new("b1", "Dune", "Herbert", MaterialType::Book, 9.5, 1965).unwrap());
        assert!(JsonFileRepository::new(&target).save_all(&[record]).is_err());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("catalog.json")]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "{ not json").unwrap();

        let repo = JsonFileRepository::new(&path);
        assert_eq!(
            repo.load_all().unwrap_err().kind(),
            crate::errors::ErrorKind::Io
        );
    }
}
