//! The `info.json` record of packages already fetched into a target directory.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::HarvestError;

pub const CACHE_FILE_NAME: &str = "info.json";

/// Names of packages that were completely fetched, sorted for stable output.
pub type CacheRecord = BTreeSet<String>;

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    #[must_use]
    pub fn new(target_dir: &Path) -> Self {
        Self {
            path: target_dir.join(CACHE_FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record; a missing file is an empty record.
    ///
    /// # Errors
    ///
    /// `CacheIo` when the file exists but cannot be read or is not a JSON array of strings.
    pub fn load(&self) -> Result<CacheRecord, HarvestError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(CacheRecord::new()),
            Err(err) => return Err(HarvestError::cache_io(&self.path, err)),
        };
        let names: Vec<String> = serde_json::from_str(&contents)
            .map_err(|err| HarvestError::cache_io(&self.path, err))?;
        Ok(names.into_iter().collect())
    }

    /// Like [`load`](Self::load), but writes an empty record first when none exists.
    ///
    /// # Errors
    ///
    /// `CacheIo` on read, parse or write failure.
    pub fn load_or_init(&self) -> Result<CacheRecord, HarvestError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "initializing empty cache file");
            self.persist(&CacheRecord::new())?;
        }
        self.load()
    }

    /// Replace the file with `record` in one rename, so readers never see a partial write.
    ///
    /// # Errors
    ///
    /// `CacheIo` when the replacement cannot be written or moved into place.
    pub fn persist(&self, record: &CacheRecord) -> Result<(), HarvestError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp =
            NamedTempFile::new_in(parent).map_err(|err| HarvestError::cache_io(&self.path, err))?;
        let names: Vec<&String> = record.iter().collect();
        serde_json::to_writer(&mut tmp, &names)
            .map_err(|err| HarvestError::cache_io(&self.path, err))?;
        tmp.flush()
            .map_err(|err| HarvestError::cache_io(&self.path, err))?;
        tmp.persist(&self.path)
            .map_err(|err| HarvestError::cache_io(&self.path, err.error))?;
        debug!(path = %self.path.display(), entries = record.len(), "persisted cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_initialized_as_empty_array() {
        let temp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(temp.path());
        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());

        assert!(store.load_or_init().unwrap().is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
    }

    #[test]
    fn persist_rewrites_the_whole_set() {
        let temp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(temp.path());
        store
            .persist(&["requests".to_string(), "idna".to_string()].into())
            .unwrap();
        store
            .persist(&["idna".to_string(), "six".to_string()].into())
            .unwrap();
        let names: Vec<String> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(names, vec!["idna", "six"]);
    }

    #[test]
    fn reads_arrays_written_by_other_tools() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(CACHE_FILE_NAME),
            "[\n  \"urllib3\",\n  \"boto3\",\n  \"urllib3\"\n]\n",
        )
        .unwrap();
        let record = CacheStore::new(temp.path()).load().unwrap();
        assert_eq!(record.len(), 2);
        assert!(record.contains("boto3"));
    }

    #[test]
    fn malformed_file_is_a_cache_error() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(CACHE_FILE_NAME), "{\"rows\": []}").unwrap();
        let err = CacheStore::new(temp.path()).load_or_init().unwrap_err();
        assert_eq!(err.kind(), "cache-io");
    }

    #[test]
    fn unwritable_location_is_a_cache_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(&temp.path().join("missing"));
        let err = store.persist(&CacheRecord::new()).unwrap_err();
        assert_eq!(err.kind(), "cache-io");
    }
}
