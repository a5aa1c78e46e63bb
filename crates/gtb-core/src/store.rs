//! Durable record store: whole-file JSON records, rewritten on every mutation.
//!
//! The bot keeps a handful of small per-user maps (entitlements, pending
//! receipts, language preferences). Each lives in its own file, is loaded
//! once at startup and rewritten in full after every mutating call. A missing
//! or corrupt file never fails a load; it yields the empty default so the
//! process keeps serving.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

#[derive(Clone, Debug)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, substituting the default on any failure.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self) -> T {
        let txt = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!("failed to read {}: {e}", self.path.display());
                return T::default();
            }
        };

        if txt.trim().is_empty() {
            return T::default();
        }

        match serde_json::from_str(&txt) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("corrupt record file {}: {e}", self.path.display());
                T::default()
            }
        }
    }

    /// Write-through save. Writes a sibling temp file then renames so a crash
    /// mid-write cannot leave a truncated record behind.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let txt = serde_json::to_string_pretty(value)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nope.json"));
        let map: HashMap<i64, u32> = store.load_or_default();
        assert!(map.is_empty());
    }

    #[test]
    fn corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonStore::new(&path);
        let map: HashMap<i64, u32> = store.load_or_default();
        assert!(map.is_empty());
    }

    #[test]
    fn round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("records.json"));

        let mut map = HashMap::new();
        map.insert(42i64, 7u32);
        store.save(&map).unwrap();

        let loaded: HashMap<i64, u32> = store.load_or_default();
        assert_eq!(loaded, map);
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("records.json"));

        store.save(&vec![1, 2, 3]).unwrap();
        store.save(&vec![9]).unwrap();

        let loaded: Vec<i32> = store.load_or_default();
        assert_eq!(loaded, vec![9]);
    }
}
