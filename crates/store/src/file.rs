//! JSON-file backed key-value store.
//!
//! The whole store is a single flat JSON object. Every write replaces the
//! file atomically (temp file in the same directory, then rename), so a crash
//! mid-write leaves either the old or the new contents on disk.

use memochat_types::{KeyValueStorage, Result, TransportError};
use serde_json::{Map, Value};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A persistent [`KeyValueStorage`] backed by a JSON file.
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Opens (without creating) the store at `path`.
    ///
    /// Parent directories are created lazily on the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default store location: `~/.memochat/storage.json`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Storage`] if `HOME` is not set.
    pub fn default_path() -> Result<PathBuf> {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".memochat").join("storage.json"))
            .map_err(|_| TransportError::Storage("cannot determine home directory".into()))
    }

    /// Returns the file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(TransportError::Storage(format!(
                    "read {}: {e}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "storage file is corrupt, starting empty");
                Ok(Map::new())
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, map)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| TransportError::Storage(format!("persist {}: {e}", self.path.display())))?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut Map<String, Value>) -> bool) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        if f(&mut map) {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_map()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|map| {
            map.insert(key.to_string(), Value::String(value.to_string()));
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|map| map.remove(key).is_some())
    }
}
