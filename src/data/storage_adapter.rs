/// Key/value persistence over a JSON file or an in-process map
///
/// The JSON backend keeps everything in one file. The reserved
/// `PREFERENCES_KEY` addresses the whole document; any other key lives as a
/// top-level field of that same object and is read-merged-written.

use crate::error::{GeminiError, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::debug;

/// Key that maps to the entire JSON document
pub const PREFERENCES_KEY: &str = "preferences";

/// Which backend a storage adapter uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Json,
    Memory,
}

impl FromStr for StorageKind {
    type Err = GeminiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(StorageKind::Json),
            "memory" => Ok(StorageKind::Memory),
            other => Err(GeminiError::UnsupportedStorage(other.to_string())),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Json => write!(f, "json"),
            StorageKind::Memory => write!(f, "memory"),
        }
    }
}

enum Backend {
    Json { path: PathBuf },
    Memory { entries: Mutex<HashMap<String, Value>> },
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq)]
pub enum StorageStats {
    Json {
        path: PathBuf,
        exists: bool,
        size_bytes: u64,
        modified: Option<DateTime<Utc>>,
    },
    Memory {
        entries: usize,
        keys: Vec<String>,
    },
}

pub struct StorageAdapter {
    backend: Backend,
}

impl StorageAdapter {
    /// Create an adapter from a backend name (`"json"` or `"memory"`)
    ///
    /// Fails before touching the filesystem when the kind is unknown or a
    /// JSON backend has no path. For JSON, the parent directory is created.
    pub fn new(kind: &str, path: Option<&Path>) -> Result<Self> {
        let kind = StorageKind::from_str(kind)?;
        Self::with_kind(kind, path)
    }

    pub fn with_kind(kind: StorageKind, path: Option<&Path>) -> Result<Self> {
        let backend = match kind {
            StorageKind::Json => {
                let path = path
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| {
                        GeminiError::Config("A storage path must be provided for JSON storage".to_string())
                    })?
                    .to_path_buf();

                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            GeminiError::Config(format!(
                                "Could not create storage directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }

                Backend::Json { path }
            }
            StorageKind::Memory => Backend::Memory {
                entries: Mutex::new(HashMap::new()),
            },
        };

        Ok(Self { backend })
    }

    /// Durable JSON file backend
    pub fn json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_kind(StorageKind::Json, Some(path.as_ref()))
    }

    /// Transient backend, lost on drop
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory {
                entries: Mutex::new(HashMap::new()),
            },
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self.backend {
            Backend::Json { .. } => StorageKind::Json,
            Backend::Memory { .. } => StorageKind::Memory,
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Json { path } => Some(path),
            Backend::Memory { .. } => None,
        }
    }

    pub async fn read(&self, key: &str) -> Result<Option<Value>> {
        match &self.backend {
            Backend::Json { path } => {
                let Some(document) = read_document(path).await? else {
                    return Ok(None);
                };

                if key == PREFERENCES_KEY {
                    Ok(Some(document))
                } else {
                    Ok(document.get(key).cloned())
                }
            }
            Backend::Memory { entries } => Ok(entries.lock().await.get(key).cloned()),
        }
    }

    pub async fn write(&self, key: &str, data: &Value) -> Result<()> {
        match &self.backend {
            Backend::Json { path } => {
                if key == PREFERENCES_KEY {
                    write_document(path, data).await?;
                } else {
                    let mut object = existing_object(path).await?;
                    object.insert(key.to_string(), data.clone());
                    write_document(path, &Value::Object(object)).await?;
                }
                debug!(key, path = %path.display(), "Data written to JSON storage");
                Ok(())
            }
            Backend::Memory { entries } => {
                entries.lock().await.insert(key.to_string(), data.clone());
                debug!(key, "Data written to memory storage");
                Ok(())
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match &self.backend {
            Backend::Json { path } => {
                let Some(document) = read_document(path).await? else {
                    return Ok(false);
                };

                if key == PREFERENCES_KEY {
                    // A file holding `{}` or `null` does not count as a document.
                    Ok(document.as_object().is_some_and(|o| !o.is_empty()))
                } else {
                    Ok(document.get(key).is_some())
                }
            }
            Backend::Memory { entries } => Ok(entries.lock().await.contains_key(key)),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Json { path } => {
                if !file_exists(path).await {
                    return Ok(());
                }

                if key == PREFERENCES_KEY {
                    tokio::fs::remove_file(path).await.map_err(|e| write_error(path, e))?;
                } else {
                    let mut object = existing_object(path).await?;
                    if object.remove(key).is_some() {
                        write_document(path, &Value::Object(object)).await?;
                    }
                }
                debug!(key, path = %path.display(), "Data deleted from JSON storage");
                Ok(())
            }
            Backend::Memory { entries } => {
                entries.lock().await.remove(key);
                debug!(key, "Data deleted from memory storage");
                Ok(())
            }
        }
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        match &self.backend {
            Backend::Json { path } => match tokio::fs::metadata(path).await {
                Ok(meta) => Ok(StorageStats::Json {
                    path: path.clone(),
                    exists: true,
                    size_bytes: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StorageStats::Json {
                    path: path.clone(),
                    exists: false,
                    size_bytes: 0,
                    modified: None,
                }),
                Err(e) => Err(read_error(path, e)),
            },
            Backend::Memory { entries } => {
                let entries = entries.lock().await;
                let mut keys: Vec<String> = entries.keys().cloned().collect();
                keys.sort();
                Ok(StorageStats::Memory {
                    entries: entries.len(),
                    keys,
                })
            }
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Parse the whole file, `None` when it does not exist
async fn read_document(path: &Path) -> Result<Option<Value>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_error(path, e)),
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| read_error(path, e))
}

async fn existing_object(path: &Path) -> Result<Map<String, Value>> {
    match read_document(path).await? {
        Some(Value::Object(object)) => Ok(object),
        _ => Ok(Map::new()),
    }
}

/// Replace the file contents via a temp file + rename
async fn write_document(path: &Path, data: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(path, e))?;
        }
    }

    let body = serde_json::to_string_pretty(data).map_err(|e| write_error(path, e))?;
    let tmp = path.with_extension("json.tmp");

    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| write_error(path, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_error(path, e))?;

    Ok(())
}

fn read_error(path: &Path, reason: impl std::fmt::Display) -> GeminiError {
    GeminiError::StorageRead {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn write_error(path: &Path, reason: impl std::fmt::Display) -> GeminiError {
    GeminiError::StorageWrite {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_unsupported_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never").join("prefs.json");

        let result = StorageAdapter::new("bogus", Some(&path));
        assert!(matches!(result, Err(GeminiError::UnsupportedStorage(ref k)) if k == "bogus"));

        // Nothing was created on disk
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn test_json_requires_path() {
        let result = StorageAdapter::new("json", None);
        assert!(matches!(result, Err(GeminiError::Config(_))));

        let result = StorageAdapter::new("json", Some(Path::new("")));
        assert!(matches!(result, Err(GeminiError::Config(_))));
    }

    #[test]
    fn test_json_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data").join("prefs.json");

        let storage = StorageAdapter::new("json", Some(&path)).unwrap();
        assert_eq!(storage.kind(), StorageKind::Json);
        assert!(dir.path().join("nested").join("data").is_dir());
    }

    #[tokio::test]
    async fn test_json_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = StorageAdapter::json(dir.path().join("prefs.json")).unwrap();

        assert_eq!(storage.read(PREFERENCES_KEY).await.unwrap(), None);
        assert!(!storage.exists(PREFERENCES_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_json_whole_document_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let storage = StorageAdapter::json(&path).unwrap();

        let doc = json!({"patterns": {}, "lastUpdated": "2025-01-01T00:00:00Z"});
        storage.write(PREFERENCES_KEY, &doc).await.unwrap();

        assert!(storage.exists(PREFERENCES_KEY).await.unwrap());
        assert_eq!(storage.read(PREFERENCES_KEY).await.unwrap(), Some(doc.clone()));

        // The file holds exactly the document, no wrapper
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, doc);
    }

    #[tokio::test]
    async fn test_json_other_keys_merge() {
        let dir = TempDir::new().unwrap();
        let storage = StorageAdapter::json(dir.path().join("prefs.json")).unwrap();

        storage.write("alpha", &json!(1)).await.unwrap();
        storage.write("beta", &json!({"x": true})).await.unwrap();

        assert_eq!(storage.read("alpha").await.unwrap(), Some(json!(1)));
        assert_eq!(storage.read("beta").await.unwrap(), Some(json!({"x": true})));
        assert_eq!(storage.read("gamma").await.unwrap(), None);

        storage.delete("alpha").await.unwrap();
        assert!(!storage.exists("alpha").await.unwrap());
        assert!(storage.exists("beta").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_empty_object_is_not_a_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{}").unwrap();

        let storage = StorageAdapter::json(&path).unwrap();
        assert!(!storage.exists(PREFERENCES_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_json_corrupt_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = StorageAdapter::json(&path).unwrap();
        let result = storage.read(PREFERENCES_KEY).await;
        assert!(matches!(result, Err(GeminiError::StorageRead { .. })));
    }

    #[tokio::test]
    async fn test_json_delete_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let storage = StorageAdapter::json(&path).unwrap();

        storage.write(PREFERENCES_KEY, &json!({"patterns": {}})).await.unwrap();
        storage.delete(PREFERENCES_KEY).await.unwrap();
        assert!(!path.exists());

        // Deleting again is fine
        storage.delete(PREFERENCES_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_stats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let storage = StorageAdapter::json(&path).unwrap();

        match storage.stats().await.unwrap() {
            StorageStats::Json { exists, .. } => assert!(!exists),
            other => panic!("Expected JSON stats, got {:?}", other),
        }

        storage.write(PREFERENCES_KEY, &json!({"patterns": {}})).await.unwrap();

        match storage.stats().await.unwrap() {
            StorageStats::Json { exists, size_bytes, .. } => {
                assert!(exists);
                assert!(size_bytes > 0);
            }
            other => panic!("Expected JSON stats, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let storage = StorageAdapter::new("memory", None).unwrap();
        assert_eq!(storage.kind(), StorageKind::Memory);
        assert!(storage.path().is_none());

        assert_eq!(storage.read("k").await.unwrap(), None);
        storage.write("k", &json!("v")).await.unwrap();
        assert!(storage.exists("k").await.unwrap());
        assert_eq!(storage.read("k").await.unwrap(), Some(json!("v")));

        match storage.stats().await.unwrap() {
            StorageStats::Memory { entries, keys } => {
                assert_eq!(entries, 1);
                assert_eq!(keys, vec!["k".to_string()]);
            }
            other => panic!("Expected memory stats, got {:?}", other),
        }

        storage.delete("k").await.unwrap();
        assert!(!storage.exists("k").await.unwrap());
    }
}
