/// Data module for gemini-mcp
///
/// Persists learned preferences as a single JSON document and exposes
/// the storage abstraction it is built on.

pub mod models;
pub mod preferences;
pub mod storage_adapter;

pub use models::*;
pub use preferences::{PreferencesStore, StoreConfig, PREFERENCES_FILE_NAME};
pub use storage_adapter::{StorageAdapter, StorageKind, StorageStats, PREFERENCES_KEY};
