/// Preferences store
///
/// Owns the on-disk preference document. Handles the one-time copy of a
/// legacy external file, keeps a write-through cache, and caps per-context
/// pattern history.
///
/// All mutations run while holding the state lock, so concurrent callers are
/// serialized: each read-modify-write lands before the next one starts.

use crate::data::models::{
    MigrationInfo, PatternRecord, PreferenceDocument, PreferenceStats, StylePreferences,
};
use crate::data::storage_adapter::{StorageAdapter, StorageStats, PREFERENCES_KEY};
use crate::error::{GeminiError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File name of the canonical document inside the data directory
pub const PREFERENCES_FILE_NAME: &str = "tool-preferences.json";

/// Where the store keeps its data and where to look for a legacy file
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub legacy_path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            legacy_path: None,
        }
    }

    pub fn with_legacy_path<P: AsRef<Path>>(mut self, legacy_path: P) -> Self {
        self.legacy_path = Some(legacy_path.as_ref().to_path_buf());
        self
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE_NAME)
    }
}

#[derive(Default)]
struct StoreState {
    initialized: bool,
    cache: Option<PreferenceDocument>,
}

pub struct PreferencesStore {
    data_dir: Option<PathBuf>,
    legacy_path: Option<PathBuf>,
    storage: StorageAdapter,
    state: Mutex<StoreState>,
}

impl PreferencesStore {
    /// Store backed by `<data_dir>/tool-preferences.json`
    pub fn new(config: StoreConfig) -> Result<Self> {
        let storage = StorageAdapter::json(config.preferences_file())?;

        Ok(Self {
            data_dir: Some(config.data_dir),
            legacy_path: config.legacy_path,
            storage,
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Store over an arbitrary adapter (no data directory to manage)
    pub fn with_storage(storage: StorageAdapter, legacy_path: Option<PathBuf>) -> Self {
        Self {
            data_dir: None,
            legacy_path,
            storage,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Disposable store for tests and throwaway sessions
    pub fn in_memory() -> Self {
        Self::with_storage(StorageAdapter::memory(), None)
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    /// Prepare the store for use
    ///
    /// Creates the data directory, runs the legacy migration if it applies,
    /// then loads the document into the cache. Load failures fall back to an
    /// empty document, so only directory creation can make this fail.
    /// Calling it again is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.initialized {
            debug!("PreferencesStore already initialized");
            return Ok(());
        }

        if let Some(dir) = &self.data_dir {
            tokio::fs::create_dir_all(dir).await?;
        }

        self.migrate_locked(&mut state).await;
        self.load_locked(&mut state).await;

        state.initialized = true;
        info!("PreferencesStore initialized");
        Ok(())
    }

    /// Copy the legacy file into internal storage if it applies
    ///
    /// Runs only when the legacy file exists and the internal file does not.
    /// The legacy file is never modified. Returns whether a migration happened;
    /// failures are logged and reported as `false`.
    pub async fn migrate_external_preferences(&self) -> bool {
        let mut state = self.state.lock().await;
        self.migrate_locked(&mut state).await
    }

    async fn migrate_locked(&self, state: &mut StoreState) -> bool {
        let Some(legacy_path) = &self.legacy_path else {
            return false;
        };

        if !tokio::fs::try_exists(legacy_path).await.unwrap_or(false) {
            return false;
        }

        match self.internal_document_exists().await {
            Ok(false) => {}
            Ok(true) => return false,
            Err(e) => {
                warn!(error = %e, "Could not check internal preferences, skipping migration");
                return false;
            }
        }

        info!(legacy = %legacy_path.display(), "Migrating external preferences to internal storage");

        let legacy = match read_document_file(legacy_path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Error migrating external preferences, continuing with fresh preferences");
                return false;
            }
        };

        let document = PreferenceDocument {
            patterns: legacy.patterns,
            last_updated: Some(legacy.last_updated.unwrap_or_else(Utc::now)),
            migration_info: MigrationInfo {
                migrated: true,
                migration_date: Some(Utc::now()),
            },
        };

        match self.persist(state, document).await {
            Ok(()) => {
                info!(
                    legacy = %legacy_path.display(),
                    "Migration complete, external file preserved"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Error migrating external preferences, continuing with fresh preferences");
                false
            }
        }
    }

    /// Any file at the canonical path counts, even an empty one
    async fn internal_document_exists(&self) -> Result<bool> {
        match self.storage.path() {
            Some(path) => Ok(tokio::fs::try_exists(path).await?),
            None => self.storage.exists(PREFERENCES_KEY).await,
        }
    }

    /// Reload the cache from storage, seeding an empty document when absent
    pub async fn load_preferences(&self) {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await;
    }

    async fn load_locked(&self, state: &mut StoreState) {
        let loaded = match self.storage.read(PREFERENCES_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<PreferenceDocument>(value) {
                Ok(doc) => {
                    debug!("Loaded preferences from internal storage");
                    Some(doc)
                }
                Err(e) => {
                    warn!(error = %e, "Stored preferences are malformed, using defaults");
                    None
                }
            },
            Ok(None) => {
                debug!("No stored preferences, using defaults");
                None
            }
            Err(e) => {
                warn!(error = %e, "Error loading preferences, using defaults");
                None
            }
        };

        state.cache = Some(loaded.unwrap_or_default());
    }

    /// Normalize and persist a whole document
    ///
    /// `lastUpdated` defaults to now. The store's own migration record is
    /// kept; the incoming document's `migrationInfo` is ignored.
    pub async fn save_preferences(&self, doc: PreferenceDocument) -> Result<()> {
        let mut state = self.state.lock().await;
        ensure_initialized(&state)?;

        let document = PreferenceDocument {
            patterns: doc.patterns,
            last_updated: Some(doc.last_updated.unwrap_or_else(Utc::now)),
            migration_info: current_migration(&state),
        };

        self.persist(&mut state, document).await
    }

    /// Snapshot of the cached document
    pub async fn get_preferences(&self) -> PreferenceDocument {
        let state = self.state.lock().await;
        state
            .cache
            .clone()
            .unwrap_or_else(PreferenceDocument::unloaded)
    }

    pub async fn get_patterns(&self, context_key: &str) -> Vec<PatternRecord> {
        let state = self.state.lock().await;
        state
            .cache
            .as_ref()
            .map(|doc| doc.patterns_for(context_key).to_vec())
            .unwrap_or_default()
    }

    /// Append a pattern, keep the newest 100, persist
    pub async fn add_pattern(&self, context_key: &str, pattern: PatternRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        ensure_initialized(&state)?;

        let mut document = state.cache.clone().unwrap_or_default();
        document.push_pattern(context_key, pattern);
        document.last_updated = Some(Utc::now());

        self.persist(&mut state, document).await?;
        debug!(context = context_key, "Stored interaction pattern");
        Ok(())
    }

    /// Drop every pattern; the migration record survives
    pub async fn clear_preferences(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        ensure_initialized(&state)?;

        let document = PreferenceDocument {
            patterns: Default::default(),
            last_updated: Some(Utc::now()),
            migration_info: current_migration(&state),
        };

        self.persist(&mut state, document).await?;
        info!("Preferences cleared");
        Ok(())
    }

    /// Write the current document to `path` (backup)
    pub async fn export_preferences<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let state = self.state.lock().await;
        ensure_initialized(&state)?;

        let document = state
            .cache
            .clone()
            .unwrap_or_else(PreferenceDocument::unloaded);
        let body = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, body).await?;

        info!(path = %path.display(), "Preferences exported");
        Ok(())
    }

    /// Replace the current document with the one at `path`
    ///
    /// Unlike the initial load, a missing or corrupt file is an error here.
    pub async fn import_preferences<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let document = read_document_file(path).await?;

        self.save_preferences(document).await?;
        info!(path = %path.display(), "Preferences imported");
        Ok(())
    }

    /// What the enhancer should apply for this context on top of defaults
    ///
    /// Coarse for now: any history at all means the user gets concise output.
    pub async fn preferences_for_context(&self, context_key: &str) -> StylePreferences {
        let state = self.state.lock().await;
        if !state.initialized {
            return StylePreferences::default();
        }

        let has_history = state
            .cache
            .as_ref()
            .is_some_and(|doc| !doc.patterns_for(context_key).is_empty());

        if has_history {
            StylePreferences::new("concise", &["key points"])
        } else {
            StylePreferences::default()
        }
    }

    pub async fn stats(&self) -> PreferenceStats {
        let state = self.state.lock().await;
        match &state.cache {
            Some(doc) => PreferenceStats::from(doc),
            None => PreferenceStats::from(&PreferenceDocument::unloaded()),
        }
    }

    pub async fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.stats().await
    }

    /// Write first, then update the cache
    async fn persist(&self, state: &mut StoreState, document: PreferenceDocument) -> Result<()> {
        let value = serde_json::to_value(&document)?;
        self.storage.write(PREFERENCES_KEY, &value).await?;
        state.cache = Some(document);
        Ok(())
    }
}

fn ensure_initialized(state: &StoreState) -> Result<()> {
    if state.initialized {
        Ok(())
    } else {
        Err(GeminiError::NotInitialized)
    }
}

fn current_migration(state: &StoreState) -> MigrationInfo {
    state
        .cache
        .as_ref()
        .map(|doc| doc.migration_info.clone())
        .unwrap_or_default()
}

async fn read_document_file(path: &Path) -> Result<PreferenceDocument> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GeminiError::StorageRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    serde_json::from_str(&raw).map_err(|e| GeminiError::StorageRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
