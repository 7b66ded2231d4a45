/// Runtime configuration
///
/// Everything comes from environment variables with sensible defaults, so
/// the server works when launched bare by an MCP client.

use crate::data::StoreConfig;
use crate::error::{GeminiError, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Audio uploads above this are rejected before reading the file
pub const MAX_AUDIO_SIZE_MB: u64 = 20;

/// Same limit for images sent to analysis
pub const MAX_IMAGE_SIZE_MB: u64 = 20;

/// Extension to MIME type for transcription uploads
pub const SUPPORTED_AUDIO_MIMES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("aac", "audio/aac"),
    ("ogg", "audio/ogg"),
    ("webm", "audio/webm"),
    ("m4a", "audio/mp4"),
];

pub const SUPPORTED_IMAGE_MIMES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
];

/// Which model to call and how
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Let the model run code in Google's sandbox
    pub enable_code_execution: bool,
}

impl ModelSettings {
    pub fn chat() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            enable_code_execution: false,
        }
    }

    // Low temperature keeps transcripts faithful
    pub fn audio_transcription() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.1,
            max_output_tokens: 2048,
            enable_code_execution: false,
        }
    }

    pub fn image_analysis() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.2,
            max_output_tokens: 2048,
            enable_code_execution: false,
        }
    }

    pub fn code_execution() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.1,
            max_output_tokens: 2048,
            enable_code_execution: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base: String,
    pub data_dir: PathBuf,
    pub legacy_preferences_path: Option<PathBuf>,
    pub debug: bool,
    pub chat_model: ModelSettings,
    pub audio_model: ModelSettings,
    pub image_model: ModelSettings,
    pub code_model: ModelSettings,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match non_empty("GEMINI_MCP_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let legacy_preferences_path = non_empty("GEMINI_MCP_LEGACY_PREFERENCES")
            .map(PathBuf::from)
            .or_else(default_legacy_path);

        let mut chat_model = ModelSettings::chat();
        if let Some(model) = non_empty("GEMINI_CHAT_MODEL") {
            chat_model.model = model;
        }

        let mut audio_model = ModelSettings::audio_transcription();
        if let Some(model) = non_empty("GEMINI_AUDIO_MODEL") {
            audio_model.model = model;
        }

        let mut image_model = ModelSettings::image_analysis();
        if let Some(model) = non_empty("GEMINI_IMAGE_MODEL") {
            image_model.model = model;
        }

        let mut code_model = ModelSettings::code_execution();
        if let Some(model) = non_empty("GEMINI_CODE_MODEL") {
            code_model.model = model;
        }

        Ok(Self {
            api_key: non_empty("GEMINI_API_KEY"),
            api_base: non_empty("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            data_dir,
            legacy_preferences_path,
            debug: lookup("DEBUG").as_deref() == Some("true"),
            chat_model,
            audio_model,
            image_model,
            code_model,
        })
    }

    /// Preferences store settings derived from this config
    pub fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::new(&self.data_dir);
        match &self.legacy_preferences_path {
            Some(path) => config.with_legacy_path(path),
            None => config,
        }
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.store_config().preferences_file()
    }

    /// API key, or a configuration error explaining how to set it
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            GeminiError::Config(
                "GEMINI_API_KEY is not set. Export it before starting the server.".to_string(),
            )
        })
    }
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join("gemini-mcp").join("data"))
        .ok_or_else(|| GeminiError::Config("Could not determine a data directory".to_string()))
}

// Where releases before internal storage kept preferences
fn default_legacy_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Claude").join("tool-preferences.json"))
}

/// MIME type for `path` from an extension table, case-insensitive
pub fn mime_type_for(path: &Path, table: &[(&str, &'static str)]) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    table
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, mime)| *mime)
}
