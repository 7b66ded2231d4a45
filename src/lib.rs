/// gemini-mcp library
///
/// MCP server exposing Gemini tools, with a small learning layer that
/// tailors prompts to what the user asked for before.

pub mod config;
pub mod data;
pub mod error;
pub mod gemini;
pub mod intelligence;
pub mod logging;
pub mod mcp;
pub mod tools;

// Re-exports for convenience
pub use config::Config;
pub use data::PreferencesStore;
pub use error::{GeminiError, Result};
pub use intelligence::IntelligenceSystem;
