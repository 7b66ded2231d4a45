// Model access
pub mod client;

pub use client::GeminiClient;

use crate::config::ModelSettings;
use crate::error::Result;
use async_trait::async_trait;

/// Anything that can turn a prompt into model output
///
/// Tools depend on this rather than on `GeminiClient` so they can run
/// against a canned responder in tests.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn generate_text(&self, settings: &ModelSettings, prompt: &str) -> Result<String>;

    /// Prompt plus one inline attachment (base64 payload)
    async fn generate_from_media(
        &self,
        settings: &ModelSettings,
        prompt: &str,
        mime_type: &str,
        base64_data: &str,
    ) -> Result<String>;
}
