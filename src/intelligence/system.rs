/// Intelligence system coordinator
///
/// Wires context detection, prompt enhancement and pattern learning around
/// one preferences store. Build one at startup and share it (`Arc`) with
/// every tool.
///
/// Everything here fails open: until `initialize()` succeeds, prompts pass
/// through untouched and learning is skipped, and errors never reach tools.

use crate::data::{PreferenceStats, PreferencesStore};
use crate::error::Result;
use crate::intelligence::{ContextDetector, ContextKey, EnhanceParams, PatternLearner, PromptEnhancer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct IntelligenceSystem {
    store: Arc<PreferencesStore>,
    enhancer: PromptEnhancer,
    learner: PatternLearner,
    initialized: AtomicBool,
}

impl IntelligenceSystem {
    pub fn new(store: Arc<PreferencesStore>) -> Self {
        let enhancer = PromptEnhancer::new(Arc::clone(&store));
        let learner = PatternLearner::new(Arc::clone(&store));

        Self {
            store,
            enhancer,
            learner,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<PreferencesStore> {
        &self.store
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Load preferences; on failure stay in pass-through mode
    ///
    /// Returns whether the system is initialized afterwards. A failed attempt
    /// can be retried by calling this again.
    pub async fn initialize(&self) -> bool {
        if self.is_initialized() {
            debug!("Intelligence System already initialized");
            return true;
        }

        match self.store.initialize().await {
            Ok(()) => {
                self.initialized.store(true, Ordering::Release);
                info!("Intelligence System initialized");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to initialize Intelligence System, prompts will not be enhanced");
                false
            }
        }
    }

    pub async fn enhance_prompt(&self, prompt: &str, explicit_context: Option<&str>) -> String {
        self.enhance_prompt_with(prompt, explicit_context, &EnhanceParams::default())
            .await
    }

    /// Detect the context and enhance, or return `prompt` as-is if uninitialized
    pub async fn enhance_prompt_with(
        &self,
        prompt: &str,
        explicit_context: Option<&str>,
        params: &EnhanceParams,
    ) -> String {
        if !self.is_initialized() {
            debug!("Intelligence System not initialized, skipping prompt enhancement");
            return prompt.to_string();
        }

        let context = ContextDetector::detect(prompt, explicit_context);
        let enhanced = self.enhancer.enhance(prompt, context, params).await;

        debug!(
            context = %context,
            hint = explicit_context.unwrap_or("none"),
            original_len = prompt.len(),
            enhanced_len = enhanced.len(),
            "Enhanced prompt"
        );
        enhanced
    }

    /// Record an interaction. Context is detected again from `original`.
    pub async fn learn_from_interaction(
        &self,
        original: &str,
        enhanced: &str,
        result_summary: &str,
        explicit_context: Option<&str>,
        tool_name: Option<&str>,
    ) {
        if !self.is_initialized() {
            debug!("Intelligence System not initialized, skipping learning");
            return;
        }

        let context = ContextDetector::detect(original, explicit_context);
        if let Err(e) = self
            .learner
            .learn(original, enhanced, result_summary, context, tool_name)
            .await
        {
            warn!(error = %e, context = %context, "Failed to learn from interaction");
        }
    }

    /// Context that `enhance_prompt` would pick
    pub fn detect_context(&self, prompt: &str, explicit_context: Option<&str>) -> ContextKey {
        ContextDetector::detect(prompt, explicit_context)
    }

    pub async fn stats(&self) -> PreferenceStats {
        self.store.stats().await
    }

    pub async fn export_preferences(&self, path: &std::path::Path) -> Result<()> {
        self.store.export_preferences(path).await
    }

    pub async fn import_preferences(&self, path: &std::path::Path) -> Result<()> {
        self.store.import_preferences(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StoreConfig;
    use tempfile::TempDir;

    async fn ready() -> IntelligenceSystem {
        let system = IntelligenceSystem::new(Arc::new(PreferencesStore::in_memory()));
        assert!(system.initialize().await);
        system
    }

    #[tokio::test]
    async fn test_uninitialized_passes_through() {
        let system = IntelligenceSystem::new(Arc::new(PreferencesStore::in_memory()));

        let out = system.enhance_prompt("write some code", None).await;
        assert_eq!(out, "write some code");

        system
            .learn_from_interaction("write some code", &out, "ok", None, Some("gemini-chat"))
            .await;
        assert_eq!(system.stats().await.total_patterns, 0);
    }

    #[tokio::test]
    async fn test_initialize_twice() {
        let system = ready().await;
        assert!(system.initialize().await);
        assert!(system.is_initialized());
    }

    #[tokio::test]
    async fn test_enhance_then_learn() {
        let system = ready().await;

        let enhanced = system.enhance_prompt("implement a queue", None).await;
        assert!(enhanced.contains("practical examples"));

        system
            .learn_from_interaction("implement a queue", &enhanced, "here you go", None, Some("gemini-chat"))
            .await;

        let patterns = system.store().get_patterns("code").await;
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].enhanced, enhanced);

        // Learned preferences now shape the next enhancement
        let next = system.enhance_prompt("implement a stack", None).await;
        assert!(next.contains("Adopt a concise style."));
    }

    #[tokio::test]
    async fn test_verbatim_hint() {
        let system = ready().await;

        let params = EnhanceParams {
            preserve_spelled_acronyms: true,
        };
        let out = system
            .enhance_prompt_with("Transcribe the consciousness lecture", Some("verbatim"), &params)
            .await;
        assert!(out.contains("exactly as spoken with hyphens"));
        assert_eq!(system.detect_context("anything", Some("verbatim")), ContextKey::Verbatim);
    }

    #[tokio::test]
    async fn test_learning_context_is_recomputed() {
        let system = ready().await;

        // Enhanced as general, learned under the hint given at learn time
        let enhanced = system.enhance_prompt("tell me a story", None).await;
        system
            .learn_from_interaction("tell me a story", &enhanced, "once upon", Some("aurora"), None)
            .await;

        assert!(system.store().get_patterns("general").await.is_empty());
        assert_eq!(system.store().get_patterns("consciousness").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_degrades_and_retries() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        let data_dir = blocker.join("data");

        // Store construction succeeds once, then the data dir becomes uncreatable
        let store = PreferencesStore::new(StoreConfig::new(&data_dir)).unwrap();
        std::fs::remove_dir_all(&blocker).unwrap();
        std::fs::write(&blocker, "not a directory").unwrap();

        let system = IntelligenceSystem::new(Arc::new(store));
        assert!(!system.initialize().await);
        assert!(!system.is_initialized());
        assert_eq!(system.enhance_prompt("fix this bug", None).await, "fix this bug");

        // Clear the obstacle and try again
        std::fs::remove_file(&blocker).unwrap();
        assert!(system.initialize().await);
        assert!(system.enhance_prompt("fix this bug", None).await.contains("Adopt a"));
    }
}
