// Turns finished tool interactions into pattern records
//
// The result text isn't inspected yet, so every record is marked successful.

use crate::data::{PatternRecord, PreferencesStore};
use crate::error::Result;
use crate::intelligence::ContextKey;
use std::sync::Arc;
use tracing::debug;

pub struct PatternLearner {
    store: Arc<PreferencesStore>,
}

impl PatternLearner {
    pub fn new(store: Arc<PreferencesStore>) -> Self {
        Self { store }
    }

    // Record one interaction under its context. Store errors come straight back.
    pub async fn learn(
        &self,
        original_prompt: &str,
        enhanced_prompt: &str,
        _result_summary: &str,
        context: ContextKey,
        tool_name: Option<&str>,
    ) -> Result<()> {
        debug!(context = %context, tool = tool_name.unwrap_or("N/A"), "Learning from interaction");

        let pattern = PatternRecord::new(original_prompt, enhanced_prompt, context.as_str(), tool_name);
        self.store.add_pattern(context.as_str(), pattern).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeminiError;

    async fn setup() -> (PatternLearner, Arc<PreferencesStore>) {
        let store = Arc::new(PreferencesStore::in_memory());
        store.initialize().await.unwrap();
        (PatternLearner::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_learn_records_pattern() {
        let (learner, store) = setup().await;

        learner
            .learn("fix my loop", "fix my loop\n\nAdopt a ...", "done", ContextKey::Debugging, Some("gemini-chat"))
            .await
            .unwrap();

        let history = store.get_patterns("debugging").await;
        assert_eq!(history.len(), 1);

        let record = &history[0];
        assert_eq!(record.original, "fix my loop");
        assert_eq!(record.context, "debugging");
        assert_eq!(record.tool.as_deref(), Some("gemini-chat"));
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_learn_without_tool_name() {
        let (learner, store) = setup().await;

        learner
            .learn("hello", "hello!", "hi", ContextKey::General, None)
            .await
            .unwrap();

        assert!(store.get_patterns("general").await[0].tool.is_none());
    }

    #[tokio::test]
    async fn test_learn_propagates_store_errors() {
        let store = Arc::new(PreferencesStore::in_memory());
        let learner = PatternLearner::new(store);

        let result = learner.learn("a", "b", "c", ContextKey::Code, None).await;
        assert!(matches!(result, Err(GeminiError::NotInitialized)));
    }
}
