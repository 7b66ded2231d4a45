/// Prompt enhancement
///
/// Appends style and requirement guidance to a prompt. Guidance comes from
/// three layers, later ones replacing earlier fields wholesale: general
/// defaults, per-context defaults, then what the store has learned.
/// Verbatim transcription skips all of that and appends a fixed instruction.

use crate::data::{PreferencesStore, StylePreferences};
use crate::intelligence::ContextKey;
use std::sync::Arc;
use tracing::debug;

/// Extra knobs callers can pass alongside the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceParams {
    /// Keep spelled-out letters like U-R-L instead of collapsing to URL
    pub preserve_spelled_acronyms: bool,
}

/// Built-in defaults for a context
pub fn default_preferences(context: ContextKey) -> StylePreferences {
    match context {
        ContextKey::Consciousness => StylePreferences::new(
            "detailed technical",
            &["citations", "specific sources", "academic rigor"],
        ),
        ContextKey::Code => StylePreferences::new(
            "practical examples",
            &["implementation details", "best practices", "working code"],
        ),
        ContextKey::Debugging => StylePreferences::new(
            "root cause analysis",
            &["specific fixes", "detailed explanation", "prevention tips"],
        ),
        ContextKey::General => StylePreferences::new(
            "technical depth",
            &["comprehensive", "accurate", "well-structured"],
        ),
        ContextKey::Verbatim => StylePreferences::new(
            "exact word-for-word transcription",
            &["all utterances", "pauses", "filler words", "complete unedited transcript"],
        ),
    }
}

const VERBATIM_LEAD: &str = "\n\nProvide an exact word-for-word transcription including all utterances, pauses, filler words (um, uh, etc.), repetitions, and incomplete sentences. Preserve emotional expressions in brackets like [laughs] or [sighs]. ";

const PRESERVE_ACRONYMS_CLAUSE: &str =
    "Keep spelled-out letters exactly as spoken with hyphens (like U-R-L, H-T-T-P-S, not URL or HTTPS). ";

const HYPHENATE_ACRONYMS_CLAUSE: &str = "Keep spelled-out letters as hyphenated (like U-R-L not URL). ";

const VERBATIM_TAIL: &str = "Maintain original punctuation including ellipses (...) and dashes. Do not add any artifacts or sounds at the end of the transcription. Do not summarize or clean up the text. Include everything exactly as spoken. This is a verbatim transcription so every word, sound, and pause should be captured.";

/// Prompt enhancer
pub struct PromptEnhancer {
    store: Arc<PreferencesStore>,
}

impl PromptEnhancer {
    pub fn new(store: Arc<PreferencesStore>) -> Self {
        Self { store }
    }

    /// Enhance using defaults plus whatever the store learned for `context`
    pub async fn enhance(&self, prompt: &str, context: ContextKey, params: &EnhanceParams) -> String {
        if context == ContextKey::Verbatim {
            return Self::verbatim(prompt, params);
        }

        let learned = self.store.preferences_for_context(context.as_str()).await;
        Self::apply(prompt, context, params, learned)
    }

    /// Pure enhancement given the learned layer
    pub fn apply(
        prompt: &str,
        context: ContextKey,
        params: &EnhanceParams,
        learned: StylePreferences,
    ) -> String {
        if context == ContextKey::Verbatim {
            return Self::verbatim(prompt, params);
        }

        let effective = default_preferences(ContextKey::General)
            .overlay(default_preferences(context))
            .overlay(learned);

        debug!(context = %context, ?effective, "Applying preferences");

        let mut enhanced = prompt.to_string();

        if let Some(style) = effective.style.as_deref().filter(|s| !s.is_empty()) {
            enhanced.push_str(&format!("\n\nAdopt a {} style.", style));
        }
        if let Some(requirements) = effective.requirements.as_ref().filter(|r| !r.is_empty()) {
            enhanced.push_str(&format!(
                " Ensure the response includes: {}.",
                requirements.join(", ")
            ));
        }

        enhanced
    }

    /// Fixed word-for-word transcription instruction
    pub fn verbatim(prompt: &str, params: &EnhanceParams) -> String {
        debug!("Applying verbatim transcription mode");

        let acronyms = if params.preserve_spelled_acronyms {
            PRESERVE_ACRONYMS_CLAUSE
        } else {
            HYPHENATE_ACRONYMS_CLAUSE
        };

        format!("{}{}{}{}", prompt, VERBATIM_LEAD, acronyms, VERBATIM_TAIL)
    }
}
