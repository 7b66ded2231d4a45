/// Intelligence module
///
/// Detects what a prompt is about, enhances it with learned preferences,
/// and learns from each completed tool interaction.

pub mod context_detector;
pub mod pattern_learner;
pub mod prompt_enhancer;
pub mod system;

pub use context_detector::{ContextDetector, ContextKey};
pub use pattern_learner::PatternLearner;
pub use prompt_enhancer::{default_preferences, EnhanceParams, PromptEnhancer};
pub use system::IntelligenceSystem;
