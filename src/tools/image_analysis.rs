/// Image analysis tool
///
/// Sends a local image inline with a prompt chosen by `analysis_type`.
/// Learned preferences shape the prompt the same way they do for chat.

use crate::config::ModelSettings;
use crate::error::{GeminiError, Result};
use crate::gemini::ModelService;
use crate::intelligence::IntelligenceSystem;
use crate::tools::media::{format_label, load_media, IMAGE};
use crate::tools::{enhancement_footer, optional_str, required_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const IMAGE_TOOL_NAME: &str = "gemini-analyze-image";

const CUSTOM_FALLBACK_PROMPT: &str = "Please analyze this image and describe what you observe.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    Summary,
    Objects,
    Text,
    Detailed,
    Custom,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 5] = [
        AnalysisType::Summary,
        AnalysisType::Objects,
        AnalysisType::Text,
        AnalysisType::Detailed,
        AnalysisType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::Summary => "summary",
            AnalysisType::Objects => "objects",
            AnalysisType::Text => "text",
            AnalysisType::Detailed => "detailed",
            AnalysisType::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Base prompt; `custom` uses the caller's context as the prompt
    fn prompt(self, context: Option<&str>) -> &str {
        match self {
            AnalysisType::Summary => "Please provide a comprehensive summary of this image. Describe what you see, including objects, people, settings, colors, composition, and overall content.",
            AnalysisType::Objects => "Please identify and describe all objects, people, text, and visual elements visible in this image. List them systematically with their locations and characteristics.",
            AnalysisType::Text => "Please extract and transcribe all text visible in this image. Include any signs, labels, captions, or written content you can read.",
            AnalysisType::Detailed => "Please provide a detailed analysis of this image including: visual description, objects and people present, text content, colors and composition, mood or atmosphere, and any notable details or artistic elements.",
            AnalysisType::Custom => context.unwrap_or(CUSTOM_FALLBACK_PROMPT),
        }
    }
}

fn analysis_type_arg(args: &Value) -> Result<AnalysisType> {
    let Some(value) = optional_str(args, "analysis_type")? else {
        return Ok(AnalysisType::Summary);
    };

    AnalysisType::parse(value).ok_or_else(|| {
        let allowed: Vec<&str> = AnalysisType::ALL.iter().map(|kind| kind.as_str()).collect();
        GeminiError::InvalidArgument(format!(
            "analysis_type must be one of [{}], but received '{}'",
            allowed.join(", "),
            value
        ))
    })
}

pub struct ImageAnalysisTool {
    intelligence: Arc<IntelligenceSystem>,
    model: Arc<dyn ModelService>,
    settings: ModelSettings,
}

impl ImageAnalysisTool {
    pub fn new(
        intelligence: Arc<IntelligenceSystem>,
        model: Arc<dyn ModelService>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            intelligence,
            model,
            settings,
        }
    }
}

#[async_trait]
impl Tool for ImageAnalysisTool {
    fn name(&self) -> &str {
        IMAGE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Analyze images using Gemini's multimodal vision capabilities (with learned user preferences)"
    }

    fn input_schema(&self) -> Value {
        let kinds: Vec<&str> = AnalysisType::ALL.iter().map(|kind| kind.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the image file to analyze (supports JPEG, PNG, WebP, HEIC, HEIF, BMP, GIF)"
                },
                "analysis_type": {
                    "type": "string",
                    "description": "Type of analysis to perform: \"summary\", \"objects\", \"text\", \"detailed\", or \"custom\"",
                    "enum": kinds
                },
                "context": {
                    "type": "string",
                    "description": "Optional context for intelligent enhancement (e.g., \"medical\", \"architectural\", \"nature\")"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let file_path = required_str(args, "file_path")?;
        let analysis_type = analysis_type_arg(args)?;
        let context = optional_str(args, "context")?;

        info!(
            tool = IMAGE_TOOL_NAME,
            file = file_path,
            analysis_type = analysis_type.as_str(),
            context = context.unwrap_or("general"),
            "Analyzing image"
        );

        let image = load_media(file_path, &IMAGE).await?;
        debug!(size_kb = image.size_kb(), mime_type = image.mime_type, "Image file loaded");

        let base_prompt = analysis_type.prompt(context);
        let enhanced = self.intelligence.enhance_prompt(base_prompt, context).await;

        let mut prompt = enhanced.clone();
        // Custom analysis already used the context as its prompt
        if let Some(context) = context.filter(|_| analysis_type != AnalysisType::Custom) {
            prompt.push_str(&format!(" Additional context: {}", context));
        }

        let analysis = self
            .model
            .generate_from_media(&self.settings, &prompt, image.mime_type, &image.encoded())
            .await?;

        if analysis.trim().is_empty() {
            return Ok(ToolResult::text(format!(
                "Could not analyze image file: \"{}\". The image may be corrupted, too complex, or in an unsupported format.",
                file_path
            )));
        }

        let summary = format!(
            "Image analysis completed successfully: {} characters, type: {}",
            analysis.chars().count(),
            analysis_type.as_str()
        );
        self.intelligence
            .learn_from_interaction(base_prompt, &enhanced, &summary, context, Some(IMAGE_TOOL_NAME))
            .await;

        let mut text = format!(
            "✓ Image file analyzed successfully:\n\n**File:** {}\n**Size:** {:.2}KB\n**Format:** {}\n**Analysis Type:** {}\n\n**Analysis:**\n{}",
            file_path,
            image.size_kb(),
            format_label(file_path),
            analysis_type.as_str(),
            analysis
        );
        if let Some(context) = context.filter(|_| self.intelligence.is_initialized()) {
            text.push_str(&enhancement_footer(context));
        }

        Ok(ToolResult::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PreferencesStore;
    use crate::tools::fake::FakeModel;
    use tempfile::TempDir;

    async fn setup(reply: &str, initialize: bool) -> (ImageAnalysisTool, Arc<IntelligenceSystem>, Arc<FakeModel>) {
        let intelligence = Arc::new(IntelligenceSystem::new(Arc::new(PreferencesStore::in_memory())));
        if initialize {
            assert!(intelligence.initialize().await);
        }
        let model = Arc::new(FakeModel::replying(reply));
        let tool = ImageAnalysisTool::new(
            Arc::clone(&intelligence),
            Arc::clone(&model) as Arc<dyn ModelService>,
            ModelSettings::image_analysis(),
        );
        (tool, intelligence, model)
    }

    fn image_file(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_analyze_summary_with_context() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "bridge.jpg");
        let (tool, intelligence, model) = setup("A suspension bridge at dusk.", true).await;

        let result = tool
            .execute(&json!({"file_path": path, "context": "architectural"}))
            .await
            .unwrap();

        let text = result.text_content();
        assert!(text.starts_with("✓ Image file analyzed successfully:"));
        assert!(text.contains("**Format:** JPG\n**Analysis Type:** summary"));
        assert!(text.contains("**Analysis:**\nA suspension bridge at dusk."));
        assert!(text.ends_with("_Enhancement applied based on context: architectural_"));

        let call = model.last_call().await.unwrap();
        assert_eq!(call.model, "gemini-2.0-flash");
        assert_eq!(call.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(call.data.as_deref(), Some("/9j/4A=="));
        assert!(call.prompt.starts_with("Please provide a comprehensive summary of this image."));
        assert!(call.prompt.ends_with(" Additional context: architectural"));

        let learned = intelligence.store().get_patterns("general").await;
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].tool.as_deref(), Some(IMAGE_TOOL_NAME));
    }

    #[tokio::test]
    async fn test_custom_analysis_uses_context_as_prompt() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "chart.png");
        let (tool, _, model) = setup("Revenue doubled.", false).await;

        tool.execute(&json!({
            "file_path": path,
            "analysis_type": "custom",
            "context": "What trend does this chart show?"
        }))
        .await
        .unwrap();

        let call = model.last_call().await.unwrap();
        assert_eq!(call.prompt, "What trend does this chart show?");
        assert_eq!(call.mime_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_text_analysis_without_intelligence() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "sign.webp");
        let (tool, intelligence, model) = setup("NO PARKING", false).await;

        let result = tool
            .execute(&json!({"file_path": path, "analysis_type": "text", "context": "street"}))
            .await
            .unwrap();

        assert!(!result.text_content().contains("Enhancement applied"));
        let prompt = model.last_call().await.unwrap().prompt;
        assert!(prompt.starts_with("Please extract and transcribe all text visible in this image."));
        assert!(!prompt.contains("Adopt a"));
        assert_eq!(intelligence.stats().await.total_patterns, 0);
    }

    #[tokio::test]
    async fn test_rejects_unknown_analysis_type() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "cat.gif");
        let (tool, _, model) = setup("x", true).await;

        let err = tool
            .execute(&json!({"file_path": path, "analysis_type": "vibes"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::InvalidArgument(msg) if msg.contains("received 'vibes'")));
        assert!(model.last_call().await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_image_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.mp3");
        std::fs::write(&path, b"ID3").unwrap();
        let (tool, _, _) = setup("x", true).await;

        let err = tool
            .execute(&json!({"file_path": path.to_string_lossy()}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported image format"));
    }

    #[tokio::test]
    async fn test_empty_analysis() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "blank.bmp");
        let (tool, intelligence, _) = setup("", true).await;

        let result = tool.execute(&json!({"file_path": path})).await.unwrap();
        assert!(result.text_content().starts_with("Could not analyze image file"));
        assert_eq!(intelligence.stats().await.total_patterns, 0);
    }

    #[test]
    fn test_schema_lists_analysis_types() {
        let schema = json!({"enum": ["summary", "objects", "text", "detailed", "custom"]});
        let intelligence = Arc::new(IntelligenceSystem::new(Arc::new(PreferencesStore::in_memory())));
        let tool = ImageAnalysisTool::new(
            intelligence,
            Arc::new(FakeModel::replying("x")),
            ModelSettings::image_analysis(),
        );
        assert_eq!(tool.input_schema()["properties"]["analysis_type"]["enum"], schema["enum"]);
    }
}
