/// MCP tools
///
/// Each tool owns its JSON schema and turns call arguments into a
/// `ToolResult`. Tools share one `IntelligenceSystem` and one model service.

pub mod audio_transcription;
pub mod chat;
pub mod code_execution;
pub mod image_analysis;
mod media;

pub use audio_transcription::AudioTranscriptionTool;
pub use chat::ChatTool;
pub use code_execution::CodeExecutionTool;
pub use image_analysis::ImageAnalysisTool;

use crate::config::Config;
use crate::error::{GeminiError, Result};
use crate::gemini::ModelService;
use crate::intelligence::IntelligenceSystem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Footer appended when a caller-supplied context shaped the prompt
pub fn enhancement_footer(context: &str) -> String {
    format!("\n\n---\n_Enhancement applied based on context: {}_", context)
}

/// Tool call result in MCP wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Concatenated text content
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|item| match item {
                ToolContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;

    async fn execute(&self, args: &Value) -> Result<ToolResult>;

    /// Entry for `tools/list`
    fn metadata(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

/// Registered tools, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool
    pub fn with_defaults(
        config: &Config,
        intelligence: Arc<IntelligenceSystem>,
        model: Arc<dyn ModelService>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(ChatTool::new(
            Arc::clone(&intelligence),
            Arc::clone(&model),
            config.chat_model.clone(),
        )));
        registry.register(Arc::new(AudioTranscriptionTool::new(
            Arc::clone(&intelligence),
            Arc::clone(&model),
            config.audio_model.clone(),
        )?));
        registry.register(Arc::new(CodeExecutionTool::new(
            Arc::clone(&intelligence),
            Arc::clone(&model),
            config.code_model.clone(),
        )));
        registry.register(Arc::new(ImageAnalysisTool::new(
            intelligence,
            model,
            config.image_model.clone(),
        )));
        Ok(registry)
    }

    /// Add a tool; a tool with the same name is replaced in place
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => {
                warn!(tool = tool.name(), "Tool already registered, overwriting");
                self.tools[index] = tool;
            }
            None => {
                debug!(tool = tool.name(), "Registered tool");
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn list_metadata(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.metadata()).collect()
    }

    pub async fn call(&self, name: &str, args: &Value) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| GeminiError::UnknownTool(name.to_string()))?;

        debug!(tool = name, "Dispatching tool call");
        tool.execute(args).await
    }
}

/// Required non-empty string argument
pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str> {
    match args.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => Err(GeminiError::InvalidArgument(format!(
            "{} must be a non-empty string",
            field
        ))),
        Some(_) => Err(GeminiError::InvalidArgument(format!("{} must be a string", field))),
        None => Err(GeminiError::InvalidArgument(format!("{} is required", field))),
    }
}

/// Optional string argument; null and empty count as absent
pub(crate) fn optional_str<'a>(args: &'a Value, field: &str) -> Result<Option<&'a str>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(GeminiError::InvalidArgument(format!("{} must be a string", field))),
    }
}

pub(crate) fn optional_bool(args: &Value, field: &str) -> Result<bool> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(GeminiError::InvalidArgument(format!("{} must be a boolean", field))),
    }
}

/// Canned model responses for tool tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::config::ModelSettings;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub model: String,
        pub prompt: String,
        pub mime_type: Option<String>,
        pub data: Option<String>,
    }

    pub struct FakeModel {
        reply: std::result::Result<String, String>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    impl FakeModel {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub async fn last_call(&self) -> Option<RecordedCall> {
            self.calls.lock().await.last().cloned()
        }

        fn respond(&self) -> Result<String> {
            self.reply.clone().map_err(GeminiError::Model)
        }
    }

    #[async_trait]
    impl ModelService for FakeModel {
        async fn generate_text(&self, settings: &ModelSettings, prompt: &str) -> Result<String> {
            self.calls.lock().await.push(RecordedCall {
                model: settings.model.clone(),
                prompt: prompt.to_string(),
                mime_type: None,
                data: None,
            });
            self.respond()
        }

        async fn generate_from_media(
            &self,
            settings: &ModelSettings,
            prompt: &str,
            mime_type: &str,
            base64_data: &str,
        ) -> Result<String> {
            self.calls.lock().await.push(RecordedCall {
                model: settings.model.clone(),
                prompt: prompt.to_string(),
                mime_type: Some(mime_type.to_string()),
                data: Some(base64_data.to_string()),
            });
            self.respond()
        }
    }
}
