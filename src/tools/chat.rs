use crate::config::ModelSettings;
use crate::error::Result;
use crate::gemini::ModelService;
use crate::intelligence::IntelligenceSystem;
use crate::tools::{enhancement_footer, optional_str, required_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const CHAT_TOOL_NAME: &str = "gemini-chat";

/// General conversation with learned preferences applied
pub struct ChatTool {
    intelligence: Arc<IntelligenceSystem>,
    model: Arc<dyn ModelService>,
    settings: ModelSettings,
}

impl ChatTool {
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
impl Tool for ChatTool {
    fn name(&self) -> &str {
        CHAT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Chat with Gemini AI for conversations, questions, and general assistance (with learned user preferences)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Your message or question to chat with Gemini AI"
                },
                "context": {
                    "type": "string",
                    "description": "Optional additional context for the conversation (e.g., \"aurora\", \"debugging\", \"code\")"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let message = required_str(args, "message")?;
        let context = optional_str(args, "context")?;

        info!(tool = CHAT_TOOL_NAME, context = context.unwrap_or("general"), "Processing chat message");

        let enhanced = self.intelligence.enhance_prompt(message, context).await;
        let response = self.model.generate_text(&self.settings, &enhanced).await?;

        if response.trim().is_empty() {
            return Ok(ToolResult::text(format!(
                "I couldn't generate a response to: \"{}\". Please try rephrasing your message.",
                message
            )));
        }

        self.intelligence
            .learn_from_interaction(message, &enhanced, &response, context, Some(CHAT_TOOL_NAME))
            .await;

        let mut text = response;
        if let Some(context) = context.filter(|_| self.intelligence.is_initialized()) {
            text.push_str(&enhancement_footer(context));
        }

        Ok(ToolResult::text(text))
    }
}
