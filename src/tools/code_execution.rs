use crate::config::ModelSettings;
use crate::error::Result;
use crate::gemini::ModelService;
use crate::intelligence::IntelligenceSystem;
use crate::tools::{enhancement_footer, optional_str, required_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const CODE_TOOL_NAME: &str = "gemini-code-execute";

/// Runs Python in Gemini's code execution sandbox
///
/// Nothing executes locally. The model settings must enable code execution
/// or the model will only describe what the code would do.
pub struct CodeExecutionTool {
    intelligence: Arc<IntelligenceSystem>,
    model: Arc<dyn ModelService>,
    settings: ModelSettings,
}

impl CodeExecutionTool {
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

fn base_prompt(code: &str) -> String {
    format!(
        "Please execute this Python code and show the results:\n\n```python\n{}\n```\n\nExecute the code and provide both the code output and any results.",
        code
    )
}

fn code_block(code: &str) -> String {
    format!("**Code:**\n```python\n{}\n```", code)
}

fn log_preview(code: &str) -> String {
    code.chars().take(100).collect()
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn name(&self) -> &str {
        CODE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute Python code using Gemini's built-in code execution sandbox (with learned user preferences)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python code to execute in the sandbox"
                },
                "context": {
                    "type": "string",
                    "description": "Optional context for intelligent enhancement (e.g., \"data-science\", \"automation\", \"testing\")"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let code = required_str(args, "code")?;
        let context = optional_str(args, "context")?;

        info!(
            tool = CODE_TOOL_NAME,
            code = %log_preview(code),
            context = context.unwrap_or("general"),
            "Executing Python code"
        );

        let base = base_prompt(code);
        let enhanced = self.intelligence.enhance_prompt(&base, context).await;

        let mut prompt = enhanced.clone();
        if let Some(context) = context {
            prompt.push_str(&format!("\n\nContext: {}", context));
        }

        let response = self.model.generate_text(&self.settings, &prompt).await?;

        if response.trim().is_empty() {
            return Ok(ToolResult::text(format!(
                "Code execution completed but no output was generated. The code may have run successfully without producing visible results.\n\n{}",
                code_block(code)
            )));
        }

        self.intelligence
            .learn_from_interaction(
                &base,
                &enhanced,
                "Code executed successfully with response text",
                context,
                Some(CODE_TOOL_NAME),
            )
            .await;

        let mut text = format!(
            "✓ Python code executed successfully:\n\n{}\n\n**Response:**\n{}",
            code_block(code),
            response.trim_end()
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
    use crate::error::GeminiError;
    use crate::tools::fake::FakeModel;

    async fn setup(model: FakeModel, initialize: bool) -> (CodeExecutionTool, Arc<IntelligenceSystem>, Arc<FakeModel>) {
        let intelligence = Arc::new(IntelligenceSystem::new(Arc::new(PreferencesStore::in_memory())));
        if initialize {
            assert!(intelligence.initialize().await);
        }
        let model = Arc::new(model);
        let tool = CodeExecutionTool::new(
            Arc::clone(&intelligence),
            Arc::clone(&model) as Arc<dyn ModelService>,
            ModelSettings::code_execution(),
        );
        (tool, intelligence, model)
    }

    #[tokio::test]
    async fn test_execute_enhances_and_learns() {
        let (tool, intelligence, model) = setup(FakeModel::replying("Output: 6\n"), true).await;

        let result = tool
            .execute(&json!({"code": "print(sum([1, 2, 3]))", "context": "data-science"}))
            .await
            .unwrap();

        let text = result.text_content();
        assert!(text.starts_with(
            "✓ Python code executed successfully:\n\n**Code:**\n```python\nprint(sum([1, 2, 3]))\n```\n\n**Response:**\nOutput: 6"
        ));
        assert!(text.ends_with("Output: 6\n\n---\n_Enhancement applied based on context: data-science_"));

        let call = model.last_call().await.unwrap();
        assert!(call.mime_type.is_none());
        assert!(call.prompt.starts_with("Please execute this Python code and show the results:"));
        assert!(call.prompt.contains("Adopt a practical examples style."));
        assert!(call.prompt.ends_with("\n\nContext: data-science"));

        let learned = intelligence.store().get_patterns("code").await;
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].tool.as_deref(), Some(CODE_TOOL_NAME));
        assert!(learned[0].original.contains("print(sum([1, 2, 3]))"));
    }

    #[tokio::test]
    async fn test_execute_without_intelligence() {
        let (tool, _, model) = setup(FakeModel::replying("hello"), false).await;

        let result = tool
            .execute(&json!({"code": "print('hello')", "context": "testing"}))
            .await
            .unwrap();

        assert!(!result.text_content().contains("Enhancement applied"));
        let prompt = model.last_call().await.unwrap().prompt;
        assert_eq!(prompt, format!("{}\n\nContext: testing", base_prompt("print('hello')")));
    }

    #[tokio::test]
    async fn test_execute_no_output() {
        let (tool, intelligence, _) = setup(FakeModel::replying(" \n"), true).await;

        let result = tool.execute(&json!({"code": "x = 1"})).await.unwrap();
        let text = result.text_content();
        assert!(text.starts_with("Code execution completed but no output was generated."));
        assert!(text.ends_with("```python\nx = 1\n```"));
        assert_eq!(intelligence.stats().await.total_patterns, 0);
    }

    #[tokio::test]
    async fn test_execute_requires_code() {
        let (tool, _, model) = setup(FakeModel::replying("x"), true).await;
        let err = tool.execute(&json!({"context": "testing"})).await.unwrap_err();
        assert!(matches!(err, GeminiError::InvalidArgument(msg) if msg.contains("code is required")));
        assert!(model.last_call().await.is_none());
    }

    #[test]
    fn test_log_preview_is_char_safe() {
        let code = "é".repeat(150);
        assert_eq!(log_preview(&code).chars().count(), 100);
    }
}
