/// Gemini REST client
///
/// Talks to the `generateContent` endpoint directly. Text output is read
/// back, along with code the sandbox ran and its output when code execution
/// is enabled. Safety ratings and usage metadata are ignored.

use crate::config::ModelSettings;
use crate::error::{GeminiError, Result};
use crate::gemini::ModelService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<RequestTool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestTool {
    code_execution: CodeExecution,
}

#[derive(Debug, Serialize)]
struct CodeExecution {}

fn request_tools(settings: &ModelSettings) -> Vec<RequestTool> {
    if settings.enable_code_execution {
        vec![RequestTool {
            code_execution: CodeExecution {},
        }]
    } else {
        Vec::new()
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl From<&ModelSettings> for GenerationConfig {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    executable_code: Option<ExecutableCode>,
    #[serde(default)]
    code_execution_result: Option<CodeExecutionResult>,
}

#[derive(Debug, Deserialize)]
struct ExecutableCode {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct CodeExecutionResult {
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    output: String,
}

impl ResponsePart {
    /// Markdown for this part; sandbox parts become fenced blocks
    fn render(self) -> Option<String> {
        if let Some(text) = self.text {
            return Some(text);
        }
        if let Some(executable) = self.executable_code {
            let language = executable
                .language
                .map(|lang| lang.to_lowercase())
                .unwrap_or_else(|| "python".to_string());
            return Some(format!("\n```{}\n{}\n```\n", language, executable.code.trim_end()));
        }
        self.code_execution_result.map(|result| {
            let outcome = result.outcome.unwrap_or_else(|| "OUTCOME_UNSPECIFIED".to_string());
            format!("\n**Output ({}):**\n```\n{}\n```\n", outcome, result.output.trim_end())
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// HTTP client for the Gemini API
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl GeminiClient {
    pub fn with_base(api_key: &str, api_base: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(GeminiError::Config("Gemini API key is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    async fn generate(&self, settings: &ModelSettings, parts: Vec<Part<'_>>) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig::from(settings),
            tools: request_tools(settings),
        };

        debug!(model = %settings.model, "Calling generateContent");

        let response = self
            .http
            .post(self.endpoint(&settings.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(model = %settings.model, %status, "Gemini request failed");
            return Err(GeminiError::Model(format!(
                "Gemini API returned {}: {}",
                status,
                api_error_message(&detail)
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        extract_text(parsed)
    }
}

#[async_trait]
impl ModelService for GeminiClient {
    async fn generate_text(&self, settings: &ModelSettings, prompt: &str) -> Result<String> {
        self.generate(settings, vec![Part::Text { text: prompt }]).await
    }

    async fn generate_from_media(
        &self,
        settings: &ModelSettings,
        prompt: &str,
        mime_type: &str,
        base64_data: &str,
    ) -> Result<String> {
        let parts = vec![
            Part::Text { text: prompt },
            Part::Inline {
                inline_data: InlineData {
                    mime_type,
                    data: base64_data,
                },
            },
        ];
        self.generate(settings, parts).await
    }
}

// Pull the human-readable message out of a Google error body if there is one
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GeminiError::Model(format!("Prompt was blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GeminiError::Model("Gemini returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(ResponsePart::render)
                .collect()
        })
        .unwrap_or_default();

    // A normal stop with nothing to say is left for the tool to word
    if text.is_empty() {
        match candidate.finish_reason.as_deref() {
            None | Some("STOP") => {}
            Some(reason) => {
                return Err(GeminiError::Model(format!(
                    "Gemini returned an empty response (finish reason: {})",
                    reason
                )));
            }
        }
    }

    Ok(text)
}
