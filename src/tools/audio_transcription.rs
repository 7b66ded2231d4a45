/// Audio transcription tool
///
/// Sends the whole file inline (base64) alongside a transcription prompt.
/// Verbatim mode asks for a word-for-word transcript and tidies the model
/// output afterwards.

use crate::config::ModelSettings;
use crate::error::{GeminiError, Result};
use crate::gemini::ModelService;
use crate::intelligence::{EnhanceParams, IntelligenceSystem, PromptEnhancer};
use crate::tools::media::{format_label, load_media, AUDIO};
use crate::tools::{enhancement_footer, optional_bool, optional_str, required_str, Tool, ToolResult};
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const AUDIO_TOOL_NAME: &str = "gemini-transcribe-audio";

const VERBATIM_CONTEXT: &str = "verbatim";

const BASE_PROMPT: &str =
    "Please transcribe this audio file accurately. Provide the complete text of what is spoken.";

// Non-speech sounds the model tends to write out without brackets
const EMOTIONS: &[&str] = &[
    "laughs?", "laughing", "laughed",
    "sighs?", "sighing", "sighed",
    "clears? throat", "clearing throat", "cleared throat",
    "coughs?", "coughing", "coughed",
    "sniffles?", "sniffling", "sniffled",
    "pauses?", "pausing", "paused",
    "giggles?", "giggling", "giggled",
    "whispers?", "whispering", "whispered",
    "yells?", "yelling", "yelled",
    "groans?", "groaning", "groaned",
    "gasps?", "gasping", "gasped",
    "chuckles?", "chuckling", "chuckled",
    "smiles?", "smiling", "smiled",
    "cries?", "cry", "crying", "cried",
    "frustrated sigh", "heavy sigh", "deep sigh", "long sigh",
    "nervous laugh", "awkward laugh", "bitter laugh",
    "scoffs?", "scoffing", "scoffed",
    "mumbles?", "mumbling", "mumbled",
    "mutters?", "muttering", "muttered",
    "stammers?", "stammering", "stammered",
    "stutters?", "stuttering", "stuttered",
    "shouts?", "shouting", "shouted",
    "screams?", "screaming", "screamed",
    "exhales?", "exhaling", "exhaled",
    "inhales?", "inhaling", "inhaled",
    "breathes? deeply", "breathing deeply", "breathed deeply",
    "nods?", "nodding", "nodded",
    "shakes? head", "shaking head", "shook head",
    "silence", "long pause", "brief pause", "awkward silence",
];

/// Post-processing for verbatim transcripts
pub struct VerbatimCleaner {
    trailing_artifact: Regex,
    space_before_punctuation: Regex,
    emotion: Regex,
    spaced_ellipsis: Regex,
    repeated_whitespace: Regex,
}

impl VerbatimCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| GeminiError::Config(format!("invalid pattern: {}", e)))
        };

        Ok(Self {
            // "pppp" / "Ppppppp" noise some models emit at end of audio
            trailing_artifact: compile(r"\s*\b[Pp]+\s*$")?,
            space_before_punctuation: compile(r"\s+([.!?,;:])")?,
            emotion: compile(&format!(r"(?i)\[?\b({})\b\]?", EMOTIONS.join("|")))?,
            spaced_ellipsis: compile(r"\s+\.\s+\.\s+\.")?,
            repeated_whitespace: compile(r"\s{2,}")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let text = self.trailing_artifact.replace(text, "");
        let text = self.space_before_punctuation.replace_all(&text, "$1");
        let text = self.emotion.replace_all(&text, |caps: &Captures| {
            let whole = &caps[0];
            if whole.starts_with('[') && whole.ends_with(']') {
                whole.to_string()
            } else {
                format!("[{}]", &caps[1])
            }
        });
        let text = self.spaced_ellipsis.replace_all(&text, "...");
        let text = self.repeated_whitespace.replace_all(&text, " ");
        text.trim().to_string()
    }
}

pub struct AudioTranscriptionTool {
    intelligence: Arc<IntelligenceSystem>,
    model: Arc<dyn ModelService>,
    settings: ModelSettings,
    cleaner: VerbatimCleaner,
}

impl AudioTranscriptionTool {
    pub fn new(
        intelligence: Arc<IntelligenceSystem>,
        model: Arc<dyn ModelService>,
        settings: ModelSettings,
    ) -> Result<Self> {
        Ok(Self {
            intelligence,
            model,
            settings,
            cleaner: VerbatimCleaner::new()?,
        })
    }

    async fn build_prompt(
        &self,
        base_prompt: &str,
        context: Option<&str>,
        params: &EnhanceParams,
    ) -> String {
        // Verbatim instructions apply even when learning is unavailable
        if is_verbatim(context) && !self.intelligence.is_initialized() {
            return PromptEnhancer::verbatim(base_prompt, params);
        }
        self.intelligence
            .enhance_prompt_with(base_prompt, context, params)
            .await
    }
}

// Matches the detector, which lowercases the hint
fn is_verbatim(context: Option<&str>) -> bool {
    context.is_some_and(|ctx| ctx.eq_ignore_ascii_case(VERBATIM_CONTEXT))
}

#[async_trait]
impl Tool for AudioTranscriptionTool {
    fn name(&self) -> &str {
        AUDIO_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Transcribe audio files to text using Gemini's multimodal capabilities (with learned user preferences)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the audio file to transcribe (supports MP3, WAV, FLAC, AAC, OGG, WEBM, M4A)"
                },
                "language": {
                    "type": "string",
                    "description": "Optional language hint for better transcription accuracy (e.g., \"en\", \"es\", \"fr\")"
                },
                "context": {
                    "type": "string",
                    "description": "Optional context for intelligent enhancement (e.g., \"verbatim\", \"technical\")"
                },
                "preserve_spelled_acronyms": {
                    "type": "boolean",
                    "description": "Keep spelled-out letters (U-R-L) instead of converting to acronyms (URL)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let file_path = required_str(args, "file_path")?;
        let language = optional_str(args, "language")?;
        let context = optional_str(args, "context")?;
        let params = EnhanceParams {
            preserve_spelled_acronyms: optional_bool(args, "preserve_spelled_acronyms")?,
        };
        let verbatim = is_verbatim(context);

        info!(tool = AUDIO_TOOL_NAME, file = file_path, context = context.unwrap_or("general"), "Transcribing audio");

        let audio = load_media(file_path, &AUDIO).await?;
        let size_kb = audio.size_kb();
        debug!(size_kb, mime_type = audio.mime_type, "Audio file loaded");

        let mut base_prompt = BASE_PROMPT.to_string();
        if let Some(language) = language {
            base_prompt.push_str(&format!(" The audio is in {}.", language));
        }

        let enhanced = self.build_prompt(&base_prompt, context, &params).await;
        let mut prompt = enhanced.clone();
        if let Some(context) = context {
            prompt.push_str(&format!(" Context: {}", context));
        }

        let raw = self
            .model
            .generate_from_media(&self.settings, &prompt, audio.mime_type, &audio.encoded())
            .await?;
        let transcription = if verbatim { self.cleaner.clean(&raw) } else { raw };

        if transcription.trim().is_empty() {
            return Ok(ToolResult::text(format!(
                "Could not transcribe audio file: \"{}\". The audio may be unclear, too quiet, or in an unsupported language.",
                file_path
            )));
        }

        let summary = format!(
            "Transcription completed successfully: {} characters",
            transcription.chars().count()
        );
        self.intelligence
            .learn_from_interaction(&base_prompt, &enhanced, &summary, context, Some(AUDIO_TOOL_NAME))
            .await;

        let mut text = format!(
            "✓ Audio file transcribed successfully:\n\n**File:** {}\n**Size:** {:.2}KB\n**Format:** {}\n\n**Transcription:**\n{}",
            file_path,
            size_kb,
            format_label(file_path),
            transcription
        );
        if let Some(context) = context.filter(|_| self.intelligence.is_initialized()) {
            text.push_str(&enhancement_footer(context));
        }

        Ok(ToolResult::text(text))
    }
}
