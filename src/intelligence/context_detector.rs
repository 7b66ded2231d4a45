/// Context detection for prompt enhancement
///
/// Classifies a prompt into one of a few fixed categories using keyword
/// containment. Matching is substring-based and case-insensitive, so
/// "scriptable" counts as "script".

use std::str::FromStr;

/// Prompt category used to pick enhancement defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    Verbatim,
    Consciousness,
    Code,
    Debugging,
    General,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::Verbatim => "verbatim",
            ContextKey::Consciousness => "consciousness",
            ContextKey::Code => "code",
            ContextKey::Debugging => "debugging",
            ContextKey::General => "general",
        }
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContextKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verbatim" => Ok(ContextKey::Verbatim),
            "consciousness" => Ok(ContextKey::Consciousness),
            "code" => Ok(ContextKey::Code),
            "debugging" => Ok(ContextKey::Debugging),
            "general" => Ok(ContextKey::General),
            other => Err(format!("unknown context: {}", other)),
        }
    }
}

const CONSCIOUSNESS_KEYWORDS: &[&str] = &[
    "consciousness",
    "awareness",
    "emergence",
    "cognitive",
    "sentience",
    "qualia",
];

const CODE_KEYWORDS: &[&str] = &[
    "code",
    "implement",
    "function",
    "class",
    "debug",
    "error",
    "bug",
    "programming",
    "script",
    "api",
];

// Overlaps CODE_KEYWORDS on debug/error/bug; code is checked first.
const DEBUGGING_KEYWORDS: &[&str] = &[
    "debug",
    "fix",
    "error",
    "bug",
    "issue",
    "problem",
    "not working",
    "fails",
    "exception",
];

/// Context detector
pub struct ContextDetector;

impl ContextDetector {
    /// Resolve the context for a prompt, first match wins
    ///
    /// An explicit `"verbatim"` hint beats everything, then prompt keywords
    /// (consciousness, code, debugging), then looser hint matching.
    pub fn detect(prompt: &str, explicit_context: Option<&str>) -> ContextKey {
        let hint = explicit_context.map(str::to_lowercase);
        let hint = hint.as_deref();

        if hint == Some("verbatim") {
            return ContextKey::Verbatim;
        }

        let prompt = prompt.to_lowercase();

        if contains_any(&prompt, CONSCIOUSNESS_KEYWORDS) || hint.is_some_and(|h| h.contains("aurora")) {
            return ContextKey::Consciousness;
        }
        if contains_any(&prompt, CODE_KEYWORDS) {
            return ContextKey::Code;
        }
        if contains_any(&prompt, DEBUGGING_KEYWORDS) {
            return ContextKey::Debugging;
        }

        if let Some(hint) = hint {
            if hint.contains("consciousness") || hint.contains("aurora") {
                return ContextKey::Consciousness;
            }
            if hint.contains("code") || hint.contains("mcp") {
                return ContextKey::Code;
            }
            if hint.contains("debug") || hint.contains("fix") {
                return ContextKey::Debugging;
            }
        }

        ContextKey::General
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbatim_hint_wins() {
        assert_eq!(
            ContextDetector::detect("consciousness and code and a bug", Some("verbatim")),
            ContextKey::Verbatim
        );
        assert_eq!(ContextDetector::detect("", Some("VERBATIM")), ContextKey::Verbatim);
    }

    #[test]
    fn test_verbatim_must_match_exactly() {
        // Containing the word is not enough
        assert_eq!(
            ContextDetector::detect("hello there", Some("verbatim please")),
            ContextKey::General
        );
    }

    #[test]
    fn test_consciousness_keywords() {
        assert_eq!(
            ContextDetector::detect("What is Qualia?", None),
            ContextKey::Consciousness
        );
        assert_eq!(
            ContextDetector::detect("explain emergence in code", None),
            ContextKey::Consciousness
        );
    }

    #[test]
    fn test_aurora_hint() {
        assert_eq!(
            ContextDetector::detect("write a function", Some("Project Aurora")),
            ContextKey::Consciousness
        );
    }

    #[test]
    fn test_code_beats_debugging() {
        assert_eq!(
            ContextDetector::detect("I have a bug in my function", None),
            ContextKey::Code
        );
        assert_eq!(
            ContextDetector::detect("there is an error", None),
            ContextKey::Code
        );
    }

    #[test]
    fn test_debugging_keywords() {
        assert_eq!(
            ContextDetector::detect("My build fails every morning", None),
            ContextKey::Debugging
        );
        assert_eq!(
            ContextDetector::detect("the printer is not working", None),
            ContextKey::Debugging
        );
    }

    #[test]
    fn test_substring_matching() {
        // "scriptable" contains "script"
        assert_eq!(
            ContextDetector::detect("Is this editor scriptable?", None),
            ContextKey::Code
        );
    }

    #[test]
    fn test_hint_fallbacks() {
        assert_eq!(
            ContextDetector::detect("tell me a story", Some("mcp servers")),
            ContextKey::Code
        );
        assert_eq!(
            ContextDetector::detect("tell me a story", Some("Debugging session")),
            ContextKey::Debugging
        );
        assert_eq!(
            ContextDetector::detect("tell me a story", Some("consciousness studies")),
            ContextKey::Consciousness
        );
        assert_eq!(
            ContextDetector::detect("tell me a story", Some("travel")),
            ContextKey::General
        );
    }

    #[test]
    fn test_general_default() {
        assert_eq!(
            ContextDetector::detect("What should I cook tonight?", None),
            ContextKey::General
        );
    }

    #[test]
    fn test_context_key_round_trip() {
        for key in [
            ContextKey::Verbatim,
            ContextKey::Consciousness,
            ContextKey::Code,
            ContextKey::Debugging,
            ContextKey::General,
        ] {
            assert_eq!(key.as_str().parse::<ContextKey>().unwrap(), key);
        }
        assert!("poetry".parse::<ContextKey>().is_err());
    }
}
