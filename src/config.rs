//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Persona instruction sent alongside every assembled prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are FELICIA, a warm and helpful Personal Intelligent Assistant.

Your personality:
- Friendly, patient, and encouraging
- You speak naturally, not like a robot
- You remember you're running LOCALLY on the user's device
- You celebrate that the user's data stays private

Your capabilities:
- General conversation and help
- Answering questions
- Helping the user organize their thoughts
- Reading and referencing the user's personal knowledge files

IMPORTANT: When you receive \"Relevant information from user's knowledge folder\",
USE that information to answer the question. Reference the file names when appropriate.
This is the user's personal data; treat it as your primary source of truth for their questions.

Be concise but warm. Use emoji sparingly (1-2 per message max).";

/// Assistant message appended when the completion backend cannot be reached.
pub const FALLBACK_REPLY: &str = "Failed to connect to local AI. Make sure Ollama is running.";

/// Runtime configuration for the assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the Ollama-compatible completion backend.
    pub ollama_url: String,
    /// Model identifier sent with every completion request.
    pub model: String,
    /// Optional bearer token for backends sitting behind a gateway.
    pub api_key: Option<SecretString>,
    pub temperature: f32,
    pub top_p: f32,
    /// Number of trailing transcript messages included in each prompt.
    pub history_window: usize,
    /// Maximum snippets retrieved per query.
    pub retrieval_limit: usize,
    /// Snippet truncation, in characters.
    pub snippet_max_chars: usize,
    /// Per-document truncation applied at ingestion time, in characters.
    pub doc_max_chars: usize,
    /// Pause before an onboarding prompt is appended.
    pub turn_delay: Duration,
    pub db_path: PathBuf,
    /// Port for the JSON HTTP API. `None` disables the server.
    pub http_port: Option<u16>,
    pub system_prompt: String,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            temperature: 0.7,
            top_p: 0.9,
            history_window: 10,
            retrieval_limit: 3,
            snippet_max_chars: 500,
            doc_max_chars: 50_000,
            turn_delay: Duration::from_millis(500),
            db_path: PathBuf::from("./data/felicia.db"),
            http_port: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            log_dir: None,
        }
    }
}

impl AssistantConfig {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            ollama_url: get("OLLAMA_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_url),
            model: get("OLLAMA_MODEL").unwrap_or(defaults.model),
            api_key: get("OLLAMA_API_KEY").map(SecretString::from),
            temperature: parse_or(get("FELICIA_TEMPERATURE"), "FELICIA_TEMPERATURE", defaults.temperature)?,
            top_p: parse_or(get("FELICIA_TOP_P"), "FELICIA_TOP_P", defaults.top_p)?,
            history_window: parse_or(
                get("FELICIA_HISTORY_WINDOW"),
                "FELICIA_HISTORY_WINDOW",
                defaults.history_window,
            )?,
            retrieval_limit: parse_or(
                get("FELICIA_RETRIEVAL_LIMIT"),
                "FELICIA_RETRIEVAL_LIMIT",
                defaults.retrieval_limit,
            )?,
            snippet_max_chars: parse_or(
                get("FELICIA_SNIPPET_CHARS"),
                "FELICIA_SNIPPET_CHARS",
                defaults.snippet_max_chars,
            )?,
            doc_max_chars: parse_or(
                get("FELICIA_DOC_MAX_CHARS"),
                "FELICIA_DOC_MAX_CHARS",
                defaults.doc_max_chars,
            )?,
            turn_delay: Duration::from_millis(parse_or(
                get("FELICIA_TURN_DELAY_MS"),
                "FELICIA_TURN_DELAY_MS",
                defaults.turn_delay.as_millis() as u64,
            )?),
            db_path: get("FELICIA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            http_port: match get("FELICIA_HTTP_PORT") {
                Some(raw) => Some(parse_value(&raw, "FELICIA_HTTP_PORT")?),
                None => None,
            },
            system_prompt: get("FELICIA_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            log_dir: get("FELICIA_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default),
    }
}

fn parse_value<T>(raw: &str, key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}
