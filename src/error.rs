//! Error types for FELICIA.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Onboarding script error: {0}")]
    Script(#[from] ScriptError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Completion backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Knowledge folder ingestion errors.
///
/// `Read` and `NotText` are per-file and get skipped during ingestion.
/// `Access` means the folder itself could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Cannot access folder {path}: {reason}")]
    Access { path: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Not a text file: {path}")]
    NotText { path: String },
}

/// Authoring defects in an onboarding script, caught when the script is built.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Onboarding script has no steps")]
    Empty,

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Step {step} transitions to unknown step {target}")]
    UnknownTarget { step: String, target: String },

    #[error("Step {step} transitions backwards to {target}")]
    BackwardTransition { step: String, target: String },

    #[error("Only the last step may be terminal, and it must be (offending step: {0})")]
    TerminalPlacement(String),

    #[error("Step {step} references unknown placeholder {{{placeholder}}}")]
    UnknownPlaceholder { step: String, placeholder: String },

    #[error("Step {step} references {{{placeholder}}} before it is always collected")]
    UnresolvedPlaceholder { step: String, placeholder: String },
}

