//! Parsing raw input lines into submissions.

use serde::{Deserialize, Serialize};

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submission {
    /// Text for the onboarding engine or the chat pipeline.
    UserInput { content: String },
    /// Wipe profile, transcript, and onboarding progress.
    Reset,
    /// Ingest a knowledge folder. `None` path means no folder was chosen.
    ConnectFolder { path: Option<String> },
    Status,
    Help,
    Quit,
    /// Blank input; dropped before it reaches the core.
    Empty,
}

/// Parses user input into Submission types.
pub struct SubmissionParser;

impl SubmissionParser {
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Submission::Empty;
        }
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/reset" | "/restart" => Submission::Reset,
            "/status" => Submission::Status,
            "/help" | "/?" => Submission::Help,
            "/quit" | "/exit" => Submission::Quit,
            _ => parse_connect(trimmed, &lower).unwrap_or_else(|| Submission::UserInput {
                content: trimmed.to_string(),
            }),
        }
    }
}

/// `/connect [path]`: the path keeps its original case.
fn parse_connect(trimmed: &str, lower: &str) -> Option<Submission> {
    let rest = lower.strip_prefix("/connect")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let path = trimmed.get("/connect".len()..).unwrap_or_default().trim();
    Some(Submission::ConnectFolder {
        path: (!path.is_empty()).then(|| path.to_string()),
    })
}
