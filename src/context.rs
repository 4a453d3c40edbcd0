//! Prompt assembly for chat turns.

use std::fmt::Write;

use crate::conversation::message::{Message, MessageRole};
use crate::knowledge::Snippet;
use crate::onboarding::ProfileFacts;

/// Label used for the assistant's lines in the rendered history.
pub const ASSISTANT_LABEL: &str = "FELICIA";
pub const USER_LABEL: &str = "User";

/// Header introducing retrieved snippets; the persona prompt refers to it.
pub const KNOWLEDGE_HEADER: &str = "Relevant information from user's knowledge folder:";

/// Builds the completion payload from profile, snippets, and recent history.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    history_window: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { history_window: 10 }
    }
}

impl ContextAssembler {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Render the prompt. `history` should exclude `current`; only its last
    /// `history_window` messages are used.
    pub fn assemble(
        &self,
        facts: &ProfileFacts,
        snippets: &[Snippet],
        history: &[Message],
        current: &str,
    ) -> String {
        let mut prompt = String::new();

        if let Some(profile) = profile_block(facts) {
            prompt.push_str(&profile);
            prompt.push_str("\n\n");
        }

        if !snippets.is_empty() {
            prompt.push_str(KNOWLEDGE_HEADER);
            prompt.push('\n');
            for snippet in snippets {
                let _ = write!(prompt, "\n[From {}]\n{}\n", snippet.source, snippet.text);
            }
            prompt.push('\n');
        }

        let start = history.len().saturating_sub(self.history_window);
        for message in &history[start..] {
            let label = match message.role {
                MessageRole::User => USER_LABEL,
                MessageRole::Assistant => ASSISTANT_LABEL,
            };
            let _ = writeln!(prompt, "{label}: {}", message.content);
        }

        let _ = write!(prompt, "{USER_LABEL}: {current}\n{ASSISTANT_LABEL}:");
        prompt
    }
}

fn profile_block(facts: &ProfileFacts) -> Option<String> {
    if facts.name.is_none() && facts.focus_area.is_none() && facts.obstacles.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    if let Some(ref name) = facts.name {
        parts.push(format!("User's name is {name}."));
    }
    if let Some(ref focus) = facts.focus_area {
        parts.push(format!("They're focused on: {focus}."));
    }
    if !facts.obstacles.is_empty() {
        parts.push(format!("Their challenges: {}.", facts.obstacles.join(", ")));
    }
    Some(format!("[{}]", parts.join(" ")))
}
