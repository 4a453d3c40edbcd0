//! The onboarding state machine.

use std::sync::Arc;

use super::model::{FactValue, ProfileFacts};
use super::script::{InputMode, OnboardingScript, OnboardingStep, StepPrompt};
use super::state::OnboardingState;

/// Result of submitting input to the current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The engine moved to `next_index`. `prompt` is the rendered destination step.
    Advanced {
        next_index: usize,
        prompt: Option<StepPrompt>,
        completed: bool,
    },
    /// Nothing usable was submitted; the engine stays on `index`.
    NeedsInput { index: usize },
    /// Onboarding had already finished; nothing changed.
    AlreadyComplete,
}

/// Drives a user through an [`OnboardingScript`], collecting [`ProfileFacts`].
#[derive(Debug, Clone)]
pub struct OnboardingEngine {
    script: Arc<OnboardingScript>,
    state: OnboardingState,
    facts: ProfileFacts,
}

impl OnboardingEngine {
    pub fn new(script: Arc<OnboardingScript>) -> Self {
        Self {
            script,
            state: OnboardingState::default(),
            facts: ProfileFacts::default(),
        }
    }

    /// Rebuild an engine from persisted state. A completed flag wins over the
    /// stored index, and an out-of-range index is clamped to the terminal step.
    pub fn resume(script: Arc<OnboardingScript>, state: OnboardingState, facts: ProfileFacts) -> Self {
        let terminal = script.terminal_index();
        let state = if state.completed || state.step_index >= terminal {
            OnboardingState::completed_at(terminal)
        } else {
            state
        };
        Self {
            script,
            state,
            facts,
        }
    }

    pub fn script(&self) -> &OnboardingScript {
        &self.script
    }

    pub fn state(&self) -> OnboardingState {
        self.state
    }

    pub fn facts(&self) -> &ProfileFacts {
        &self.facts
    }

    pub fn is_complete(&self) -> bool {
        self.state.completed
    }

    pub fn current_index(&self) -> usize {
        self.state.step_index
    }

    /// Render the prompt text of step `index` against the collected facts.
    pub fn render(&self, index: usize) -> String {
        self.script.render(index, &self.facts)
    }

    pub fn prompt_at(&self, index: usize) -> Option<StepPrompt> {
        let step = self.script.step(index)?;
        Some(StepPrompt {
            step_id: step.id.clone(),
            text: self.render(index),
            input_mode: step.input_mode,
            choices: step.choices.clone(),
        })
    }

    /// The prompt awaiting an answer, or `None` once complete.
    pub fn current_prompt(&self) -> Option<StepPrompt> {
        if self.is_complete() {
            None
        } else {
            self.prompt_at(self.state.step_index)
        }
    }

    /// Submit the user's answer to the current step.
    pub fn submit(&mut self, raw_input: &str) -> StepOutcome {
        if self.is_complete() {
            return StepOutcome::AlreadyComplete;
        }
        let index = self.state.step_index;
        let Some(step) = self.script.step(index) else {
            return StepOutcome::AlreadyComplete;
        };

        let raw = raw_input.trim();
        let Some(value) = interpret(step, raw) else {
            return StepOutcome::NeedsInput { index };
        };

        let resolved = match &value {
            FactValue::Text(text) => text.clone(),
            FactValue::List(items) => items.join(", "),
        };

        if let Some(key) = step.saves_fact_as
            && !self.facts.record(key, value)
        {
            tracing::debug!(step = %step.id, key = %key, "Fact already set, keeping first value");
        }

        let target = step
            .transitions
            .iter()
            .find(|t| t.when.matches(raw) || t.when.matches(&resolved))
            .and_then(|t| self.script.index_of(&t.target))
            .unwrap_or(index + 1);

        let terminal = self.script.terminal_index();
        let next_index = match self.state.advance_to(target, terminal) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(step = %step.id, to = target, "Onboarding transition rejected: {e}");
                return StepOutcome::NeedsInput { index };
            }
        };

        tracing::info!(
            from = index,
            to = next_index,
            completed = self.state.completed,
            "Onboarding advanced"
        );

        StepOutcome::Advanced {
            next_index,
            prompt: self.prompt_at(next_index),
            completed: self.state.completed,
        }
    }

    /// Back to step 0 with no facts.
    pub fn reset(&mut self) {
        self.state.reset();
        self.facts.clear();
    }
}

/// Turn raw input into a fact value for the step. `None` means nothing was selected.
fn interpret(step: &OnboardingStep, raw: &str) -> Option<FactValue> {
    match step.input_mode {
        InputMode::MultiChoice => {
            let mut selected: Vec<String> = Vec::new();
            for item in raw.split([',', ';']).map(str::trim).filter(|s| !s.is_empty()) {
                let choice = resolve_choice(&step.choices, item);
                if !selected.iter().any(|s| s.eq_ignore_ascii_case(&choice)) {
                    selected.push(choice);
                }
            }
            if selected.is_empty() {
                None
            } else {
                Some(FactValue::List(selected))
            }
        }
        InputMode::SingleChoice if !raw.is_empty() => {
            Some(FactValue::Text(resolve_choice(&step.choices, raw)))
        }
        InputMode::FreeText | InputMode::SingleChoice if raw.is_empty() => None,
        _ => Some(FactValue::Text(raw.to_string())),
    }
}

/// Map a 1-based number or a case-insensitive label onto a listed choice.
/// Anything else is kept verbatim.
fn resolve_choice(choices: &[String], item: &str) -> String {
    if let Ok(n) = item.parse::<usize>()
        && let Some(choice) = n.checked_sub(1).and_then(|i| choices.get(i))
    {
        return choice.clone();
    }
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(item))
        .cloned()
        .unwrap_or_else(|| item.to_string())
}
