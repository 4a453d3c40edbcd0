//! The onboarding script: an ordered, immutable list of prompt steps.
//!
//! Each step pairs a prompt (static template or a function of the profile)
//! with an input mode, an optional fact key to save the answer under, and an
//! explicit transition table. Steps fall through to the next index when no
//! transition condition matches.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::ScriptError;

use super::model::{FactKey, ProfileFacts};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z][A-Za-z0-9_]*)\}").unwrap());

/// How the user is expected to answer a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    FreeText,
    SingleChoice,
    MultiChoice,
    None,
}

/// A step's prompt text.
#[derive(Clone)]
pub enum PromptTemplate {
    /// Text with `{key}` placeholders resolved against the profile.
    Static(String),
    /// Text computed from the profile; must tolerate unset facts.
    Dynamic(fn(&ProfileFacts) -> String),
}

impl PromptTemplate {
    pub fn text(template: impl Into<String>) -> Self {
        Self::Static(template.into())
    }

    /// Placeholder names referenced by a static template.
    pub fn placeholders(&self) -> Vec<String> {
        match self {
            Self::Static(template) => PLACEHOLDER
                .captures_iter(template)
                .map(|c| c[1].to_string())
                .collect(),
            Self::Dynamic(_) => Vec::new(),
        }
    }

    pub fn render(&self, facts: &ProfileFacts) -> String {
        match self {
            Self::Static(template) => PLACEHOLDER
                .replace_all(template, |caps: &Captures| {
                    let name = &caps[1];
                    match FactKey::from_placeholder(name).and_then(|k| facts.value(k)) {
                        Some(value) => value,
                        None => {
                            tracing::error!(placeholder = name, "Unresolved onboarding placeholder");
                            caps[0].to_string()
                        }
                    }
                })
                .into_owned(),
            Self::Dynamic(render) => render(facts),
        }
    }
}

impl std::fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(template) => f.debug_tuple("Static").field(template).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// When a transition fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The input contains this word, case-insensitively.
    ContainsToken(String),
}

impl Condition {
    pub fn matches(&self, input: &str) -> bool {
        match self {
            Self::ContainsToken(token) => input
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word.eq_ignore_ascii_case(token)),
        }
    }
}

/// `when` → jump to the step with id `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub when: Condition,
    pub target: String,
}

/// One step of the onboarding script.
#[derive(Debug, Clone)]
pub struct OnboardingStep {
    pub id: String,
    pub prompt: PromptTemplate,
    pub input_mode: InputMode,
    pub choices: Vec<String>,
    pub saves_fact_as: Option<FactKey>,
    pub is_terminal: bool,
    pub transitions: Vec<Transition>,
}

impl OnboardingStep {
    pub fn new(id: impl Into<String>, prompt: PromptTemplate, input_mode: InputMode) -> Self {
        Self {
            id: id.into(),
            prompt,
            input_mode,
            choices: Vec::new(),
            saves_fact_as: None,
            is_terminal: false,
            transitions: Vec::new(),
        }
    }

    pub fn free_text(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(id, PromptTemplate::text(template), InputMode::FreeText)
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn saves(mut self, key: FactKey) -> Self {
        self.saves_fact_as = Some(key);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    pub fn on(mut self, when: Condition, target: impl Into<String>) -> Self {
        self.transitions.push(Transition {
            when,
            target: target.into(),
        });
        self
    }
}

/// A rendered step, ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StepPrompt {
    pub step_id: String,
    pub text: String,
    pub input_mode: InputMode,
    pub choices: Vec<String>,
}

impl StepPrompt {
    /// Prompt text with numbered choices appended for choice steps.
    pub fn display_text(&self) -> String {
        match self.input_mode {
            InputMode::SingleChoice | InputMode::MultiChoice if !self.choices.is_empty() => {
                let options: Vec<String> = self
                    .choices
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{}. {}", i + 1, c))
                    .collect();
                let hint = if self.input_mode == InputMode::MultiChoice {
                    "(Pick one or more, separated by commas, or type your own)"
                } else {
                    "(Pick one)"
                };
                format!("{}\n\n{}\n{}", self.text, options.join("\n"), hint)
            }
            _ => self.text.clone(),
        }
    }
}

/// A validated onboarding script.
#[derive(Debug, Clone)]
pub struct OnboardingScript {
    steps: Vec<OnboardingStep>,
    index_by_id: HashMap<String, usize>,
}

impl OnboardingScript {
    /// Validate and build a script.
    ///
    /// Rejects duplicate ids, unknown or backward transition targets, a
    /// terminal step anywhere but last, and any placeholder whose fact is not
    /// saved on every path leading to the step that uses it.
    pub fn new(steps: Vec<OnboardingStep>) -> Result<Self, ScriptError> {
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }

        let mut index_by_id = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index_by_id.insert(step.id.clone(), i).is_some() {
                return Err(ScriptError::DuplicateStep(step.id.clone()));
            }
        }

        let last = steps.len() - 1;
        for (i, step) in steps.iter().enumerate() {
            if step.is_terminal != (i == last) {
                return Err(ScriptError::TerminalPlacement(step.id.clone()));
            }
            for transition in &step.transitions {
                let target = *index_by_id.get(&transition.target).ok_or_else(|| {
                    ScriptError::UnknownTarget {
                        step: step.id.clone(),
                        target: transition.target.clone(),
                    }
                })?;
                if target <= i {
                    return Err(ScriptError::BackwardTransition {
                        step: step.id.clone(),
                        target: transition.target.clone(),
                    });
                }
            }
        }

        let script = Self { steps, index_by_id };
        script.check_placeholders()?;
        Ok(script)
    }

    /// Every placeholder must name a fact that is saved on all paths to its step.
    fn check_placeholders(&self) -> Result<(), ScriptError> {
        let mut guaranteed: Vec<Option<BTreeSet<FactKey>>> = vec![None; self.steps.len()];
        guaranteed[0] = Some(BTreeSet::new());

        for (i, step) in self.steps.iter().enumerate() {
            let known = guaranteed[i].clone().unwrap_or_default();

            for name in step.prompt.placeholders() {
                let key = FactKey::from_placeholder(&name).ok_or_else(|| {
                    ScriptError::UnknownPlaceholder {
                        step: step.id.clone(),
                        placeholder: name.clone(),
                    }
                })?;
                if !known.contains(&key) {
                    return Err(ScriptError::UnresolvedPlaceholder {
                        step: step.id.clone(),
                        placeholder: name,
                    });
                }
            }

            let mut out = known;
            if let Some(key) = step.saves_fact_as {
                out.insert(key);
            }
            for succ in self.successors(i) {
                guaranteed[succ] = Some(match guaranteed[succ].take() {
                    Some(existing) => existing.intersection(&out).copied().collect(),
                    None => out.clone(),
                });
            }
        }
        Ok(())
    }

    fn successors(&self, index: usize) -> Vec<usize> {
        if self.steps[index].is_terminal {
            return Vec::new();
        }
        let mut succ = vec![index + 1];
        succ.extend(
            self.steps[index]
                .transitions
                .iter()
                .filter_map(|t| self.index_of(&t.target)),
        );
        succ
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&OnboardingStep> {
        self.steps.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn terminal_index(&self) -> usize {
        self.steps.len() - 1
    }

    /// Render a step's prompt against the profile. Out-of-range indices render empty.
    pub fn render(&self, index: usize, facts: &ProfileFacts) -> String {
        self.steps
            .get(index)
            .map(|s| s.prompt.render(facts))
            .unwrap_or_default()
    }

    /// The built-in FELICIA onboarding conversation.
    pub fn standard() -> Result<Self, ScriptError> {
        Self::new(vec![
            OnboardingStep::free_text(
                "start",
                "Welcome! I am FELICIA, your Personal AI Assistant.\n\n\
                 Before we begin, I would like to get to know you a little. This helps me \
                 become truly YOUR assistant, not just a generic chatbot.\n\n\
                 Shall we begin?",
            ),
            OnboardingStep::free_text(
                "name",
                "Wonderful! Let us start simple.\n\nWhat should I call you?",
            )
            .saves(FactKey::Name),
            OnboardingStep::free_text(
                "focus",
                "Nice to meet you, {name}!\n\n\
                 If I could genuinely help you with ONE area of your life over the next year, \
                 what would that area be?\n\n\
                 Do not overthink it. Just whatever comes to mind first.",
            )
            .saves(FactKey::FocusArea),
            OnboardingStep::new(
                "obstacles",
                PromptTemplate::text(
                    "That makes a lot of sense.\n\n\
                     When it comes to {focusArea}, what usually gets in your way? \
                     Not time or money, but the inner pattern that trips you up.",
                ),
                InputMode::MultiChoice,
            )
            .with_choices([
                "Procrastination",
                "Perfectionism",
                "Overwhelm",
                "Self-doubt",
                "Distraction",
            ])
            .saves(FactKey::Obstacles),
            OnboardingStep::new(
                "knowledge",
                PromptTemplate::text(
                    "I hear you, {name}. That is real, and I appreciate you sharing it.\n\n\
                     I can learn from YOUR documents: your notes, files, anything you want me \
                     to know about. This stays 100% private on YOUR computer.\n\n\
                     Would you like to connect a knowledge folder? (Or SKIP to do it later)",
                ),
                InputMode::SingleChoice,
            )
            .with_choices(["Yes", "Skip"])
            .on(Condition::ContainsToken("skip".to_string()), "complete"),
            OnboardingStep::free_text(
                "folder",
                "Great choice!\n\n\
                 Create a folder anywhere on your computer and tell me its path \
                 (e.g. ~/Documents/Felicia-Knowledge).\n\n\
                 What folder path would you like to use?",
            )
            .saves(FactKey::KnowledgePath),
            OnboardingStep::new(
                "complete",
                PromptTemplate::Dynamic(completion_message),
                InputMode::None,
            )
            .terminal(),
        ])
    }
}

fn completion_message(facts: &ProfileFacts) -> String {
    let mut text = String::new();
    if let Some(ref path) = facts.knowledge_path {
        text.push_str(&format!(
            "Perfect! I have saved your knowledge folder as:\n{path}\n\n\
             I will read any documents you put there.\n\n---\n\n"
        ));
    }
    text.push_str(&format!(
        "Setup complete, {}!\n\nI am now YOUR personal AI.",
        facts.name.as_deref().unwrap_or("friend")
    ));
    if let Some(ref focus) = facts.focus_area {
        text.push_str(&format!(" I know your focus is {focus}"));
        if facts.obstacles.is_empty() {
            text.push('.');
        } else {
            text.push_str(", and I understand the challenges you face.");
        }
    }
    text.push_str("\n\nHow can I help you today?");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::FactValue;

    fn two_step(first: OnboardingStep) -> Vec<OnboardingStep> {
        vec![
            first,
            OnboardingStep::new("end", PromptTemplate::text("bye"), InputMode::None).terminal(),
        ]
    }

    #[test]
    fn standard_script_is_valid() {
        let script = OnboardingScript::standard().unwrap();
        assert_eq!(script.len(), 7);
        assert_eq!(script.index_of("complete"), Some(script.terminal_index()));
        assert!(script.step(script.terminal_index()).unwrap().is_terminal);
    }

    #[test]
    fn empty_script_rejected() {
        assert_eq!(OnboardingScript::new(vec![]).unwrap_err(), ScriptError::Empty);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let steps = vec![
            OnboardingStep::free_text("a", "one"),
            OnboardingStep::free_text("a", "two"),
            OnboardingStep::new("end", PromptTemplate::text("bye"), InputMode::None).terminal(),
        ];
        assert_eq!(
            OnboardingScript::new(steps).unwrap_err(),
            ScriptError::DuplicateStep("a".into())
        );
    }

    #[test]
    fn terminal_must_be_last() {
        let steps = vec![
            OnboardingStep::free_text("a", "one").terminal(),
            OnboardingStep::free_text("b", "two"),
        ];
        assert!(matches!(
            OnboardingScript::new(steps),
            Err(ScriptError::TerminalPlacement(_))
        ));
    }

    #[test]
    fn unknown_and_backward_targets_rejected() {
        let unknown = two_step(
            OnboardingStep::free_text("a", "one").on(Condition::ContainsToken("x".into()), "nope"),
        );
        assert!(matches!(
            OnboardingScript::new(unknown),
            Err(ScriptError::UnknownTarget { .. })
        ));

        let backward = two_step(
            OnboardingStep::free_text("a", "one").on(Condition::ContainsToken("x".into()), "a"),
        );
        assert!(matches!(
            OnboardingScript::new(backward),
            Err(ScriptError::BackwardTransition { .. })
        ));
    }

    #[test]
    fn placeholder_before_its_fact_is_rejected() {
        let steps = vec![
            OnboardingStep::free_text("greet", "Hello {name}"),
            OnboardingStep::free_text("name", "Name?").saves(FactKey::Name),
            OnboardingStep::new("end", PromptTemplate::text("bye"), InputMode::None).terminal(),
        ];
        assert_eq!(
            OnboardingScript::new(steps).unwrap_err(),
            ScriptError::UnresolvedPlaceholder {
                step: "greet".into(),
                placeholder: "name".into()
            }
        );
    }

    #[test]
    fn placeholder_skipped_on_some_path_is_rejected() {
        // The skip branch bypasses the step that saves knowledgePath.
        let steps = vec![
            OnboardingStep::free_text("ask", "Folder?").on(Condition::ContainsToken("skip".into()), "end"),
            OnboardingStep::free_text("path", "Path?").saves(FactKey::KnowledgePath),
            OnboardingStep::new(
                "end",
                PromptTemplate::text("Saved {knowledgePath}"),
                InputMode::None,
            )
            .terminal(),
        ];
        assert!(matches!(
            OnboardingScript::new(steps),
            Err(ScriptError::UnresolvedPlaceholder { .. })
        ));
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let steps = two_step(OnboardingStep::free_text("a", "Hi {nickname}"));
        assert!(matches!(
            OnboardingScript::new(steps),
            Err(ScriptError::UnknownPlaceholder { .. })
        ));
    }

    #[test]
    fn static_render_substitutes_all_placeholders() {
        let mut facts = ProfileFacts::default();
        facts.record(FactKey::Name, FactValue::Text("Sam".into()));
        facts.record(FactKey::FocusArea, FactValue::Text("fitness".into()));
        let template = PromptTemplate::text("{name}, about {focusArea}... {name}?");
        assert_eq!(template.render(&facts), "Sam, about fitness... Sam?");
    }

    #[test]
    fn completion_message_adapts_to_facts() {
        let bare = completion_message(&ProfileFacts::default());
        assert!(bare.contains("Setup complete, friend!"));
        assert!(!bare.contains("knowledge folder"));

        let facts = ProfileFacts {
            name: Some("Sam".into()),
            focus_area: Some("career".into()),
            obstacles: vec!["Overwhelm".into()],
            knowledge_path: Some("~/notes".into()),
        };
        let full = completion_message(&facts);
        assert!(full.contains("~/notes"));
        assert!(full.contains("Setup complete, Sam!"));
        assert!(full.contains("your focus is career, and I understand"));
    }

    #[test]
    fn condition_matches_whole_words_case_insensitively() {
        let skip = Condition::ContainsToken("skip".into());
        assert!(skip.matches("SKIP"));
        assert!(skip.matches("let's skip it for now"));
        assert!(skip.matches("Skip!"));
        assert!(!skip.matches("skipping"));
        assert!(!skip.matches("yes"));
    }

    #[test]
    fn display_text_numbers_choices() {
        let prompt = StepPrompt {
            step_id: "k".into(),
            text: "Connect?".into(),
            input_mode: InputMode::SingleChoice,
            choices: vec!["Yes".into(), "Skip".into()],
        };
        assert_eq!(prompt.display_text(), "Connect?\n\n1. Yes\n2. Skip\n(Pick one)");

        let free = StepPrompt {
            input_mode: InputMode::FreeText,
            ..prompt
        };
        assert_eq!(free.display_text(), "Connect?");
    }
}
