//! The conversation controller: routes each submission to onboarding or chat.
//!
//! `Assistant` owns the transcript, the onboarding engine, and the current
//! corpus snapshot. Every mutating call takes `&mut self`, so one submission
//! runs to completion (network call included) before the next is accepted.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AssistantConfig, FALLBACK_REPLY};
use crate::context::ContextAssembler;
use crate::error::Error;
use crate::knowledge::{CorpusIndex, FolderPicker, LocalFolderPicker, Retriever, ingest};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::onboarding::{OnboardingEngine, OnboardingScript, ProfileFacts, StepOutcome};
use crate::store::{Session, SessionSnapshot, SessionStore};

use super::message::{Message, MessageRole, Transcript};

/// Which pipeline handles user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Onboarding,
    Chat,
}

/// What a submission produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub mode: Mode,
    /// Assistant text appended to the transcript, if any.
    pub response: Option<String>,
    /// Whether retrieved snippets were included in the prompt.
    pub used_knowledge: bool,
    /// The completion backend failed and the fallback message was used.
    pub completion_failed: bool,
    /// Result of connecting the knowledge folder named during onboarding.
    pub connected: Option<ConnectReport>,
}

impl TurnReply {
    fn ignored(mode: Mode) -> Self {
        Self {
            mode,
            response: None,
            used_knowledge: false,
            completion_failed: false,
            connected: None,
        }
    }
}

/// Outcome of a connect-folder action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectReport {
    /// The corpus was replaced.
    Connected { documents: usize, skipped: usize },
    /// The user backed out; the previous corpus is untouched.
    Cancelled,
    /// The folder could not be opened; the previous corpus is untouched.
    Failed { notice: String },
}

/// Snapshot for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub mode: Mode,
    pub step_index: usize,
    pub step_id: Option<String>,
    pub completed: bool,
    pub facts: ProfileFacts,
    pub documents: usize,
    pub messages: usize,
    pub model: String,
}

pub struct Assistant {
    config: AssistantConfig,
    llm: Arc<dyn LlmProvider>,
    session: Session,
    picker: Arc<dyn FolderPicker>,
    engine: OnboardingEngine,
    transcript: Transcript,
    corpus: Arc<CorpusIndex>,
    retriever: Retriever,
    assembler: ContextAssembler,
}

impl Assistant {
    /// Build an assistant with the built-in onboarding script and restore the saved session.
    pub async fn load(
        config: AssistantConfig,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, Error> {
        let script = Arc::new(OnboardingScript::standard()?);
        Ok(Self::with_script(config, llm, store, script).await)
    }

    /// Build an assistant for `script` and restore the saved session.
    /// An unreadable store starts a fresh session.
    pub async fn with_script(
        config: AssistantConfig,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn SessionStore>,
        script: Arc<OnboardingScript>,
    ) -> Self {
        let session = Session::new(store);
        let snapshot = match session.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to load session, starting fresh: {e}");
                SessionSnapshot::default()
            }
        };

        let engine = OnboardingEngine::resume(script, snapshot.onboarding, snapshot.facts);
        info!(
            completed = engine.is_complete(),
            step = engine.current_index(),
            messages = snapshot.transcript.len(),
            "Session loaded"
        );

        Self {
            retriever: Retriever::new(config.retrieval_limit, config.snippet_max_chars),
            assembler: ContextAssembler::new(config.history_window),
            config,
            llm,
            session,
            picker: Arc::new(LocalFolderPicker::new()),
            engine,
            transcript: snapshot.transcript,
            corpus: Arc::new(CorpusIndex::new()),
        }
    }

    /// Replace the folder picker used by [`Assistant::connect_folder`].
    pub fn with_picker(mut self, picker: Arc<dyn FolderPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn mode(&self) -> Mode {
        if self.engine.is_complete() {
            Mode::Chat
        } else {
            Mode::Onboarding
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn facts(&self) -> &ProfileFacts {
        self.engine.facts()
    }

    pub fn engine(&self) -> &OnboardingEngine {
        &self.engine
    }

    /// The current corpus snapshot.
    pub fn corpus(&self) -> Arc<CorpusIndex> {
        Arc::clone(&self.corpus)
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn status(&self) -> StatusReport {
        let state = self.engine.state();
        StatusReport {
            mode: self.mode(),
            step_index: state.step_index,
            step_id: self
                .engine
                .script()
                .step(state.step_index)
                .map(|s| s.id.clone()),
            completed: state.completed,
            facts: self.engine.facts().clone(),
            documents: self.corpus.len(),
            messages: self.transcript.len(),
            model: self.llm.model_name().to_string(),
        }
    }

    /// Open the conversation if the transcript is empty: the current onboarding
    /// prompt, or a welcome back once onboarding is done.
    pub async fn start(&mut self) -> Option<&Message> {
        if !self.transcript.is_empty() {
            return None;
        }
        let text = match self.engine.current_prompt() {
            Some(prompt) => prompt.display_text(),
            None => format!(
                "Welcome back, {}! How can I help you today?",
                self.engine.facts().name.as_deref().unwrap_or("friend")
            ),
        };
        self.transcript.push(Message::assistant(text));
        self.persist_transcript().await;
        self.transcript.last()
    }

    /// The most recent assistant message, used to re-show where a resumed
    /// conversation left off.
    pub fn last_reply(&self) -> Option<&Message> {
        self.transcript
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }

    /// Handle one line of user input. Blank input is ignored.
    pub async fn submit(&mut self, input: &str) -> TurnReply {
        let text = input.trim();
        if text.is_empty() {
            return TurnReply::ignored(self.mode());
        }
        match self.mode() {
            Mode::Onboarding => self.onboarding_turn(text).await,
            Mode::Chat => self.chat_turn(text).await,
        }
    }

    async fn onboarding_turn(&mut self, text: &str) -> TurnReply {
        let outcome = self.engine.submit(text);
        let (prompt, completed) = match outcome {
            StepOutcome::Advanced {
                prompt, completed, ..
            } => (prompt, completed),
            StepOutcome::NeedsInput { .. } => {
                // Nothing selected; show the current prompt again without recording the turn.
                let mut reply = TurnReply::ignored(Mode::Onboarding);
                reply.response = self.engine.current_prompt().map(|p| p.display_text());
                return reply;
            }
            StepOutcome::AlreadyComplete => return self.chat_turn(text).await,
        };

        self.transcript.push(Message::user(text));
        self.persist_transcript().await;

        if !self.config.turn_delay.is_zero() {
            tokio::time::sleep(self.config.turn_delay).await;
        }

        let response = prompt.map(|p| p.display_text());
        if let Some(ref text) = response {
            self.transcript.push(Message::assistant(text.clone()));
        }
        self.persist_onboarding().await;
        self.persist_transcript().await;

        let connected = match self.engine.facts().knowledge_path.clone() {
            Some(path) if completed => Some(self.connect_folder(Some(&path)).await),
            _ => None,
        };

        TurnReply {
            mode: self.mode(),
            response,
            used_knowledge: false,
            completion_failed: false,
            connected,
        }
    }

    async fn chat_turn(&mut self, text: &str) -> TurnReply {
        self.transcript.push(Message::user(text));
        self.persist_transcript().await;

        let corpus = self.corpus();
        let snippets = self.retriever.retrieve(text, &corpus);
        debug!(documents = corpus.len(), used = !snippets.is_empty(), "Knowledge lookup");

        let recent = self.transcript.tail(self.assembler.history_window().saturating_add(1));
        let history = &recent[..recent.len().saturating_sub(1)];
        let prompt = self
            .assembler
            .assemble(self.engine.facts(), &snippets, history, text);

        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.config.system_prompt.clone()),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.config.temperature)
        .with_top_p(self.config.top_p);

        let (reply, failed) = match self.llm.complete(request).await {
            Ok(response) => (response.content.trim().to_string(), false),
            Err(e) => {
                warn!(error = %e, "Completion failed, using fallback reply");
                (FALLBACK_REPLY.to_string(), true)
            }
        };

        self.transcript.push(Message::assistant(reply.clone()));
        self.persist_transcript().await;

        TurnReply {
            mode: Mode::Chat,
            response: Some(reply),
            used_knowledge: !snippets.is_empty(),
            completion_failed: failed,
            connected: None,
        }
    }

    /// Pick and ingest a knowledge folder. The corpus is replaced only when
    /// ingestion finishes; cancel and failure keep the previous one.
    pub async fn connect_folder(&mut self, hint: Option<&str>) -> ConnectReport {
        let entries = match self.picker.pick(hint).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                info!("Folder selection cancelled");
                return ConnectReport::Cancelled;
            }
            Err(e) => {
                warn!("Knowledge folder unavailable: {e}");
                return ConnectReport::Failed {
                    notice: e.to_string(),
                };
            }
        };

        let report = ingest(&entries, self.config.doc_max_chars).await;
        let documents = report.index.len();
        self.corpus = Arc::new(report.index);
        ConnectReport::Connected {
            documents,
            skipped: report.skipped.len(),
        }
    }

    /// Forget everything: profile, onboarding progress, transcript, corpus,
    /// and all persisted keys. Leaves the transcript empty; call
    /// [`Assistant::start`] to greet again.
    pub async fn reset(&mut self) {
        if let Err(e) = self.session.clear().await {
            warn!("Failed to clear persisted session: {e}");
        }
        self.engine.reset();
        self.transcript.clear();
        self.corpus = Arc::new(CorpusIndex::new());
        info!("Session reset");
    }

    async fn persist_transcript(&self) {
        if let Err(e) = self.session.save_transcript(&self.transcript).await {
            warn!("Failed to persist transcript: {e}");
        }
    }

    async fn persist_onboarding(&self) {
        if let Err(e) = self.session.save_facts(self.engine.facts()).await {
            warn!("Failed to persist profile: {e}");
        }
        if let Err(e) = self.session.save_onboarding(&self.engine.state()).await {
            warn!("Failed to persist onboarding state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{IngestError, LlmError};
    use crate::knowledge::{FileHandle, FolderEntry};
    use crate::llm::{CompletionResponse, FinishReason};
    use crate::store::InMemoryStore;

    /// Replies with fixed text and records each request.
    struct StubLlm {
        reply: Option<String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StubLlm {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            let requests = self.requests.lock().unwrap();
            requests.last().unwrap().prompt_text()
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            match self.reply {
                Some(ref text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    struct TextFile(&'static str, &'static str);

    #[async_trait]
    impl FileHandle for TextFile {
        fn name(&self) -> &str {
            self.0
        }
        fn path(&self) -> &str {
            self.0
        }
        async fn read(&self) -> Result<String, IngestError> {
            Ok(self.1.to_string())
        }
    }

    /// Returns scripted pick results in order, then cancels.
    struct ScriptedPicker {
        results: Mutex<Vec<Result<Option<Vec<FolderEntry>>, IngestError>>>,
    }

    impl ScriptedPicker {
        fn new(results: Vec<Result<Option<Vec<FolderEntry>>, IngestError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into_iter().rev().collect()),
            })
        }
    }

    #[async_trait]
    impl FolderPicker for ScriptedPicker {
        async fn pick(&self, _hint: Option<&str>) -> Result<Option<Vec<FolderEntry>>, IngestError> {
            self.results.lock().unwrap().pop().unwrap_or(Ok(None))
        }
    }

    fn notes() -> Vec<FolderEntry> {
        vec![FolderEntry::File(Arc::new(TextFile(
            "notes.txt",
            "Project Alpha deadline is Friday.\n\nBudget concerns remain open.",
        )))]
    }

    fn config() -> AssistantConfig {
        AssistantConfig {
            turn_delay: std::time::Duration::ZERO,
            ..Default::default()
        }
    }

    async fn assistant(llm: Arc<StubLlm>, store: Arc<InMemoryStore>) -> Assistant {
        Assistant::load(config(), llm, store).await.unwrap()
    }

    async fn finish_onboarding(assistant: &mut Assistant) {
        for input in ["ok", "Sam", "career", "Overwhelm", "skip"] {
            assistant.submit(input).await;
        }
        assert_eq!(assistant.mode(), Mode::Chat);
    }

    #[tokio::test]
    async fn fresh_session_greets_with_first_step() {
        let mut assistant = assistant(StubLlm::replying("hi"), Arc::new(InMemoryStore::new())).await;
        assert_eq!(assistant.mode(), Mode::Onboarding);
        let greeting = assistant.start().await.unwrap();
        assert!(greeting.content.contains("Shall we begin?"));
        assert!(assistant.start().await.is_none());
    }

    #[tokio::test]
    async fn onboarding_turn_appends_user_and_prompt() {
        let mut assistant = assistant(StubLlm::replying("hi"), Arc::new(InMemoryStore::new())).await;
        assistant.start().await;
        assistant.submit("yes").await;
        let reply = assistant.submit("Sam").await;

        assert_eq!(reply.mode, Mode::Onboarding);
        assert!(reply.response.unwrap().contains("Sam"));
        assert_eq!(assistant.facts().name.as_deref(), Some("Sam"));
        assert_eq!(assistant.transcript().len(), 5);
    }

    #[tokio::test]
    async fn empty_multi_choice_does_not_advance_or_record() {
        let mut assistant = assistant(StubLlm::replying("hi"), Arc::new(InMemoryStore::new())).await;
        for input in ["ok", "Sam", "career"] {
            assistant.submit(input).await;
        }
        let before = assistant.transcript().len();
        let step = assistant.engine().current_index();

        let reply = assistant.submit(",").await;
        assert!(reply.response.unwrap().contains("1. Procrastination"));
        assert_eq!(assistant.transcript().len(), before);
        assert_eq!(assistant.engine().current_index(), step);
    }

    #[tokio::test]
    async fn chat_uses_profile_history_and_knowledge() {
        let llm = StubLlm::replying("  It is due Friday.  ");
        let mut assistant = assistant(llm.clone(), Arc::new(InMemoryStore::new()))
            .await
            .with_picker(ScriptedPicker::new(vec![Ok(Some(notes()))]));
        finish_onboarding(&mut assistant).await;

        let report = assistant.connect_folder(Some("/notes")).await;
        assert_eq!(
            report,
            ConnectReport::Connected {
                documents: 1,
                skipped: 0
            }
        );

        let reply = assistant.submit("what is the deadline for Alpha").await;
        assert_eq!(reply.response.as_deref(), Some("It is due Friday."));
        assert!(reply.used_knowledge);
        assert!(!reply.completion_failed);

        let prompt = llm.last_prompt();
        assert!(prompt.contains("User's name is Sam."));
        assert!(prompt.contains("[From notes.txt]\nProject Alpha deadline is Friday."));
        assert!(prompt.ends_with("User: what is the deadline for Alpha\nFELICIA:"));
        // The current message appears once, as the completion line.
        assert_eq!(prompt.matches("what is the deadline for Alpha").count(), 1);

        let requests = llm.requests.lock().unwrap();
        let request = requests.last().unwrap();
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.top_p, Some(0.9));
        assert!(request.system_text().unwrap().contains("FELICIA"));
    }

    #[tokio::test]
    async fn completion_failure_appends_fallback() {
        let mut assistant = assistant(StubLlm::failing(), Arc::new(InMemoryStore::new())).await;
        finish_onboarding(&mut assistant).await;

        let reply = assistant.submit("hello?").await;
        assert!(reply.completion_failed);
        let messages = assistant.transcript().messages();
        assert_eq!(messages[messages.len() - 2].content, "hello?");
        assert_eq!(messages[messages.len() - 1].content, FALLBACK_REPLY);

        // Still accepting input afterwards.
        let again = assistant.submit("still there?").await;
        assert_eq!(again.response.as_deref(), Some(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn cancel_and_failure_keep_previous_corpus() {
        let mut assistant = assistant(StubLlm::replying("ok"), Arc::new(InMemoryStore::new()))
            .await
            .with_picker(ScriptedPicker::new(vec![
                Ok(Some(notes())),
                Ok(None),
                Err(IngestError::Access {
                    path: "/gone".into(),
                    reason: "permission denied".into(),
                }),
            ]));

        assistant.connect_folder(None).await;
        let before = assistant.corpus();

        assert_eq!(assistant.connect_folder(None).await, ConnectReport::Cancelled);
        assert!(matches!(
            assistant.connect_folder(None).await,
            ConnectReport::Failed { .. }
        ));
        assert_eq!(*assistant.corpus(), *before);
        assert_eq!(assistant.corpus().len(), 1);
    }

    #[tokio::test]
    async fn prompt_history_is_windowed() {
        let llm = StubLlm::replying("noted");
        let config = AssistantConfig {
            history_window: 2,
            ..config()
        };
        let mut assistant = Assistant::load(config, llm.clone(), Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        finish_onboarding(&mut assistant).await;

        assistant.submit("first question").await;
        assistant.submit("second question").await;
        assistant.submit("third question").await;

        let prompt = llm.last_prompt();
        assert!(!prompt.contains("first question"));
        assert!(prompt.contains("User: second question\nFELICIA: noted"));
        assert!(prompt.ends_with("User: third question\nFELICIA:"));
    }

    #[tokio::test]
    async fn reconnect_replaces_corpus() {
        let mut assistant = assistant(StubLlm::replying("ok"), Arc::new(InMemoryStore::new()))
            .await
            .with_picker(ScriptedPicker::new(vec![
                Ok(Some(vec![FolderEntry::File(Arc::new(TextFile(
                    "a.txt",
                    "Quarterly budget review on Monday.",
                )))])),
                Ok(Some(vec![FolderEntry::File(Arc::new(TextFile(
                    "b.txt",
                    "Garden planting schedule.",
                )))])),
            ]));
        finish_onboarding(&mut assistant).await;

        assistant.connect_folder(None).await;
        assert!(assistant.submit("budget review").await.used_knowledge);

        let report = assistant.connect_folder(None).await;
        assert_eq!(
            report,
            ConnectReport::Connected {
                documents: 1,
                skipped: 0
            }
        );
        let corpus = assistant.corpus();
        assert_eq!(corpus.len(), 1);
        assert!(corpus.get("a.txt").is_none());
        assert!(corpus.get("b.txt").is_some());
        assert!(!assistant.submit("budget review").await.used_knowledge);
    }

    #[tokio::test]
    async fn folder_named_in_onboarding_is_connected() {
        let mut assistant = assistant(StubLlm::replying("ok"), Arc::new(InMemoryStore::new()))
            .await
            .with_picker(ScriptedPicker::new(vec![Ok(Some(notes()))]));
        for input in ["ok", "Sam", "career", "Overwhelm", "yes"] {
            assistant.submit(input).await;
        }
        let reply = assistant.submit("~/notes").await;
        assert_eq!(reply.mode, Mode::Chat);
        assert!(matches!(
            reply.connected,
            Some(ConnectReport::Connected { documents: 1, .. })
        ));
        assert!(reply.response.unwrap().contains("~/notes"));
    }

    #[tokio::test]
    async fn session_resumes_in_chat_mode() {
        let store = Arc::new(InMemoryStore::new());
        {
            let mut first = assistant(StubLlm::replying("ok"), store.clone()).await;
            finish_onboarding(&mut first).await;
        }

        let mut resumed = assistant(StubLlm::replying("ok"), store).await;
        assert_eq!(resumed.mode(), Mode::Chat);
        assert_eq!(resumed.facts().name.as_deref(), Some("Sam"));
        assert!(!resumed.transcript().is_empty());
        assert!(resumed.start().await.is_none());
    }

    #[tokio::test]
    async fn welcome_back_when_transcript_empty() {
        let store = Arc::new(InMemoryStore::new());
        let session = Session::new(store.clone());
        session
            .save_onboarding(&crate::onboarding::OnboardingState::completed_at(6))
            .await
            .unwrap();

        let mut assistant = assistant(StubLlm::replying("ok"), store).await;
        let greeting = assistant.start().await.unwrap();
        assert_eq!(
            greeting.content,
            "Welcome back, friend! How can I help you today?"
        );
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let store = Arc::new(InMemoryStore::new());
        let mut assistant = assistant(StubLlm::replying("ok"), store.clone())
            .await
            .with_picker(ScriptedPicker::new(vec![Ok(Some(notes()))]));
        finish_onboarding(&mut assistant).await;
        assistant.connect_folder(None).await;
        assistant.submit("hello").await;

        assistant.reset().await;

        assert_eq!(assistant.mode(), Mode::Onboarding);
        assert_eq!(assistant.engine().current_index(), 0);
        assert!(assistant.facts().is_empty());
        assert!(assistant.transcript().is_empty());
        assert!(assistant.corpus().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut assistant = assistant(StubLlm::replying("ok"), Arc::new(InMemoryStore::new())).await;
        let reply = assistant.submit("   ").await;
        assert!(reply.response.is_none());
        assert!(assistant.transcript().is_empty());
    }
}
