//! The chat service: one active conversation and everything around it.
//!
//! [`ChatService`] owns the history store, the session store, the
//! entitlement gate, the thinking-mode flag and the side-effect coordinator.
//! Renderers observe it through [`ChatService::subscribe`].
//!
//! ## Turns
//!
//! `send_message`, `send_reply`, `generate_images`, `analyze_image` and
//! `submit_transcript` each run one turn. Only one turn may be in flight;
//! a second call fails with [`Error::TurnInFlight`] and changes nothing.
//! Every turn that starts ends with exactly one assistant message appended
//! and persisted, error text included.
//!
//! State is behind a mutex that is never held across an await.

use crate::config::ChatConfig;
use crate::effects::{is_speakable, SideEffectCoordinator};
use crate::entitlement::{Decision, DenialReason, EntitlementGate, PlanStatus, Tier};
use crate::error::{Error, Result};
use crate::events::{ChatEvent, EventBus};
use crate::history::ConversationHistory;
use crate::imagegen::{run_batch, BatchOutcome, ImageJob};
use crate::persistence::{MeaningfulFilter, SessionStore};
use crate::prompts;
use crate::reply::{self, ReplyQuote};
use crate::router::{outbound_window, realtime_request, select_strategy, with_system, Strategy};
use crate::services::Services;
use crate::store::KeyValueStore;
use crate::thinking::{FailedPhase, ThinkingTurn};
use crate::types::{ChatMessage, Message, MessageKind, SessionSummary, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

const UNEXPECTED_ERROR_NOTICE: &str = "An unexpected error occurred. Please try again.";
const REPLY_TARGET_MISSING: &str = "Error: Could not find the AI message being replied to.";
const ALL_IMAGES_FAILED: &str = "All image generation attempts failed.";
const EMPTY_REALTIME_RESPONSE: &str =
    "Received an empty or invalid response from the real-time search API.";

/// Conversation settings taken from `[chat]`.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub assistant_name: String,
    pub history_window: usize,
    pub thinking_mode: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            assistant_name: config.assistant_name.clone(),
            history_window: config.history_window.max(1),
            thinking_mode: config.thinking_mode,
        }
    }
}

/// How an image request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The entitlement gate refused; nothing was generated
    Denied(DenialReason),
    /// No image capability is configured
    Unavailable,
    Generated(BatchOutcome),
}

struct ChatState {
    history: ConversationHistory,
    sessions: SessionStore,
    gate: EntitlementGate,
    thinking_mode: bool,
    effects: SideEffectCoordinator,
}

pub struct ChatService {
    services: Services,
    settings: ChatSettings,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<ChatState>,
    turn_active: AtomicBool,
    events: EventBus,
}

/// Marks a turn in flight. Dropping it releases the turn and restores input;
/// a turn dropped before its terminal message gets the last-resort cleanup.
struct TurnGuard<'a> {
    service: &'a ChatService,
    finished: bool,
}

impl TurnGuard<'_> {
    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let service = self.service;
        if !self.finished {
            tracing::error!("Turn ended without a terminal message");
            service.emit(ChatEvent::NoticesCleared);
            service.emit(ChatEvent::TypingIndicator(false));
            service.emit(ChatEvent::NotificationShown(
                UNEXPECTED_ERROR_NOTICE.to_string(),
            ));
        }
        service.turn_active.store(false, Ordering::SeqCst);
        let enabled = service.lock().effects.input_free();
        service.emit(ChatEvent::InputAvailability(enabled));
    }
}

impl ChatService {
    /// Build a service. Nothing is read from `store` until [`start`](Self::start).
    pub fn new(services: Services, settings: ChatSettings, store: Arc<dyn KeyValueStore>) -> Self {
        let filter = MeaningfulFilter::new(&settings.assistant_name);
        let state = ChatState {
            history: ConversationHistory::new(),
            sessions: SessionStore::new(store.clone(), filter),
            gate: EntitlementGate::new(store.clone()),
            thinking_mode: settings.thinking_mode,
            effects: SideEffectCoordinator::new(),
        };
        Self {
            services,
            settings,
            store,
            state: Mutex::new(state),
            turn_active: AtomicBool::new(false),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChatEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChatEvent) {
        self.events.emit(event);
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn greeting(&self) -> Message {
        Message::assistant(prompts::greeting(&self.settings.assistant_name), None)
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Load sessions and entitlement state, then open the active session or
    /// a fresh chat.
    pub fn start(&self) {
        let mut guard = self.lock();
        let st = &mut *guard;

        let report = st.sessions.load();
        if let Some(warning) = report.warning {
            self.emit(ChatEvent::Warning(warning));
        }
        if !report.migration.is_clean() {
            tracing::info!(migration = ?report.migration, "Repaired stored sessions on load");
        }
        st.gate = EntitlementGate::load(self.store.clone());

        let history = match st.sessions.active_session() {
            Some(session) => session.history.clone(),
            None => vec![self.greeting()],
        };
        st.history = ConversationHistory::from_messages(history);

        self.emit(ChatEvent::HistoryReplaced(st.history.messages().to_vec()));
        self.emit(ChatEvent::SessionsChanged(st.sessions.list()));
        self.emit(ChatEvent::PlanChanged(st.gate.status()));
        self.emit(ChatEvent::InputAvailability(true));
    }

    /// Write the active conversation and entitlement state back to storage.
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.lock();
        let st = &mut *guard;
        self.save(st);
        st.gate.persist()
    }

    fn save(&self, st: &mut ChatState) {
        let outcome = st.sessions.save(st.history.messages());
        if let Some(warning) = outcome.warning {
            self.emit(ChatEvent::Warning(warning));
        }
        self.emit(ChatEvent::SessionsChanged(st.sessions.list()));
    }

    fn persist_gate(&self, st: &ChatState) {
        if let Err(e) = st.gate.persist() {
            tracing::error!(error = %e, "Failed to persist entitlement state");
            self.emit(ChatEvent::Warning(
                "Could not save your plan usage.".to_string(),
            ));
        }
    }

    // ============================================
    // Turn protocol
    // ============================================

    fn begin_turn(&self) -> Result<TurnGuard<'_>> {
        if self
            .turn_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Rejected turn while another is in flight");
            return Err(Error::TurnInFlight);
        }
        self.emit(ChatEvent::InputAvailability(false));
        self.stop_playback();
        Ok(TurnGuard {
            service: self,
            finished: false,
        })
    }

    fn reject(&self, guard: &mut TurnGuard<'_>, error: Error, notice: &str) -> Error {
        guard.finish();
        self.emit(ChatEvent::NotificationShown(notice.to_string()));
        error
    }

    /// Append a user message, persist, and show the pending notice.
    fn open_turn(&self, message: Message, notice: &str, typing: bool) {
        {
            let mut guard = self.lock();
            let st = &mut *guard;
            st.history.append(message.clone());
            self.save(st);
        }
        self.emit(ChatEvent::MessageAppended(message));
        if typing {
            self.emit(ChatEvent::TypingIndicator(true));
        }
        self.emit(ChatEvent::NoticeShown(notice.to_string()));
    }

    fn outbound(&self, substitute: Option<(&str, &str)>) -> Vec<ChatMessage> {
        let st = self.lock();
        outbound_window(st.history.recent(self.settings.history_window), substitute)
    }

    /// Terminal step: clear notices, append the assistant message, persist.
    fn close_turn(&self, guard: &mut TurnGuard<'_>, terminal: Message) {
        self.emit(ChatEvent::NoticesCleared);
        self.emit(ChatEvent::TypingIndicator(false));
        {
            let mut state = self.lock();
            let st = &mut *state;
            st.history.append(terminal.clone());
            self.save(st);
        }
        self.emit(ChatEvent::MessageAppended(terminal));
        guard.finish();
    }

    async fn auto_play(&self, message: &Message) {
        if !matches!(message.kind, MessageKind::AssistantText { .. }) || !is_speakable(&message.content) {
            return;
        }
        if let Err(e) = self.speak(&message.id).await {
            tracing::warn!(error = %e, "Auto-play failed");
            self.emit(ChatEvent::NotificationShown(format!("Could not play audio: {e}")));
        }
    }

    // ============================================
    // Turns
    // ============================================

    /// Send a user message and answer it. Returns the terminal assistant message.
    pub async fn send_message(&self, text: &str, auto_play: bool) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Message cannot be empty.".to_string()));
        }
        let mut guard = self.begin_turn()?;

        let thinking_mode = self.lock().thinking_mode;
        let strategy = select_strategy(text, self.services.realtime.is_some(), thinking_mode);
        let notice = match strategy {
            Strategy::Realtime => "Searching for real-time information...".to_string(),
            Strategy::TwoPhase => format!("{} is thinking deeply...", self.settings.assistant_name),
            Strategy::Standard => format!("{} is thinking...", self.settings.assistant_name),
        };
        self.open_turn(Message::user(text), &notice, true);
        tracing::info!(?strategy, "Answering message");

        let terminal = match strategy {
            Strategy::Realtime => self.answer_realtime(text).await,
            Strategy::TwoPhase => {
                let system = prompts::main_system(&self.settings.assistant_name);
                self.answer_two_phase(system, self.outbound(None), "Formulating final answer...", |phase, e| {
                    match phase {
                        FailedPhase::Thinking => {
                            format!("Sorry, I encountered an error during the thinking phase: {e}")
                        }
                        FailedPhase::Final => {
                            format!("Sorry, I encountered an error formulating the final answer: {e}")
                        }
                    }
                })
                .await
            }
            Strategy::Standard => {
                let system = prompts::main_system(&self.settings.assistant_name);
                self.answer_standard(system, self.outbound(None), |e| {
                    format!("Sorry, I encountered an error: {e}")
                })
                .await
            }
        };

        self.close_turn(&mut guard, terminal.clone());
        if auto_play {
            self.auto_play(&terminal).await;
        }
        Ok(terminal)
    }

    async fn answer_realtime(&self, query: &str) -> Message {
        let result = match self.services.realtime() {
            Ok(realtime) => realtime.complete(&realtime_request(query)).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(content) if !content.trim().is_empty() => Message::assistant(content, Some(Source::Gemini)),
            Ok(_) => Message::assistant(
                format!("Sorry, I couldn't fetch the real-time information: {EMPTY_REALTIME_RESPONSE}"),
                None,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Realtime lookup failed");
                Message::assistant(
                    format!("Sorry, I couldn't fetch the real-time information: {e}"),
                    None,
                )
            }
        }
    }

    async fn answer_standard(
        &self,
        system: String,
        window: Vec<ChatMessage>,
        error_text: impl Fn(&Error) -> String,
    ) -> Message {
        let result = match self.services.completion() {
            Ok(completion) => completion.complete(&with_system(system, window)).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(content) => Message::assistant(content, Some(Source::OpenAI)),
            Err(e) => {
                tracing::warn!(error = %e, "Completion failed");
                Message::assistant(error_text(&e), None)
            }
        }
    }

    async fn answer_two_phase(
        &self,
        system: String,
        window: Vec<ChatMessage>,
        final_notice: &str,
        error_text: impl Fn(FailedPhase, &Error) -> String,
    ) -> Message {
        let completion = match self.services.completion() {
            Ok(completion) => completion.clone(),
            Err(e) => return Message::assistant(error_text(FailedPhase::Thinking, &e), None),
        };
        let mut turn = ThinkingTurn::new(system, window);
        let result = turn
            .run(completion.as_ref(), |reasoning| {
                self.emit(ChatEvent::NoticesCleared);
                self.emit(ChatEvent::ReasoningReady(reasoning.to_string()));
                self.emit(ChatEvent::NoticeShown(final_notice.to_string()));
            })
            .await;
        match result {
            Ok(answer) => Message::assistant(answer, Some(Source::OpenAI)),
            Err(failure) => Message::assistant(error_text(failure.phase, &failure.error), None),
        }
    }

    /// Reply to an earlier assistant message.
    ///
    /// Fails without touching history if the text is empty or the target is
    /// not an assistant message in this conversation.
    pub async fn send_reply(&self, target_id: &str, text: &str) -> Result<Message> {
        let mut guard = self.begin_turn()?;

        let resolved = {
            let st = self.lock();
            reply::resolve(st.history.messages(), target_id, text)
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e @ Error::MessageNotFound(_)) => {
                return Err(self.reject(&mut guard, e, REPLY_TARGET_MISSING))
            }
            Err(e) => {
                let notice = e.to_string();
                return Err(self.reject(&mut guard, e, &notice));
            }
        };

        let reply_id = resolved.message.id.clone();
        let thinking_mode = self.lock().thinking_mode;
        let notice = format!("{} is thinking...", self.settings.assistant_name);
        self.open_turn(resolved.message, &notice, true);
        tracing::info!(target_id, thinking_mode, "Answering reply");

        let window = self.outbound(Some((reply_id.as_str(), resolved.outbound_context.as_str())));
        let system = prompts::reply_system(&self.settings.assistant_name);
        let error_text = |e: &Error| format!("Sorry, I encountered an error processing the reply: {e}");
        let terminal = if thinking_mode {
            self.answer_two_phase(system, window, "Formulating final reply...", |_, e| error_text(e))
                .await
        } else {
            self.answer_standard(system, window, error_text).await
        };

        self.close_turn(&mut guard, terminal.clone());
        Ok(terminal)
    }

    /// Generate a batch of images for a prompt.
    pub async fn generate_images(
        &self,
        prompt: &str,
        style: Option<&str>,
        aspect_ratio: Option<&str>,
    ) -> Result<ImageOutcome> {
        let job = match ImageJob::new(prompt, style, aspect_ratio) {
            Ok(job) => job,
            Err(e) => {
                self.emit(ChatEvent::NotificationShown(e.to_string()));
                return Err(e);
            }
        };
        let mut guard = self.begin_turn()?;

        let decision = self.lock().gate.can_generate();
        let count = match decision {
            Decision::Allowed { images_per_batch } => images_per_batch,
            Decision::Denied(reason) => {
                tracing::info!(%reason, "Image generation denied");
                self.close_turn(&mut guard, Message::assistant(reason.to_string(), None));
                return Ok(ImageOutcome::Denied(reason));
            }
        };

        self.open_turn(
            job.request(count),
            &job.generating_notice(count),
            false,
        );

        let generator = match self.services.image() {
            Ok(generator) => generator.clone(),
            Err(e) => {
                let text = format!("Sorry, I encountered an error generating the images: {e}");
                self.close_turn(&mut guard, Message::assistant(text, None));
                return Ok(ImageOutcome::Unavailable);
            }
        };

        let outcome = run_batch(generator.as_ref(), &job, count).await;
        let terminal = match &outcome {
            BatchOutcome::AllFailed { .. } => Message::assistant(
                format!("Sorry, I encountered an error generating the images: {ALL_IMAGES_FAILED}"),
                None,
            ),
            BatchOutcome::Completed { urls, .. } => {
                let status = {
                    let mut st = self.lock();
                    st.gate.record_generation(urls.len());
                    self.persist_gate(&st);
                    st.gate.status()
                };
                self.emit(ChatEvent::PlanChanged(status));
                job.gallery(urls.clone())
            }
        };

        self.close_turn(&mut guard, terminal);
        if let Some(notice) = outcome.partial_failure_notice() {
            self.emit(ChatEvent::NotificationShown(notice));
        }
        Ok(ImageOutcome::Generated(outcome))
    }

    /// Ask a question about an image given as a `data:` URL (or any URL the
    /// completion capability accepts).
    pub async fn analyze_image(&self, image_data_url: &str, question: &str) -> Result<Message> {
        let (image_data_url, question) = (image_data_url.trim(), question.trim());
        if image_data_url.is_empty() {
            return Err(Error::Validation("Please upload an image first.".to_string()));
        }
        if question.is_empty() {
            return Err(Error::Validation(
                "Please enter a question about the image.".to_string(),
            ));
        }
        let mut guard = self.begin_turn()?;

        let notice = format!("{} is analyzing the image...", self.settings.assistant_name);
        self.open_turn(Message::image_question(question, image_data_url), &notice, true);

        let request = vec![
            ChatMessage::system(prompts::image_analysis_system(&self.settings.assistant_name)),
            ChatMessage::user_with_image(question, image_data_url),
        ];
        let result = match self.services.completion() {
            Ok(completion) => completion.complete(&request).await,
            Err(e) => Err(e),
        };
        let terminal = match result {
            Ok(content) => Message {
                kind: MessageKind::AssistantText {
                    source: Some(Source::OpenAI),
                    in_response_to_image: true,
                },
                ..Message::assistant(content, None)
            },
            Err(e) => {
                tracing::warn!(error = %e, "Image analysis failed");
                Message::assistant(
                    format!("Sorry, I encountered an error analyzing the image: {e}"),
                    None,
                )
            }
        };

        self.close_turn(&mut guard, terminal.clone());
        Ok(terminal)
    }

    /// Submit recognized speech. The answer is played back when possible.
    pub async fn submit_transcript(&self, text: &str) -> Result<Message> {
        self.stop_capture();
        self.send_message(text, true).await
    }

    // ============================================
    // Sessions
    // ============================================

    fn ensure_idle(&self) -> Result<()> {
        if self.turn_active.load(Ordering::SeqCst) {
            return Err(Error::TurnInFlight);
        }
        Ok(())
    }

    /// Leave the current session and start a fresh chat with the greeting.
    pub fn start_new_chat(&self) -> Result<()> {
        self.ensure_idle()?;
        self.stop_playback();
        let mut guard = self.lock();
        let st = &mut *guard;
        self.save(st);
        st.sessions.clear_active();
        st.history = ConversationHistory::from_messages(vec![self.greeting()]);
        tracing::info!("Started new chat");

        self.emit(ChatEvent::HistoryReplaced(st.history.messages().to_vec()));
        self.emit(ChatEvent::SessionsChanged(st.sessions.list()));
        Ok(())
    }

    /// Switch to a session by storage index (see [`SessionSummary::index`]).
    pub fn load_session(&self, index: usize) -> Result<()> {
        self.ensure_idle()?;
        self.stop_playback();
        let mut guard = self.lock();
        let st = &mut *guard;
        if st.sessions.session(index).is_none() {
            return Err(Error::SessionNotFound(index));
        }
        self.save(st);
        st.sessions.set_active(index);
        let history = st
            .sessions
            .session(index)
            .map(|s| s.history.clone())
            .unwrap_or_default();
        st.history = ConversationHistory::from_messages(history);
        tracing::info!(index, "Loaded session");

        self.emit(ChatEvent::HistoryReplaced(st.history.messages().to_vec()));
        self.emit(ChatEvent::SessionsChanged(st.sessions.list()));
        Ok(())
    }

    /// Sessions newest first.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.lock().sessions.list()
    }

    pub fn active_session_index(&self) -> Option<usize> {
        self.lock().sessions.active_index()
    }

    pub fn history(&self) -> Vec<Message> {
        self.lock().history.messages().to_vec()
    }

    /// The quote shown above a reply message.
    ///
    /// `Ok(None)` when the message is not a reply or its target is gone.
    pub fn reply_quote(&self, message_id: &str) -> Result<Option<ReplyQuote>> {
        let st = self.lock();
        let message = st
            .history
            .find(message_id)
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;
        Ok(message
            .reply_to_id()
            .and_then(|target| st.history.find(target))
            .map(reply::quote_for))
    }

    // ============================================
    // Modes and plans
    // ============================================

    pub fn thinking_mode(&self) -> bool {
        self.lock().thinking_mode
    }

    /// Flip thinking mode; returns the new state.
    pub fn toggle_thinking_mode(&self) -> bool {
        let enabled = {
            let mut st = self.lock();
            st.thinking_mode = !st.thinking_mode;
            st.thinking_mode
        };
        tracing::info!(enabled, "Thinking mode toggled");
        self.emit(ChatEvent::NotificationShown(format!(
            "Thinking Mode {}.",
            if enabled { "activated" } else { "deactivated" }
        )));
        enabled
    }

    pub fn plan(&self) -> PlanStatus {
        self.lock().gate.status()
    }

    /// Redeem an activation code.
    pub fn activate(&self, code: &str) -> Result<PlanStatus> {
        let status = {
            let mut st = self.lock();
            let tier: Tier = st.gate.activate(code)?;
            self.persist_gate(&st);
            tracing::info!(%tier, "Plan activated");
            st.gate.status()
        };
        self.emit(ChatEvent::PlanChanged(status.clone()));
        self.emit(ChatEvent::NotificationShown(format!(
            "Successfully activated {}!",
            status.info().name
        )));
        Ok(status)
    }

    // ============================================
    // Side effects
    // ============================================

    /// Synthesize and play an assistant text message.
    pub async fn speak(&self, message_id: &str) -> Result<()> {
        let text = {
            let st = self.lock();
            let message = st
                .history
                .find(message_id)
                .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;
            if !matches!(message.kind, MessageKind::AssistantText { .. }) {
                return Err(Error::Validation("Only text responses can be spoken.".to_string()));
            }
            message.content.clone()
        };
        if !is_speakable(&text) {
            return Err(Error::Validation("Nothing to speak.".to_string()));
        }

        let synthesizer = self.services.speech()?.clone();
        let audio: Arc<[u8]> = Arc::from(synthesizer.synthesize(&text).await?);

        let previous = self.lock().effects.begin_playback(message_id, audio.clone());
        if let Some(previous) = previous {
            self.emit(ChatEvent::PlaybackStopped {
                message_id: previous,
            });
        }
        tracing::debug!(message_id, bytes = audio.len(), "Playback started");
        self.emit(ChatEvent::PlaybackStarted {
            message_id: message_id.to_string(),
            audio,
        });
        self.emit(ChatEvent::InputAvailability(false));
        Ok(())
    }

    /// The renderer finished playing the current audio.
    pub fn playback_finished(&self) {
        self.stop_playback();
    }

    /// Stop any playback and release its audio.
    pub fn stop_playback(&self) {
        let (stopped, enabled) = {
            let mut st = self.lock();
            (st.effects.end_playback(), st.effects.input_free())
        };
        if let Some(message_id) = stopped {
            self.emit(ChatEvent::PlaybackStopped { message_id });
            let enabled = enabled && !self.turn_active.load(Ordering::SeqCst);
            self.emit(ChatEvent::InputAvailability(enabled));
        }
    }

    /// Begin speech capture. Rejected while audio is playing.
    pub fn start_capture(&self) -> Result<()> {
        let started = self.lock().effects.begin_capture();
        match started {
            Ok(restarted) => {
                if restarted {
                    self.emit(ChatEvent::CaptureStopped);
                }
                self.emit(ChatEvent::CaptureStarted);
                self.emit(ChatEvent::InputAvailability(false));
                Ok(())
            }
            Err(e) => {
                self.emit(ChatEvent::NotificationShown(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn stop_capture(&self) {
        let (stopped, enabled) = {
            let mut st = self.lock();
            (st.effects.end_capture(), st.effects.input_free())
        };
        if stopped {
            self.emit(ChatEvent::CaptureStopped);
            let enabled = enabled && !self.turn_active.load(Ordering::SeqCst);
            self.emit(ChatEvent::InputAvailability(enabled));
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock().effects.is_playing()
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().effects.is_capturing()
    }
}
