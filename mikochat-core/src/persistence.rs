//! Session persistence layer.
//!
//! Owns the collection of all sessions and the pointer to the active one,
//! and mirrors both to a [`KeyValueStore`]. Storage order is what indexes
//! refer to; display order (newest first) is computed by [`SessionStore::list`].
//!
//! Write failures never escape: they are logged and returned as a
//! user-facing warning on the outcome, and the next save retries.

use crate::error::Error;
use crate::records::{decode_sessions, encode_sessions, MigrationReport};
use crate::store::{KeyValueStore, ACTIVE_INDEX_KEY, SESSIONS_KEY};
use crate::types::{truncate_with_ellipsis, Message, MessageKind, Role, Session, SessionSummary, PLACEHOLDER_TITLE};
use chrono::Utc;
use std::sync::Arc;

const TEXT_TITLE_CHARS: usize = 30;
const MEDIA_TITLE_PROMPT_CHARS: usize = 15;
const LIST_TITLE_LIMIT: usize = 25;
const LIST_TITLE_CHARS: usize = 22;
const FALLBACK_TITLE: &str = "Chat";

const QUOTA_WARNING: &str = "Could not save chat history. Storage limit reached. Older chats might be lost if you continue or restart.";
const WRITE_WARNING: &str = "An error occurred while trying to save chat history.";
const LOAD_WARNING: &str = "Failed to load previous chat sessions. Starting with a fresh session.";

/// What a save did to the session collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    /// Fresh conversation with nothing worth keeping yet
    Skipped,
    /// A new session was created and became active
    Created { index: usize },
    /// The active session's history was replaced
    Updated { index: usize },
}

/// Result of [`SessionStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub action: SaveAction,
    /// Set when the durable write failed; in-memory state is still updated
    pub warning: Option<String>,
}

/// Result of [`SessionStore::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub migration: MigrationReport,
    pub active: Option<usize>,
    /// Set when stored data was unreadable and has been cleared
    pub warning: Option<String>,
}

/// Identifies the fixed opening greeting and generation commands.
#[derive(Debug, Clone)]
pub struct MeaningfulFilter {
    greeting_prefix: String,
}

impl MeaningfulFilter {
    pub fn new(assistant_name: &str) -> Self {
        Self {
            greeting_prefix: format!("Hi, I'm {assistant_name}!"),
        }
    }

    pub fn is_greeting(&self, message: &Message) -> bool {
        message.role() == Role::Assistant && message.content.starts_with(&self.greeting_prefix)
    }

    /// A message that makes a conversation worth saving.
    pub fn is_meaningful(&self, message: &Message) -> bool {
        !self.is_greeting(message) && !message.is_generation_command()
    }

    /// Derive a display title from a history.
    ///
    /// Prefers the first non-command user text, then the first generated
    /// image, then the first assistant text, then the first user message.
    pub fn derive_title(&self, history: &[Message]) -> String {
        let first_meaningful = history.iter().find(|m| match m.role() {
            Role::User => !m.is_generation_command(),
            Role::Assistant => m.is_media(),
        });

        if let Some(message) = first_meaningful {
            return match &message.kind {
                MessageKind::Image { meta, .. } | MessageKind::ImageGallery { meta, .. } => {
                    let label = if matches!(message.kind, MessageKind::ImageGallery { .. }) {
                        "Gallery"
                    } else {
                        "Image"
                    };
                    let prompt: String = meta
                        .prompt
                        .as_deref()
                        .unwrap_or_default()
                        .chars()
                        .take(MEDIA_TITLE_PROMPT_CHARS)
                        .collect();
                    format!(
                        "{label} ({}): {prompt}...",
                        meta.style.as_deref().unwrap_or("Std")
                    )
                }
                _ => truncate_with_ellipsis(&message.content, TEXT_TITLE_CHARS),
            };
        }

        let first_assistant_text = history.iter().find(|m| {
            matches!(m.kind, MessageKind::AssistantText { .. })
                && !self.is_greeting(m)
                && !m.content.starts_with("[Generated")
        });
        if let Some(message) = first_assistant_text {
            return truncate_with_ellipsis(&message.content, TEXT_TITLE_CHARS);
        }

        history
            .iter()
            .find(|m| m.role() == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string())
    }
}

/// The durable collection of sessions plus the active pointer.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    filter: MeaningfulFilter,
    sessions: Vec<Session>,
    active: Option<usize>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, filter: MeaningfulFilter) -> Self {
        Self {
            store,
            filter,
            sessions: Vec::new(),
            active: None,
        }
    }

    pub fn filter(&self) -> &MeaningfulFilter {
        &self.filter
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.and_then(|i| self.sessions.get(i))
    }

    /// Point at an existing session. Returns `false` if the index is out of range.
    pub fn set_active(&mut self, index: usize) -> bool {
        if index < self.sessions.len() {
            self.active = Some(index);
            true
        } else {
            false
        }
    }

    /// Detach from the active session; the next meaningful save creates one.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Read both keys and rebuild the collection.
    ///
    /// Unreadable data clears both keys and starts empty.
    pub fn load(&mut self) -> LoadReport {
        let loaded = self.read_stored();
        match loaded {
            Ok((sessions, saved_index, migration)) => {
                self.sessions = sessions;
                self.active = resolve_active_index(saved_index.as_deref(), self.sessions.len());
                tracing::info!(
                    sessions = self.sessions.len(),
                    active = ?self.active,
                    "Loaded chat sessions"
                );
                LoadReport {
                    migration,
                    active: self.active,
                    warning: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load chat sessions; clearing stored data");
                self.sessions.clear();
                self.active = None;
                for key in [SESSIONS_KEY, ACTIVE_INDEX_KEY] {
                    if let Err(e) = self.store.remove(key) {
                        tracing::error!(key, error = %e, "Failed to clear corrupted storage key");
                    }
                }
                LoadReport {
                    warning: Some(LOAD_WARNING.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    fn read_stored(&self) -> crate::Result<(Vec<Session>, Option<String>, MigrationReport)> {
        let raw_sessions = self.store.get(SESSIONS_KEY)?;
        let saved_index = self.store.get(ACTIVE_INDEX_KEY)?;
        let (sessions, migration) = match raw_sessions {
            Some(raw) => decode_sessions(&raw)?,
            None => (Vec::new(), MigrationReport::default()),
        };
        Ok((sessions, saved_index, migration))
    }

    /// Save the active conversation.
    ///
    /// A fresh conversation holding only the greeting or generation commands
    /// is not saved. Otherwise missing ids are filled, the active session is
    /// created or replaced, its title derived if still unset, and everything
    /// is written through.
    pub fn save(&mut self, history: &[Message]) -> SaveOutcome {
        let history = with_ids(history);
        let meaningful = history.iter().any(|m| self.filter.is_meaningful(m));

        if self.active.is_some_and(|i| i >= self.sessions.len()) {
            tracing::error!(active = ?self.active, "Active session index is invalid on save");
            self.active = None;
        }

        let action = match self.active {
            None if !meaningful => {
                return SaveOutcome {
                    action: SaveAction::Skipped,
                    warning: None,
                }
            }
            None => {
                let session = Session {
                    id: self.next_session_id(),
                    title: self.filter.derive_title(&history),
                    history,
                };
                tracing::info!(session_id = %session.id, title = %session.title, "Created chat session");
                self.sessions.push(session);
                let index = self.sessions.len() - 1;
                self.active = Some(index);
                SaveAction::Created { index }
            }
            Some(index) => {
                let needs_title = meaningful && {
                    let title = &self.sessions[index].title;
                    title.is_empty() || title == PLACEHOLDER_TITLE
                };
                if needs_title {
                    self.sessions[index].title = self.filter.derive_title(&history);
                }
                self.sessions[index].history = history;
                SaveAction::Updated { index }
            }
        };

        SaveOutcome {
            action,
            warning: self.persist(),
        }
    }

    /// Write the collection and the active pointer.
    ///
    /// Returns a user-facing warning if the write failed.
    pub fn persist(&mut self) -> Option<String> {
        self.prune_invalid();

        let result = encode_sessions(&self.sessions).and_then(|encoded| {
            self.store.set(SESSIONS_KEY, &encoded)?;
            let index = self.active.map(|i| i.to_string()).unwrap_or_default();
            self.store.set(ACTIVE_INDEX_KEY, &index)
        });

        match result {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist chat sessions");
                Some(match e {
                    Error::StorageQuota(_) => QUOTA_WARNING.to_string(),
                    _ => WRITE_WARNING.to_string(),
                })
            }
        }
    }

    fn prune_invalid(&mut self) {
        if self.sessions.iter().all(|s| !s.id.is_empty()) {
            return;
        }
        tracing::warn!("Pruning invalid chat sessions before saving");

        let active_id = self.active_session().map(|s| s.id.clone());
        self.sessions.retain(|s| !s.id.is_empty());
        self.active = match active_id.filter(|id| !id.is_empty()) {
            Some(id) => self.sessions.iter().position(|s| s.id == id),
            None => None,
        }
        .or_else(|| (!self.sessions.is_empty()).then_some(0));
    }

    fn next_session_id(&self) -> String {
        let mut candidate = Utc::now().timestamp_millis();
        while self.sessions.iter().any(|s| s.sort_key() == candidate) {
            candidate += 1;
        }
        candidate.to_string()
    }

    /// Sessions newest first, each carrying its storage index.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<(i64, SessionSummary)> = self
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.id.is_empty())
            .map(|(index, session)| {
                let title = if session.title.is_empty() {
                    format!("Chat {}", session.id)
                } else {
                    session.title.clone()
                };
                let display_title = if title.chars().count() > LIST_TITLE_LIMIT {
                    truncate_with_ellipsis(&title, LIST_TITLE_CHARS)
                } else {
                    title.clone()
                };
                (
                    session.sort_key(),
                    SessionSummary {
                        index,
                        id: session.id.clone(),
                        title,
                        display_title,
                        message_count: session.history.len(),
                        active: self.active == Some(index),
                    },
                )
            })
            .collect();
        summaries.sort_by(|a, b| b.0.cmp(&a.0));
        summaries.into_iter().map(|(_, s)| s).collect()
    }
}

fn with_ids(history: &[Message]) -> Vec<Message> {
    let mut history = crate::history::ConversationHistory::from_messages(history.to_vec());
    history.repair_ids();
    history.messages().to_vec()
}

/// Validate a stored active index against the loaded collection.
fn resolve_active_index(saved: Option<&str>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match saved.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(index) if index < len => Some(index),
            _ => {
                tracing::warn!(saved = raw, "Stored session index invalid, defaulting to 0");
                Some(0)
            }
        },
        None => Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::MediaMeta;

    fn filter() -> MeaningfulFilter {
        MeaningfulFilter::new("Miko")
    }

    fn greeting() -> Message {
        Message::assistant("Hi, I'm Miko! How can I help you today?", None)
    }

    fn store_with(raw_sessions: Option<&str>, index: Option<&str>) -> SessionStore {
        let kv = Arc::new(MemoryStore::new());
        if let Some(raw) = raw_sessions {
            kv.set(SESSIONS_KEY, raw).unwrap();
        }
        if let Some(index) = index {
            kv.set(ACTIVE_INDEX_KEY, index).unwrap();
        }
        SessionStore::new(kv, filter())
    }

    #[test]
    fn greeting_only_conversation_is_not_saved() {
        let mut store = store_with(None, None);
        let outcome = store.save(&[greeting(), Message::user("Generate 1 images: cat")]);
        assert_eq!(outcome.action, SaveAction::Skipped);
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn first_meaningful_save_creates_active_session_with_title() {
        let mut store = store_with(None, None);
        let outcome = store.save(&[greeting(), Message::user("What is the tallest mountain on Earth?")]);
        assert_eq!(outcome.action, SaveAction::Created { index: 0 });
        assert_eq!(store.active_index(), Some(0));
        assert_eq!(store.sessions()[0].title, "What is the tallest mountain o...");
    }

    #[test]
    fn later_saves_replace_history_but_keep_title() {
        let mut store = store_with(None, None);
        let mut history = vec![Message::user("first question")];
        store.save(&history);
        history.push(Message::user("second question"));
        let outcome = store.save(&history);
        assert_eq!(outcome.action, SaveAction::Updated { index: 0 });
        assert_eq!(store.sessions()[0].history.len(), 2);
        assert_eq!(store.sessions()[0].title, "first question");
    }

    #[test]
    fn placeholder_title_is_replaced_on_next_meaningful_save() {
        let mut store = store_with(
            Some(r#"[{"id":"1","title":"New Chat","history":[]}]"#),
            Some("0"),
        );
        store.load();
        store.save(&[Message::user("hello there")]);
        assert_eq!(store.sessions()[0].title, "hello there");
    }

    #[test]
    fn title_derivation_is_idempotent() {
        let history = vec![greeting(), Message::user("Explain borrowing")];
        assert_eq!(filter().derive_title(&history), filter().derive_title(&history));
    }

    #[test]
    fn media_titles_use_style_and_prompt_excerpt() {
        let gallery = Message::gallery(
            "[Generated 4 images]",
            MediaMeta {
                style: Some("ghibli".to_string()),
                prompt: Some("a lighthouse at dusk in the rain".to_string()),
                aspect_ratio: Some("1:1".to_string()),
            },
            vec![],
        );
        let history = vec![greeting(), Message::user("Generate 4 images: ..."), gallery];
        assert_eq!(filter().derive_title(&history), "Gallery (ghibli): a lighthouse at...");
    }

    #[test]
    fn title_fallbacks() {
        let f = filter();
        let answer = Message::assistant("Sorry, I encountered an error generating the images", None);
        assert_eq!(
            f.derive_title(&[greeting(), Message::user("generate a cat"), answer]),
            "Sorry, I encountered an error ..."
        );
        assert_eq!(
            f.derive_title(&[greeting(), Message::user("generate a cat")]),
            "generate a cat"
        );
        assert_eq!(f.derive_title(&[greeting()]), "Chat");
    }

    #[test]
    fn save_assigns_missing_ids() {
        let mut store = store_with(None, None);
        let mut msg = Message::user("hello");
        msg.id.clear();
        store.save(&[msg]);
        assert!(!store.sessions()[0].history[0].id.is_empty());
    }

    #[test]
    fn out_of_range_index_falls_back_to_first_session() {
        let raw = r#"[{"id":"1","title":"a","history":[]},{"id":"2","title":"b","history":[]}]"#;
        let mut store = store_with(Some(raw), Some("7"));
        let report = store.load();
        assert_eq!(report.active, Some(0));
        assert!(report.warning.is_none());

        let mut empty = store_with(Some("[]"), Some("3"));
        assert_eq!(empty.load().active, None);

        let mut garbage = store_with(Some(raw), Some("abc"));
        assert_eq!(garbage.load().active, Some(0));
    }

    #[test]
    fn corrupted_storage_is_cleared() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(SESSIONS_KEY, "{not json").unwrap();
        kv.set(ACTIVE_INDEX_KEY, "0").unwrap();
        let mut store = SessionStore::new(kv.clone(), filter());

        let report = store.load();
        assert!(report.warning.is_some());
        assert!(store.sessions().is_empty());
        assert_eq!(store.active_index(), None);
        assert_eq!(kv.get(SESSIONS_KEY).unwrap(), None);
        assert_eq!(kv.get(ACTIVE_INDEX_KEY).unwrap(), None);
    }

    #[test]
    fn quota_failure_is_reported_not_raised() {
        let kv = Arc::new(MemoryStore::with_quota(16));
        let mut store = SessionStore::new(kv, filter());
        let outcome = store.save(&[Message::user("a message long enough to overflow the quota")]);
        assert_eq!(outcome.action, SaveAction::Created { index: 0 });
        assert_eq!(outcome.warning.as_deref(), Some(QUOTA_WARNING));
        assert_eq!(store.sessions().len(), 1);
    }

    #[test]
    fn persist_prunes_invalid_sessions_and_repoints_active() {
        let mut store = store_with(None, None);
        store.save(&[Message::user("one")]);
        store.sessions.insert(
            0,
            Session {
                id: String::new(),
                title: "broken".to_string(),
                history: vec![],
            },
        );
        store.active = Some(0);

        assert!(store.persist().is_none());
        assert_eq!(store.sessions().len(), 1);
        assert_eq!(store.active_index(), Some(0));
    }

    #[test]
    fn list_is_newest_first_with_storage_indexes() {
        let raw = r#"[
            {"id":"100","title":"older","history":[]},
            {"id":"300","title":"A title that is definitely longer than twenty-five","history":[]},
            {"id":"200","title":"","history":[]}
        ]"#;
        let mut store = store_with(Some(raw), Some("2"));
        store.load();
        let list = store.list();
        let order: Vec<_> = list.iter().map(|s| (s.id.as_str(), s.index)).collect();
        assert_eq!(order, vec![("300", 1), ("200", 2), ("100", 0)]);
        assert_eq!(list[0].display_title, "A title that is defini...");
        assert_eq!(list[1].title, "Chat 200");
        assert!(list[1].active);
    }

    #[test]
    fn save_then_load_round_trips_history() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut store = SessionStore::new(kv.clone(), filter());
        let history = vec![greeting(), Message::user("hi"), Message::assistant("hello!", None)];
        store.save(&history);

        let mut reloaded = SessionStore::new(kv, filter());
        let report = reloaded.load();
        assert_eq!(report.active, Some(0));
        assert_eq!(reloaded.sessions()[0].history, history);
    }
}
