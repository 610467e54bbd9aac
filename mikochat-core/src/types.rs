//! Core domain types for mikochat
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One persisted conversation: ordered messages, a title and an identity |
//! | **Turn** | One user submission through to a terminal assistant message |
//! | **Message** | One entry in a session's history |
//! | **Wire message** | The `{role, content}` shape sent to a completion capability |
//!
//! Messages are a sum type over their variants ([`MessageKind`]); each variant
//! carries only the fields relevant to it. The flat, optional-field record used
//! on disk lives in [`crate::records`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to a session until one is derived from its history.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// Generate a fresh message id (`msg-<millis>-<9 random chars>`).
pub fn generate_message_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("msg-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// Truncate to at most `max` characters, appending `...` when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

// ============================================
// Messages
// ============================================

/// Who authored a persisted message.
///
/// Transient `system` notices never become messages; they are events only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Which capability produced an assistant message (informational only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Standard completion capability
    OpenAI,
    /// Realtime-data capability
    Gemini,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::OpenAI => "openai",
            Source::Gemini => "gemini",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "openai" => Some(Source::OpenAI),
            "gemini" => Some(Source::Gemini),
            _ => None,
        }
    }
}

/// Generation metadata shared by image messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMeta {
    /// Style key the images were generated with
    pub style: Option<String>,
    /// Original user prompt, without the style prefix
    pub prompt: Option<String>,
    /// Aspect ratio token (e.g. "16:9")
    pub aspect_ratio: Option<String>,
}

/// The variant-specific part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain user text, optionally replying to an assistant message
    UserText { reply_to_id: Option<String> },
    /// A user question about an uploaded image
    ImageQuestion { image_data_url: String },
    /// The user's image generation request, as shown in the transcript
    ImageRequest { meta: MediaMeta },
    /// Plain assistant text
    AssistantText {
        source: Option<Source>,
        in_response_to_image: bool,
    },
    /// A single generated image (legacy); `content` holds its location
    Image {
        meta: MediaMeta,
        urls: Option<Vec<String>>,
    },
    /// A batch of generated images
    ImageGallery { meta: MediaMeta, urls: Vec<String> },
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique within a session; never reassigned
    pub id: String,
    /// Text, or a synthesized description for media messages
    pub content: String,
    pub kind: MessageKind,
}

impl Message {
    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            content: content.into(),
            kind: MessageKind::UserText { reply_to_id: None },
        }
    }

    /// A user message threaded onto an earlier assistant message.
    pub fn user_reply(content: impl Into<String>, reply_to_id: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            content: content.into(),
            kind: MessageKind::UserText {
                reply_to_id: Some(reply_to_id.into()),
            },
        }
    }

    /// A user question about an uploaded image.
    pub fn image_question(question: impl Into<String>, image_data_url: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            content: question.into(),
            kind: MessageKind::ImageQuestion {
                image_data_url: image_data_url.into(),
            },
        }
    }

    /// The transcript entry for an image generation request.
    pub fn image_request(content: impl Into<String>, meta: MediaMeta) -> Self {
        Self {
            id: generate_message_id(),
            content: content.into(),
            kind: MessageKind::ImageRequest { meta },
        }
    }

    /// An assistant text message.
    pub fn assistant(content: impl Into<String>, source: Option<Source>) -> Self {
        Self {
            id: generate_message_id(),
            content: content.into(),
            kind: MessageKind::AssistantText {
                source,
                in_response_to_image: false,
            },
        }
    }

    /// An assistant gallery of generated images.
    pub fn gallery(content: impl Into<String>, meta: MediaMeta, urls: Vec<String>) -> Self {
        Self {
            id: generate_message_id(),
            content: content.into(),
            kind: MessageKind::ImageGallery { meta, urls },
        }
    }

    pub fn role(&self) -> Role {
        match self.kind {
            MessageKind::UserText { .. }
            | MessageKind::ImageQuestion { .. }
            | MessageKind::ImageRequest { .. } => Role::User,
            MessageKind::AssistantText { .. }
            | MessageKind::Image { .. }
            | MessageKind::ImageGallery { .. } => Role::Assistant,
        }
    }

    /// The message this one replies to, if any.
    pub fn reply_to_id(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::UserText { reply_to_id } => reply_to_id.as_deref(),
            _ => None,
        }
    }

    /// Generation metadata, for image messages.
    pub fn media(&self) -> Option<&MediaMeta> {
        match &self.kind {
            MessageKind::Image { meta, .. } | MessageKind::ImageGallery { meta, .. } => Some(meta),
            _ => None,
        }
    }

    pub fn is_media(&self) -> bool {
        self.media().is_some()
    }

    pub fn is_image_request(&self) -> bool {
        matches!(self.kind, MessageKind::ImageRequest { .. })
    }

    /// Whether this reads as a "generate..." command, for session titles and
    /// the save filter. Outbound context uses [`is_image_request`](Self::is_image_request).
    pub fn is_generation_command(&self) -> bool {
        self.is_image_request()
            || (self.role() == Role::User && self.content.to_lowercase().starts_with("generate"))
    }
}

// ============================================
// Sessions
// ============================================

/// A named, ordered conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Creation timestamp in epoch milliseconds, as a string
    pub id: String,
    pub title: String,
    pub history: Vec<Message>,
}

impl Session {
    /// Numeric value of the id, used for newest-first ordering.
    pub fn sort_key(&self) -> i64 {
        self.id.parse().unwrap_or(0)
    }
}

/// One row of the session list, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Index in storage order; what `load_session` expects
    pub index: usize,
    pub id: String,
    /// Full title (shown on hover)
    pub title: String,
    /// Title shortened for the list
    pub display_title: String,
    pub message_count: usize,
    pub active: bool,
}

// ============================================
// Wire messages
// ============================================

/// Role of a message sent to a completion capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

/// One part of a multi-part (vision) message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Content of a wire message: plain text or text plus image references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl WireContent {
    /// The textual part of the content.
    pub fn text(&self) -> String {
        match self {
            WireContent::Text(text) => text.clone(),
            WireContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A message as sent to a completion capability: only role and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: WireRole,
    pub content: WireContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::System,
            content: WireContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: WireContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::Assistant,
            content: WireContent::Text(content.into()),
        }
    }

    /// A user message carrying a question and an image reference.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: WireContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }

    /// Strip a history message down to role and content.
    pub fn from_message(message: &Message) -> Self {
        match message.role() {
            Role::User => Self::user(message.content.clone()),
            Role::Assistant => Self::assistant(message.content.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert!(a.starts_with("msg-"));
        assert_ne!(a, b);
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_with_ellipsis("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_with_ellipsis("short", 30), "short");
    }

    #[test]
    fn roles_follow_variants() {
        assert_eq!(Message::user("hi").role(), Role::User);
        assert_eq!(Message::image_question("what?", "data:x").role(), Role::User);
        assert_eq!(Message::assistant("hello", None).role(), Role::Assistant);
        let gallery = Message::gallery("[Generated]", MediaMeta::default(), vec![]);
        assert_eq!(gallery.role(), Role::Assistant);
        assert!(gallery.is_media());
    }

    #[test]
    fn generation_commands_are_user_only_and_case_insensitive() {
        assert!(Message::user("Generate 4 images (Style: ghibli)").is_generation_command());
        assert!(!Message::assistant("generate this", None).is_generation_command());
        assert!(!Message::user("please generate").is_generation_command());
    }

    #[test]
    fn only_the_request_kind_is_an_image_request() {
        let request = Message::image_request("Generate 1 images: cat", MediaMeta::default());
        assert_eq!(request.role(), Role::User);
        assert!(request.is_image_request());
        assert!(request.is_generation_command());
        assert!(!Message::user("Generate a haiku about Rust").is_image_request());
    }

    #[test]
    fn multi_part_content_serializes_like_vision_requests() {
        let msg = ChatMessage::user_with_image("what is this?", "data:image/png;base64,AAA");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,AAA");
        assert_eq!(msg.content.text(), "what is this?");
    }

    #[test]
    fn wire_messages_drop_internal_fields() {
        let reply = Message::user_reply("thanks", "msg-1");
        let wire = serde_json::to_value(ChatMessage::from_message(&reply)).unwrap();
        assert_eq!(wire, serde_json::json!({"role": "user", "content": "thanks"}));
    }
}
