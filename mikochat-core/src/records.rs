//! Persisted record format and migration-on-read.
//!
//! Sessions are stored as the flat, camelCase JSON records older versions
//! wrote, so existing data keeps loading. Decoding repairs what it can:
//! - messages without an id get a fresh one
//! - galleries whose `urls` is missing or not an array get an empty list
//! - untyped user records shaped like an image request become one
//! - records with a role other than `user`/`assistant` are dropped
//! - sessions without an id or without a history array are dropped

use crate::error::Result;
use crate::types::{generate_message_id, MediaMeta, Message, MessageKind, Session, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TYPE_IMAGE: &str = "image";
const TYPE_GALLERY: &str = "image-gallery";
const TYPE_IMAGE_REQUEST: &str = "image-request";

/// Older versions stored image requests as plain user text in this shape.
fn looks_like_image_request(content: &str) -> bool {
    content.starts_with("Generate ") && content.contains(" images (Style: ")
}

/// A message as written to storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_image: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_response_to_image: Option<bool>,
}

/// A session as written to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub history: Vec<StoredMessage>,
}

/// Counters describing what decoding had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub dropped_sessions: usize,
    pub dropped_messages: usize,
    pub assigned_ids: usize,
    pub repaired_galleries: usize,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        *self == MigrationReport::default()
    }
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        let mut record = StoredMessage {
            id: Some(message.id.clone()),
            role: message.role().as_str().to_string(),
            content: Some(message.content.clone()),
            ..Default::default()
        };
        match &message.kind {
            MessageKind::UserText { reply_to_id } => {
                record.reply_to_id = reply_to_id.clone();
            }
            MessageKind::ImageQuestion { image_data_url } => {
                record.has_image = Some(true);
                record.image_data_url = Some(image_data_url.clone());
            }
            MessageKind::ImageRequest { meta } => {
                record.kind = Some(TYPE_IMAGE_REQUEST.to_string());
                apply_meta(&mut record, meta);
            }
            MessageKind::AssistantText {
                source,
                in_response_to_image,
            } => {
                record.source = source.map(|s| s.as_str().to_string());
                record.in_response_to_image = in_response_to_image.then_some(true);
            }
            MessageKind::Image { meta, urls } => {
                record.kind = Some(TYPE_IMAGE.to_string());
                apply_meta(&mut record, meta);
                record.urls = urls.as_ref().map(|u| Value::from(u.clone()));
            }
            MessageKind::ImageGallery { meta, urls } => {
                record.kind = Some(TYPE_GALLERY.to_string());
                apply_meta(&mut record, meta);
                record.urls = Some(Value::from(urls.clone()));
            }
        }
        record
    }
}

fn apply_meta(record: &mut StoredMessage, meta: &MediaMeta) {
    record.style = meta.style.clone();
    record.prompt = meta.prompt.clone();
    record.aspect_ratio = meta.aspect_ratio.clone();
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect()
    })
}

impl StoredMessage {
    /// Convert to a domain message, repairing as described in the module docs.
    ///
    /// Returns `None` for records that can never be messages (unknown roles).
    pub fn into_message(self, report: &mut MigrationReport) -> Option<Message> {
        let id = match self.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                report.assigned_ids += 1;
                generate_message_id()
            }
        };
        let content = self.content.unwrap_or_default();
        let meta = MediaMeta {
            style: self.style,
            prompt: self.prompt,
            aspect_ratio: self.aspect_ratio,
        };

        let kind = match self.role.as_str() {
            "user" => {
                if self.has_image == Some(true) || self.image_data_url.is_some() {
                    MessageKind::ImageQuestion {
                        image_data_url: self.image_data_url.unwrap_or_default(),
                    }
                } else if self.kind.as_deref() == Some(TYPE_IMAGE_REQUEST)
                    || (self.kind.is_none()
                        && self.reply_to_id.is_none()
                        && looks_like_image_request(&content))
                {
                    MessageKind::ImageRequest { meta }
                } else {
                    MessageKind::UserText {
                        reply_to_id: self.reply_to_id.filter(|r| !r.is_empty()),
                    }
                }
            }
            "assistant" => match self.kind.as_deref() {
                Some(TYPE_GALLERY) => {
                    let urls = match self.urls.as_ref().and_then(string_list) {
                        Some(urls) => urls,
                        None => {
                            tracing::warn!(
                                message_id = %id,
                                "Repaired missing or invalid urls on image gallery"
                            );
                            report.repaired_galleries += 1;
                            Vec::new()
                        }
                    };
                    MessageKind::ImageGallery { meta, urls }
                }
                Some(TYPE_IMAGE) => MessageKind::Image {
                    meta,
                    urls: self.urls.as_ref().and_then(string_list),
                },
                _ => MessageKind::AssistantText {
                    source: self.source.as_deref().and_then(Source::parse),
                    in_response_to_image: self.in_response_to_image.unwrap_or(false),
                },
            },
            other => {
                tracing::debug!(role = other, "Dropping stored message with unsupported role");
                report.dropped_messages += 1;
                return None;
            }
        };

        Some(Message { id, content, kind })
    }
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            history: session.history.iter().map(StoredMessage::from).collect(),
        }
    }
}

/// Encode the session collection for storage.
pub fn encode_sessions(sessions: &[Session]) -> Result<String> {
    let stored: Vec<StoredSession> = sessions.iter().map(StoredSession::from).collect();
    Ok(serde_json::to_string(&stored)?)
}

/// Whether a raw stored session has the minimum structure to load.
fn is_structurally_valid(value: &Value) -> bool {
    let has_id = match value.get("id") {
        Some(Value::String(id)) => !id.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    has_id && value.get("history").map(Value::is_array).unwrap_or(false)
}

/// Decode the stored session collection, applying all repairs.
///
/// Fails only when the payload is not a JSON list or a history entry is not
/// a JSON object; the caller treats that as corruption.
pub fn decode_sessions(raw: &str) -> Result<(Vec<Session>, MigrationReport)> {
    let values: Vec<Value> = serde_json::from_str(raw)?;
    let mut report = MigrationReport::default();
    let mut sessions = Vec::with_capacity(values.len());

    for value in values {
        if !is_structurally_valid(&value) {
            report.dropped_sessions += 1;
            continue;
        }
        let id = match &value["id"] {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut history = Vec::new();
        if let Some(entries) = value.get("history").and_then(Value::as_array) {
            for entry in entries {
                let record: StoredMessage = serde_json::from_value(entry.clone())?;
                if let Some(message) = record.into_message(&mut report) {
                    history.push(message);
                }
            }
        }

        sessions.push(Session { id, title, history });
    }

    if !report.is_clean() {
        tracing::warn!(?report, "Repaired stored sessions while loading");
    }

    Ok((sessions, report))
}
