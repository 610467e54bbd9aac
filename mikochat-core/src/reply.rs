//! Reply threading: quoting an earlier assistant message.
//!
//! The stored reply keeps the user's plain text. The quoted context exists
//! only in the outbound request, substituted into the reply's slot.

use crate::error::{Error, Result};
use crate::types::{truncate_with_ellipsis, Message, MessageKind, Role};

const QUOTE_DISPLAY_CHARS: usize = 50;
const CONTEXT_EXCERPT_CHARS: usize = 100;

/// How a reply shows the message it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyQuote {
    /// Shortened for inline display
    pub display: String,
    /// Full text, for hover
    pub full: String,
}

/// Build the quote shown above a reply.
pub fn quote_for(target: &Message) -> ReplyQuote {
    let full = match &target.kind {
        MessageKind::Image { meta, .. } => format!(
            "[Image: {}] ({})",
            meta.prompt.as_deref().unwrap_or("generated image"),
            meta.style.as_deref().unwrap_or("Standard")
        ),
        MessageKind::ImageGallery { meta, .. } => format!(
            "[Image Gallery: {}] ({})",
            meta.prompt.as_deref().unwrap_or("generated images"),
            meta.style.as_deref().unwrap_or("Standard")
        ),
        _ => target.content.clone(),
    };
    ReplyQuote {
        display: truncate_with_ellipsis(&full, QUOTE_DISPLAY_CHARS),
        full,
    }
}

/// The context string sent in place of the reply text.
pub fn outbound_context(target: &Message, reply_text: &str) -> String {
    let excerpt = match &target.kind {
        MessageKind::Image { meta, .. } => format!(
            "[Your previous image: {}]",
            meta.prompt.as_deref().unwrap_or("generated image")
        ),
        MessageKind::ImageGallery { meta, .. } => format!(
            "[Your previous image gallery: {}]",
            meta.prompt.as_deref().unwrap_or("generated images")
        ),
        _ => target.content.clone(),
    };
    format!(
        "(The user is replying to your message: \"{}\")\n\nUser's reply: {reply_text}",
        truncate_with_ellipsis(&excerpt, CONTEXT_EXCERPT_CHARS)
    )
}

/// A validated reply, ready to append.
#[derive(Debug, Clone)]
pub struct ResolvedReply {
    pub message: Message,
    pub quote: ReplyQuote,
    pub outbound_context: String,
}

/// Validate a reply against the full history and build its parts.
///
/// Fails without side effects for empty text, an unknown target or a
/// target that is not an assistant message.
pub fn resolve(history: &[Message], target_id: &str, text: &str) -> Result<ResolvedReply> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Validation("Reply text cannot be empty.".to_string()));
    }
    let target = history
        .iter()
        .find(|m| m.id == target_id)
        .ok_or_else(|| Error::MessageNotFound(target_id.to_string()))?;
    if target.role() != Role::Assistant {
        return Err(Error::Validation(
            "Replies can only quote assistant messages.".to_string(),
        ));
    }

    Ok(ResolvedReply {
        message: Message::user_reply(text, &target.id),
        quote: quote_for(target),
        outbound_context: outbound_context(target, text),
    })
}
