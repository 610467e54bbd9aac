//! Response strategy selection and outbound request shaping.

use crate::types::{ChatMessage, Message};

/// Phrases that suggest the user needs live data.
pub const REALTIME_KEYWORDS: &[&str] = &[
    "latest news",
    "current events",
    "stock price",
    "weather in",
    "forecast for",
    "sports score",
    "live score",
    "current time",
    "what is happening",
    "right now",
    "today's date",
    "current temperature",
    "exchange rate",
    "latest update",
    "breaking news",
];

/// How a user message will be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One request to the realtime-data capability
    Realtime,
    /// Reasoning request, then final-answer request
    TwoPhase,
    /// One completion request
    Standard,
}

pub fn has_realtime_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    REALTIME_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Pick exactly one strategy for a message.
pub fn select_strategy(text: &str, realtime_available: bool, thinking_mode: bool) -> Strategy {
    if realtime_available && has_realtime_intent(text) {
        Strategy::Realtime
    } else if thinking_mode {
        Strategy::TwoPhase
    } else {
        Strategy::Standard
    }
}

/// Recent history as wire messages.
///
/// Image requests and generated-image messages are left out, and every
/// message is reduced to role and content. If `substitute` names a message
/// id, that message's content is replaced by the given text.
pub fn outbound_window(recent: &[Message], substitute: Option<(&str, &str)>) -> Vec<ChatMessage> {
    recent
        .iter()
        .filter(|m| !m.is_image_request() && !m.is_media())
        .map(|m| match substitute {
            Some((id, content)) if m.id == id => ChatMessage::user(content),
            _ => ChatMessage::from_message(m),
        })
        .collect()
}

/// Prepend a system prompt to an outbound window.
pub fn with_system(system_prompt: impl Into<String>, window: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(window.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(window);
    messages
}

/// The realtime-data capability gets the query alone, without history.
pub fn realtime_request(query: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(query)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaMeta, WireRole};

    #[test]
    fn realtime_needs_both_keyword_and_capability() {
        assert_eq!(
            select_strategy("What's the Weather in Paris?", true, true),
            Strategy::Realtime
        );
        assert_eq!(
            select_strategy("What's the weather in Paris?", false, false),
            Strategy::Standard
        );
        assert_eq!(select_strategy("Explain lifetimes", true, true), Strategy::TwoPhase);
        assert_eq!(select_strategy("Explain lifetimes", true, false), Strategy::Standard);
    }

    #[test]
    fn window_drops_image_requests_and_media() {
        let history = vec![
            Message::assistant("Hi, I'm Miko! How can I help you today?", None),
            Message::image_request(
                "Generate 1 images (Style: default, Aspect Ratio: 1:1): cat",
                MediaMeta::default(),
            ),
            Message::gallery("[Generated 1 image]", MediaMeta::default(), vec!["u".into()]),
            Message::user("thanks"),
        ];
        let wire = outbound_window(&history, None);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, WireRole::Assistant);
        assert_eq!(wire[1].content.text(), "thanks");
    }

    #[test]
    fn text_starting_with_generate_is_still_sent() {
        let history = vec![
            Message::user("Generate a haiku about Rust"),
            Message::assistant("Borrowed, never owned", None),
            Message::user("generate another one like it"),
        ];
        let wire = outbound_window(&history, None);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].content.text(), "Generate a haiku about Rust");
        assert_eq!(wire[2].content.text(), "generate another one like it");
    }

    #[test]
    fn substitution_only_touches_the_named_message() {
        let target = Message::assistant("original", None);
        let reply = Message::user_reply("sure", &target.id);
        let history = vec![target, reply.clone()];
        let wire = outbound_window(&history, Some((&reply.id, "CONTEXT")));
        assert_eq!(wire[0].content.text(), "original");
        assert_eq!(wire[1].content.text(), "CONTEXT");
        assert_eq!(history[1].content, "sure");
    }

    #[test]
    fn realtime_request_is_the_bare_query() {
        let request = realtime_request("latest news on rust");
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].role, WireRole::User);
        assert_eq!(request[0].content.text(), "latest news on rust");
    }
}
