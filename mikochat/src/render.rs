//! Line-oriented rendering of chat events.

use mikochat_core::{ChatEvent, Message, MessageKind, PlanStatus, Role, SessionSummary};
use std::path::PathBuf;

/// Turns [`ChatEvent`]s into terminal lines.
pub struct Renderer {
    assistant_name: String,
    audio_dir: PathBuf,
}

impl Renderer {
    pub fn new(assistant_name: impl Into<String>, audio_dir: PathBuf) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            audio_dir,
        }
    }

    /// Lines to print for one event. Most state events print nothing.
    pub fn lines(&self, event: &ChatEvent) -> Vec<String> {
        match event {
            ChatEvent::NoticeShown(text) => vec![format!("… {text}")],
            ChatEvent::NotificationShown(text) => vec![format!("* {text}")],
            ChatEvent::Warning(text) => vec![format!("! {text}")],
            ChatEvent::ReasoningReady(reasoning) => {
                let mut lines = vec!["--- reasoning ---".to_string()];
                lines.extend(reasoning.lines().map(|l| format!("  {l}")));
                lines.push("-----------------".to_string());
                lines
            }
            ChatEvent::MessageAppended(message) if message.role() == Role::Assistant => {
                self.message(message)
            }
            ChatEvent::HistoryReplaced(history) => {
                history.iter().flat_map(|m| self.message(m)).collect()
            }
            ChatEvent::PlaybackStarted { message_id, audio } => {
                let path = self.audio_dir.join(format!("{message_id}.mp3"));
                match std::fs::create_dir_all(&self.audio_dir)
                    .and_then(|_| std::fs::write(&path, &audio[..]))
                {
                    Ok(()) => vec![format!("♪ audio saved to {}", path.display())],
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to write audio");
                        vec![format!("! could not save audio: {e}")]
                    }
                }
            }
            _ => Vec::new(),
        }
    }

    /// A message as it appears in the transcript.
    pub fn message(&self, message: &Message) -> Vec<String> {
        let speaker = match message.role() {
            Role::User => "You",
            Role::Assistant => self.assistant_name.as_str(),
        };
        let mut lines = vec![format!("{speaker}: {}", message.content)];
        let urls: &[String] = match &message.kind {
            MessageKind::Image { urls, .. } => urls.as_deref().unwrap_or_default(),
            MessageKind::ImageGallery { urls, .. } => urls,
            MessageKind::ImageQuestion { .. } => {
                lines[0] = format!("{speaker}: [image] {}", message.content);
                &[]
            }
            _ => &[],
        };
        lines.extend(urls.iter().map(|url| format!("  {url}")));
        if message.role() == Role::Assistant {
            lines.push(format!("  (id: {})", message.id));
        }
        lines
    }
}

/// Session list as shown by `/sessions` and `mikochat sessions`.
pub fn session_lines(sessions: &[SessionSummary]) -> Vec<String> {
    if sessions.is_empty() {
        return vec!["No saved chats yet.".to_string()];
    }
    sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let marker = if s.active { "*" } else { " " };
            format!(
                "{marker}{:>3}. {:<25}  {} messages",
                i + 1,
                s.display_title,
                s.message_count
            )
        })
        .collect()
}

pub fn plan_lines(status: &PlanStatus) -> Vec<String> {
    let info = status.info();
    let usage = match status.remaining_today() {
        Some(remaining) => format!(
            "{} images today, {remaining} remaining",
            status.daily_count
        ),
        None => format!("{} images today, unlimited", status.daily_count),
    };
    let mut lines = vec![
        info.name.to_string(),
        format!("  {}", info.description),
        format!("  {usage}"),
    ];
    lines.extend(info.features.iter().map(|f| format!("  - {f}")));
    lines
}
