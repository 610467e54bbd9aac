//! Side-effect coordinator.
//!
//! Audio playback and speech capture are singleton resources. Starting a new
//! playback replaces (and releases) the previous one; capture cannot start
//! while audio plays.

use crate::error::{Error, Result};
use std::sync::Arc;

pub const BUSY_SPEAKING: &str = "Please wait for the current response to finish speaking.";

/// Whether text is worth sending to speech synthesis.
pub fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

#[derive(Debug, Clone)]
struct Playback {
    message_id: String,
    // Held until the playback is replaced or stopped
    #[allow(dead_code)]
    audio: Arc<[u8]>,
}

#[derive(Debug, Default)]
pub struct SideEffectCoordinator {
    playback: Option<Playback>,
    capturing: bool,
}

impl SideEffectCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    pub fn playing_message(&self) -> Option<&str> {
        self.playback.as_ref().map(|p| p.message_id.as_str())
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Whether the input area may be enabled, ignoring any turn in flight.
    pub fn input_free(&self) -> bool {
        !self.is_playing() && !self.capturing
    }

    /// Start playing. Returns the id of the playback this replaced.
    pub fn begin_playback(&mut self, message_id: impl Into<String>, audio: Arc<[u8]>) -> Option<String> {
        let previous = self.playback.replace(Playback {
            message_id: message_id.into(),
            audio,
        });
        previous.map(|p| p.message_id)
    }

    /// Stop the current playback, releasing its audio. Returns its message id.
    pub fn end_playback(&mut self) -> Option<String> {
        self.playback.take().map(|p| p.message_id)
    }

    /// Start capturing speech. Returns `true` when an active capture was restarted.
    pub fn begin_capture(&mut self) -> Result<bool> {
        if self.is_playing() {
            return Err(Error::Busy(BUSY_SPEAKING.to_string()));
        }
        let restarted = self.capturing;
        self.capturing = true;
        Ok(restarted)
    }

    /// Returns `false` when nothing was being captured.
    pub fn end_capture(&mut self) -> bool {
        std::mem::replace(&mut self.capturing, false)
    }
}
