//! Capability contracts the chat core calls out to.
//!
//! Every external service is an opaque request/response capability. HTTP
//! implementations live in [`crate::providers`]; tests supply scripted ones.

use crate::error::{Error, Result};
use crate::types::ChatMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Chat completion, also used for the realtime-data capability.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// One image generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Full prompt, style prefix included
    pub prompt: String,
    pub aspect_ratio: String,
    /// Position within the batch, starting at 0
    pub variant: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// The set of configured capabilities. Missing ones are `None`.
#[derive(Clone, Default)]
pub struct Services {
    pub completion: Option<Arc<dyn CompletionService>>,
    pub realtime: Option<Arc<dyn CompletionService>>,
    pub image: Option<Arc<dyn ImageGenerator>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Services {
    pub fn completion(&self) -> Result<&Arc<dyn CompletionService>> {
        self.completion
            .as_ref()
            .ok_or_else(|| Error::ServiceUnavailable("Chat service".to_string()))
    }

    pub fn realtime(&self) -> Result<&Arc<dyn CompletionService>> {
        self.realtime
            .as_ref()
            .ok_or_else(|| Error::ServiceUnavailable("Real-time search".to_string()))
    }

    pub fn image(&self) -> Result<&Arc<dyn ImageGenerator>> {
        self.image
            .as_ref()
            .ok_or_else(|| Error::ServiceUnavailable("Image generation service".to_string()))
    }

    pub fn speech(&self) -> Result<&Arc<dyn SpeechSynthesizer>> {
        self.speech
            .as_ref()
            .ok_or_else(|| Error::ServiceUnavailable("Text-to-speech".to_string()))
    }
}
