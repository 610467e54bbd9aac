//! # mikochat-core
//!
//! Core library for mikochat - a chat client for an assistant named Miko.
//!
//! This library provides:
//! - Message and session types, with the legacy on-disk record format
//! - Session persistence over a durable key-value store (SQLite)
//! - Response strategies: standard, realtime lookup and two-phase thinking
//! - Reply threading, image generation batches and image analysis
//! - A subscription-tier rate limiter for image generation
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! A turn flows through one [`ChatService`]:
//! - **Router:** picks a strategy and shapes the outbound request
//! - **History:** the reply or error is appended to the active conversation
//! - **Persistence:** the session collection is written through after every append
//! - **Events:** renderers subscribe and draw what changed
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mikochat_core::{build_services, ChatService, ChatSettings, Config, SqliteStore};
//!
//! # async fn run() -> mikochat_core::Result<()> {
//! let config = Config::load()?;
//! let store = Arc::new(SqliteStore::open(&Config::database_path(), config.storage.max_bytes)?);
//! let chat = ChatService::new(build_services(&config)?, ChatSettings::from(&config.chat), store);
//! chat.start();
//!
//! let answer = chat.send_message("What is the borrow checker?", false).await?;
//! println!("{}", answer.content);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use chat::{ChatService, ChatSettings, ImageOutcome};
pub use config::Config;
pub use entitlement::{Decision, DenialReason, EntitlementGate, PlanInfo, PlanStatus, Tier};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use imagegen::BatchOutcome;
pub use providers::build_services;
pub use services::{
    CompletionService, GeneratedImage, ImageGenerator, ImageRequest, Services, SpeechSynthesizer,
};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use types::*;

// Public modules
pub mod chat;
pub mod config;
pub mod effects;
pub mod entitlement;
pub mod error;
pub mod events;
pub mod history;
pub mod imagegen;
pub mod logging;
pub mod persistence;
pub mod prompts;
pub mod providers;
pub mod records;
pub mod reply;
pub mod router;
pub mod services;
pub mod store;
pub mod thinking;
pub mod types;
