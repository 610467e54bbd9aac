//! Durable key-value storage
//!
//! The session and entitlement layers persist through the [`KeyValueStore`]
//! trait. Writes are synchronous; callers never hold them across an await.
//! - [`SqliteStore`]: SQLite-backed store with embedded migrations
//! - [`MemoryStore`]: in-process store for tests and ephemeral runs
//!
//! Both honour an optional byte quota and report overruns as
//! [`crate::Error::StorageQuota`].

pub mod kv;
pub mod schema;

pub use kv::{KeyValueStore, MemoryStore, SqliteStore};

/// Key holding the serialized session collection.
pub const SESSIONS_KEY: &str = "chatSessions";

/// Key holding the active session index (decimal string, empty for none).
pub const ACTIVE_INDEX_KEY: &str = "currentSessionIndex";

/// Key holding the entitlement record.
pub const SUBSCRIPTION_KEY: &str = "subscription";
