//! Session persistence.
//!
//! An interview can be resumed after the process exits: the console saves the
//! [`Session`] after every action and loads the most recent one on start.

mod sqlite;

pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::interview::Session;

/// Storage seam for interview sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session by ID.
    async fn load(&self, id: &str) -> StorageResult<Option<Session>>;

    /// Insert or replace a session.
    async fn save(&self, session: &Session) -> StorageResult<()>;

    /// Delete a session by ID. Deleting a missing session is not an error.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    /// The most recently updated session, if any.
    async fn latest(&self) -> StorageResult<Option<Session>>;
}
