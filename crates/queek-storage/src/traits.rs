//! Storage trait definitions.

use crate::StorageResult;

/// Key/value backend for persisted session tokens.
///
/// Implementations must be safe to share across tasks; the session
/// coordinator calls them from whichever task completes a login or refresh.
pub trait TokenStorage: Send + Sync {
    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Returns whether anything was removed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
