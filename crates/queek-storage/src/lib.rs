//! Token storage abstraction for the Queek client SDK.
//!
//! The session coordinator persists its access and refresh tokens through the
//! [`TokenStorage`] trait. Two implementations ship with this crate:
//! - [`MemoryStorage`]: process-local, the default
//! - [`FileStorage`]: a JSON map on disk, for CLIs and long-lived hosts

mod file;
mod keys;
mod memory;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::TokenStorage;

use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored data could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default storage backend (process memory).
pub fn default_storage() -> Arc<dyn TokenStorage> {
    Arc::new(MemoryStorage::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_storage_is_empty() {
        let storage = default_storage();
        assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap(), None);
        assert!(!storage.has(StorageKeys::REFRESH_TOKEN).unwrap());
    }

    #[test]
    fn test_io_error_converts() {
        let err: StorageError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }
}
