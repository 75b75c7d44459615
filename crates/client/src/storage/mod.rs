//! Durable client-side key-value storage.
//!
//! Both stores persist through the [`KeyValueStore`] port so their logic can
//! be exercised against [`MemoryStore`] in tests and against [`FileStore`] on
//! a real machine. Each store only ever writes its own keys.
//!
//! Absence of a key is a valid empty state, never an error.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Storage keys.
pub mod keys {
    /// Access token (raw string).
    pub const TOKEN: &str = "token";

    /// Refresh token (raw string).
    pub const REFRESH_TOKEN: &str = "refreshToken";

    /// Signed-in user profile (JSON object).
    pub const USER: &str = "user";

    /// Wishlist entries (JSON array).
    pub const WISHLIST: &str = "wishlist";
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing medium could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key holds a value that is not valid JSON for its type.
    #[error("corrupt value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage.
    #[error("cannot serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and deserialize a JSON value.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` if the stored text is not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Serialize and write a JSON value.
///
/// # Errors
///
/// Returns `StorageError` if serialization or the write fails.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}
