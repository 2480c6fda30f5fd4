//! Blob storage collaborator.

use async_trait::async_trait;

use crate::error::StorageError;

pub mod filesystem;

pub use filesystem::FileBlobStore;

/// Opaque reference to a stored object, as returned by [`BlobStore::put`].
pub type StorageRef = String;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key` and returns where they ended up.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<StorageRef, StorageError>;
}
