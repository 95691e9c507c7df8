//! Object storage backends.
//!
//! The extractor reads source PDFs and writes images through [`ObjectStore`];
//! which service sits behind it is a deployment choice.

mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
pub use memory::{MemoryStore, StoredObject};
#[cfg(feature = "s3")]
pub use s3::S3Store;

use async_trait::async_trait;

use crate::error::StorageError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Read/write access to buckets of named objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether a bucket exists and is reachable.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Fetch the full content of an object.
    ///
    /// A missing object is reported as [`StorageError::ObjectNotFound`].
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Store `data` under `key`, declaring its content type.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// Where extracted images are written: a bucket plus a key prefix.
pub struct OutputTarget<'a> {
    pub store: &'a dyn ObjectStore,
    pub bucket: &'a str,
    pub dir: &'a str,
}

impl<'a> OutputTarget<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str, dir: &'a str) -> Self {
        Self { store, bucket, dir }
    }
}
