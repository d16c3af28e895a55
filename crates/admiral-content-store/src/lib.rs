//! Admiral Content Store
//!
//! Provides the abstraction used to offload large payloads (input literal maps,
//! outputs) out of execution records. Payloads are opaque bytes written under
//! hierarchical, deterministic references; only the reference is persisted
//! with the record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use thiserror::Error;

pub mod memory;
pub mod remote_url;

pub use memory::InMemoryContentStore;
pub use remote_url::{InlineRemoteUrl, RemoteUrl, UrlBlob};

/// Separator between reference segments.
pub const REFERENCE_SEPARATOR: char = '/';

/// Reference to an offloaded payload, e.g. `mem://admiral/metadata/p/d/n/inputs`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataReference(String);

impl DataReference {
    /// Wrap an existing reference string
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the string representation of the reference
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the reference was never assigned
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for DataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DataReference {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DataReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Errors that can occur during content store operations
#[derive(Error, Debug)]
pub enum ContentStoreError {
    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),

    #[error("Content not found for reference: {0}")]
    NotFound(DataReference),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

/// Result type for content store operations
pub type ContentStoreResult<T> = Result<T, ContentStoreError>;

/// Storage for opaque payloads addressed by [`DataReference`].
#[async_trait]
pub trait ContentStorage: Send + Sync + Debug {
    /// Root under which every reference produced by this store lives
    fn base_container(&self) -> &str;

    /// Build a deterministic reference below the base container.
    ///
    /// Segments must be non-empty and must not contain the separator, so that
    /// two distinct segment lists can never map to the same reference.
    fn construct_reference(&self, segments: &[&str]) -> ContentStoreResult<DataReference> {
        let mut reference = self.base_container().trim_end_matches(REFERENCE_SEPARATOR).to_string();
        for segment in segments {
            if segment.is_empty() || segment.contains(REFERENCE_SEPARATOR) {
                return Err(ContentStoreError::InvalidReference(format!(
                    "invalid reference segment [{}] in {:?}",
                    segment, segments
                )));
            }
            reference.push(REFERENCE_SEPARATOR);
            reference.push_str(segment);
        }
        Ok(DataReference(reference))
    }

    /// Write a payload, replacing anything previously stored at the reference
    async fn write_opaque(&self, reference: &DataReference, payload: Vec<u8>) -> ContentStoreResult<()>;

    /// Read a payload; `NotFound` when nothing was written at the reference
    async fn read_opaque(&self, reference: &DataReference) -> ContentStoreResult<Vec<u8>>;

    /// Size in bytes of the payload at the reference, if present
    async fn head(&self, reference: &DataReference) -> ContentStoreResult<Option<u64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_reference() {
        let store = InMemoryContentStore::with_base("s3://bucket/");
        let reference = store
            .construct_reference(&["metadata", "p", "d", "n", "inputs"])
            .unwrap();
        assert_eq!(reference.as_str(), "s3://bucket/metadata/p/d/n/inputs");
    }

    #[test]
    fn test_construct_reference_rejects_bad_segments() {
        let store = InMemoryContentStore::new();
        assert!(matches!(
            store.construct_reference(&["metadata", ""]),
            Err(ContentStoreError::InvalidReference(_))
        ));
        assert!(matches!(
            store.construct_reference(&["metadata", "a/b"]),
            Err(ContentStoreError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_data_reference_serializes_as_string() {
        let reference = DataReference::new("mem://admiral/x");
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, "\"mem://admiral/x\"");
    }
}
