//! In-memory implementation of ContentStorage
//!
//! This implementation is primarily intended for testing and development purposes.

use crate::{ContentStorage, ContentStoreError, ContentStoreResult, DataReference};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

const DEFAULT_BASE: &str = "mem://admiral";

/// In-memory implementation of ContentStorage
///
/// All data is lost when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryContentStore {
    base: String,
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryContentStore {
    /// Create a new in-memory content store rooted at `mem://admiral`
    pub fn new() -> Self {
        Self::with_base(DEFAULT_BASE)
    }

    /// Create a store rooted at a custom base container
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored payloads
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// True when nothing has been written
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// All references currently stored, sorted
    pub async fn references(&self) -> Vec<DataReference> {
        let blobs = self.blobs.read().await;
        let mut keys: Vec<_> = blobs.keys().cloned().map(DataReference::new).collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStorage for InMemoryContentStore {
    fn base_container(&self) -> &str {
        &self.base
    }

    async fn write_opaque(&self, reference: &DataReference, payload: Vec<u8>) -> ContentStoreResult<()> {
        if reference.is_empty() {
            return Err(ContentStoreError::InvalidReference("empty reference".to_string()));
        }
        trace!(reference = %reference, size = payload.len(), "writing payload");
        self.blobs
            .write()
            .await
            .insert(reference.as_str().to_string(), payload);
        Ok(())
    }

    async fn read_opaque(&self, reference: &DataReference) -> ContentStoreResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| ContentStoreError::NotFound(reference.clone()))
    }

    async fn head(&self, reference: &DataReference) -> ContentStoreResult<Option<u64>> {
        Ok(self
            .blobs
            .read()
            .await
            .get(reference.as_str())
            .map(|payload| payload.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let store = InMemoryContentStore::new();
        let reference = store.construct_reference(&["metadata", "p", "d", "n", "inputs"]).unwrap();

        store.write_opaque(&reference, b"{}".to_vec()).await.unwrap();

        assert_eq!(store.read_opaque(&reference).await.unwrap(), b"{}".to_vec());
        assert_eq!(store.head(&reference).await.unwrap(), Some(2));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let store = InMemoryContentStore::new();
        let reference = DataReference::new("mem://admiral/a");

        store.write_opaque(&reference, vec![1]).await.unwrap();
        store.write_opaque(&reference, vec![1, 2, 3]).await.unwrap();

        assert_eq!(store.read_opaque(&reference).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(store.references().await, vec![reference]);
    }

    #[tokio::test]
    async fn test_missing_reference() {
        let store = InMemoryContentStore::new();
        let reference = DataReference::new("mem://admiral/missing");

        assert!(matches!(
            store.read_opaque(&reference).await,
            Err(ContentStoreError::NotFound(r)) if r == reference
        ));
        assert_eq!(store.head(&reference).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_reference_rejected() {
        let store = InMemoryContentStore::new();
        let result = store.write_opaque(&DataReference::default(), vec![]).await;
        assert!(matches!(result, Err(ContentStoreError::InvalidReference(_))));
    }
}
