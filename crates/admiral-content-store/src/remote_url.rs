//! Data-access URLs for offloaded payloads.

use crate::{ContentStorage, ContentStoreError, ContentStoreResult, DataReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Location and size of a payload handed back to clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlBlob {
    /// URL the client can fetch the payload from
    pub url: String,
    /// Payload size in bytes
    pub bytes: u64,
}

/// Turns stored references into client-facing URLs
#[async_trait]
pub trait RemoteUrl: Send + Sync {
    /// Resolve a reference
    async fn get(&self, uri: &str) -> ContentStoreResult<UrlBlob>;
}

/// Returns the reference itself as the URL, sized through the backing store.
pub struct InlineRemoteUrl {
    store: Arc<dyn ContentStorage>,
}

impl InlineRemoteUrl {
    /// Create a resolver over a content store
    pub fn new(store: Arc<dyn ContentStorage>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RemoteUrl for InlineRemoteUrl {
    async fn get(&self, uri: &str) -> ContentStoreResult<UrlBlob> {
        let reference = DataReference::new(uri);
        match self.store.head(&reference).await? {
            Some(bytes) => Ok(UrlBlob {
                url: uri.to_string(),
                bytes,
            }),
            None => Err(ContentStoreError::NotFound(reference)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryContentStore;

    #[tokio::test]
    async fn test_resolves_existing_payload() {
        let store = Arc::new(InMemoryContentStore::new());
        let reference = DataReference::new("mem://admiral/metadata/p/d/n/inputs");
        store.write_opaque(&reference, vec![0; 42]).await.unwrap();

        let resolver = InlineRemoteUrl::new(store);
        let blob = resolver.get(reference.as_str()).await.unwrap();

        assert_eq!(
            blob,
            UrlBlob {
                url: reference.into_string(),
                bytes: 42
            }
        );
    }

    #[tokio::test]
    async fn test_missing_payload_is_not_found() {
        let resolver = InlineRemoteUrl::new(Arc::new(InMemoryContentStore::new()));
        assert!(matches!(
            resolver.get("mem://admiral/nothing").await,
            Err(ContentStoreError::NotFound(_))
        ));
    }
}
