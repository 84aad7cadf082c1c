//! Memoized blob reads

use tracing::debug;

use crate::cache::{BlobKey, ObservableCache, SharedStream};
use crate::fetch::FetchPipeline;
use crate::types::{BlobFile, BlobRequest};

/// Blob service
///
/// Every distinct [`BlobRequest`] maps to one cache entry, so a file viewer,
/// a hover provider and a breadcrumb asking for the same file at the same
/// commit share a single query.
#[derive(Clone)]
pub struct BlobService {
    pipeline: FetchPipeline,
    cache: ObservableCache<BlobKey, Option<BlobFile>>,
}

impl BlobService {
    pub fn new(pipeline: FetchPipeline) -> Self {
        Self {
            pipeline,
            cache: ObservableCache::new("blob"),
        }
    }

    /// Shared stream for `request`.
    ///
    /// Invalid requests fail immediately and leave no cache entry.
    pub fn fetch_blob(&self, request: &BlobRequest) -> SharedStream<Option<BlobFile>> {
        if let Err(error) = request.validate() {
            debug!(error = %error, "Rejected blob request");
            return SharedStream::failed(error);
        }

        let pipeline = self.pipeline.clone();
        let owned = request.clone();
        self.cache.get(BlobKey::from(request), move || async move {
            pipeline.fetch_blob(&owned).await
        })
    }

    /// Forget the cached answer for `request`.
    pub fn invalidate(&self, request: &BlobRequest) -> bool {
        self.cache.invalidate(&BlobKey::from(request))
    }

    pub fn cache(&self) -> &ObservableCache<BlobKey, Option<BlobFile>> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(transport: &Arc<ScriptedTransport>) -> BlobService {
        BlobService::new(FetchPipeline::new(transport.clone(), Duration::from_secs(5)))
    }

    fn found() -> serde_json::Value {
        json!({"repository": {"commit": {"file": {
            "content": "x",
            "richHTML": "",
            "highlight": {"aborted": false, "html": "x"}
        }}}})
    }

    #[tokio::test]
    async fn test_same_request_shares_one_query() {
        let transport = Arc::new(ScriptedTransport::with_delay(Duration::from_millis(10)));
        transport.respond_data("Blob", found());
        let blobs = service(&transport);
        let request = BlobRequest::new("repoA", "commit1", "path");

        let a = blobs.fetch_blob(&request);
        let b = blobs.fetch_blob(&request);
        let (a, b) = futures::join!(a.value(), b.value());

        assert_eq!(a, b);
        assert_eq!(a.unwrap().unwrap().content, "x");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_flag_is_a_separate_entry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_data("Blob", found());
        let blobs = service(&transport);
        let request = BlobRequest::new("repoA", "commit1", "path");

        blobs.fetch_blob(&request).value().await.unwrap();
        blobs
            .fetch_blob(&request.clone().with_disable_timeout(true))
            .value()
            .await
            .unwrap();

        assert_eq!(transport.call_count(), 2);
        assert_eq!(blobs.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_data("Blob", json!({"repository": {"commit": null}}));
        let blobs = service(&transport);
        let request = BlobRequest::new("repoA", "missing", "path");

        let err = blobs.fetch_blob(&request).value().await.unwrap_err();
        assert_eq!(err, FetchError::NotFound("Commit not found".to_string()));
        assert!(blobs.cache().is_empty());

        blobs.fetch_blob(&request).value().await.unwrap_err();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_fails_without_entry() {
        let transport = Arc::new(ScriptedTransport::new());
        let blobs = service(&transport);

        let err = blobs
            .fetch_blob(&BlobRequest::new("repoA", "commit1", ""))
            .value()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert!(blobs.cache().is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_data("Blob", found());
        let blobs = service(&transport);
        let request = BlobRequest::new("repoA", "commit1", "path");

        blobs.fetch_blob(&request).value().await.unwrap();
        assert!(blobs.invalidate(&request));
        blobs.fetch_blob(&request).value().await.unwrap();
        assert_eq!(transport.call_count(), 2);
    }
}
