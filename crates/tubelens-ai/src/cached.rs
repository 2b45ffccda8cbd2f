//! Read-through completion cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use tubelens_http::HttpTransport;
use tubelens_models::ChatMessage;
use tubelens_storage::{cache_key, OfflineMode, TtlCache, TtlCacheExt};

use crate::error::CompletionError;
use crate::orchestrator::{Completion, CompletionOrchestrator};
use crate::registry::ProviderRegistry;

const CACHE_KIND: &str = "ai";
const CACHE_SOURCE: &str = "completion";

/// Cache in front of a [`CompletionOrchestrator`].
///
/// Identical conversations share one cache entry regardless of which
/// provider answered. Only successful completions are stored.
pub struct CachedCompletions<T> {
    orchestrator: CompletionOrchestrator<T>,
    cache: Arc<dyn TtlCache>,
    offline: Option<OfflineMode>,
    ttl_secs: u64,
}

impl<T: HttpTransport> CachedCompletions<T> {
    pub fn new(orchestrator: CompletionOrchestrator<T>, cache: Arc<dyn TtlCache>, ttl_secs: u64) -> Self {
        Self {
            orchestrator,
            cache,
            offline: None,
            ttl_secs,
        }
    }

    pub fn with_offline_mode(mut self, offline: OfflineMode) -> Self {
        self.offline = Some(offline);
        self
    }

    /// Cache key for a conversation.
    pub fn key_for(conversation: &[ChatMessage]) -> String {
        let mut params = BTreeMap::new();
        params.insert(
            "messages".to_string(),
            serde_json::to_string(conversation).unwrap_or_default(),
        );
        cache_key(CACHE_KIND, CACHE_SOURCE, &params)
    }

    pub async fn complete(
        &self,
        registry: &mut ProviderRegistry,
        conversation: &[ChatMessage],
    ) -> Result<Completion, CompletionError> {
        let key = Self::key_for(conversation);
        let offline = self.offline.as_ref().is_some_and(OfflineMode::is_offline);
        let ttl = if offline { 0 } else { self.ttl_secs };

        if let Some(cached) = self.cache.get_as::<Completion>(&key, ttl) {
            debug!(key = %key, provider = %cached.provider, "Completion served from cache");
            return Ok(cached);
        }
        if offline {
            debug!(key = %key, "Offline and not cached");
            return Err(CompletionError::Offline);
        }

        let completion = self.orchestrator.request(registry, conversation).await?;
        if let Err(e) = self.cache.set_as(&key, &completion) {
            warn!(key = %key, error = %e, "Failed to cache completion");
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tubelens_http::{HttpRequest, HttpResponse, HttpResult};
    use tubelens_models::ProviderDescriptor;
    use tubelens_storage::SqliteCache;

    use super::*;
    use crate::registry::DEFAULT_RESET_WINDOW;

    #[derive(Clone)]
    struct CountingTransport {
        calls: Arc<AtomicUsize>,
        status: u16,
    }

    #[async_trait]
    impl HttpTransport for CountingTransport {
        async fn send(&self, _request: HttpRequest) -> HttpResult<HttpResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let body = json!({"choices": [{"message": {"content": format!("answer {}", n)}}]});
            Ok(HttpResponse::new(self.status, body.to_string()))
        }
    }

    fn setup(status: u16) -> (CachedCompletions<CountingTransport>, Arc<AtomicUsize>, ProviderRegistry) {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = CountingTransport {
            calls: calls.clone(),
            status,
        };
        let cache: Arc<dyn TtlCache> = Arc::new(SqliteCache::in_memory().unwrap());
        let service = CachedCompletions::new(CompletionOrchestrator::new(transport), cache, 3600);
        let registry = ProviderRegistry::new(
            vec![ProviderDescriptor::new("p", "http://p.test", "k", "m", 1)],
            DEFAULT_RESET_WINDOW,
        );
        (service, calls, registry)
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let (service, calls, mut registry) = setup(200);
        let conversation = vec![ChatMessage::user("tags for this video?")];

        let first = service.complete(&mut registry, &conversation).await.unwrap();
        let second = service.complete(&mut registry, &conversation).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.content, "answer 1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        service
            .complete(&mut registry, &[ChatMessage::user("different")])
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (service, calls, mut registry) = setup(500);
        let conversation = vec![ChatMessage::user("q")];

        assert!(service.complete(&mut registry, &conversation).await.is_err());
        assert!(service.complete(&mut registry, &conversation).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_offline_miss_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let offline = OfflineMode::new(dir.path());
        offline.set_offline(true).unwrap();

        let (service, calls, mut registry) = setup(200);
        let service = service.with_offline_mode(offline);

        let err = service
            .complete(&mut registry, &[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(err.is_offline());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_key_is_stable() {
        let a = CachedCompletions::<CountingTransport>::key_for(&[ChatMessage::user("x")]);
        let b = CachedCompletions::<CountingTransport>::key_for(&[ChatMessage::user("x")]);
        let c = CachedCompletions::<CountingTransport>::key_for(&[ChatMessage::system("x")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("ai:"));
    }
}
