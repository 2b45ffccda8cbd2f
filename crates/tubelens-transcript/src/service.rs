//! Read-through transcript cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use tubelens_models::{Transcript, VideoId};
use tubelens_storage::{cache_key, OfflineMode, TtlCache, TtlCacheExt};

use crate::chain::{candidate_langs, TranscriptChain};
use crate::error::{TranscriptError, TranscriptResult};

const CACHE_KIND: &str = "transcript";
const CACHE_SOURCE: &str = "chain";

/// Cache in front of a [`TranscriptChain`]. Only transcripts that were
/// found are stored; "not available" is always re-checked.
pub struct TranscriptService {
    chain: TranscriptChain,
    cache: Arc<dyn TtlCache>,
    offline: Option<OfflineMode>,
    ttl_secs: u64,
}

impl TranscriptService {
    pub fn new(chain: TranscriptChain, cache: Arc<dyn TtlCache>, ttl_secs: u64) -> Self {
        Self {
            chain,
            cache,
            offline: None,
            ttl_secs,
        }
    }

    pub fn with_offline_mode(mut self, offline: OfflineMode) -> Self {
        self.offline = Some(offline);
        self
    }

    /// Cache key for a video and language order.
    pub fn key_for(video: &VideoId, preferred_langs: &[String]) -> String {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), video.as_str().to_string());
        params.insert("langs".to_string(), candidate_langs(preferred_langs).join(","));
        cache_key(CACHE_KIND, CACHE_SOURCE, &params)
    }

    pub async fn get_transcript(
        &self,
        video: &VideoId,
        preferred_langs: &[String],
    ) -> TranscriptResult<Transcript> {
        let key = Self::key_for(video, preferred_langs);
        let offline = self.offline.as_ref().is_some_and(OfflineMode::is_offline);
        let ttl = if offline { 0 } else { self.ttl_secs };

        if let Some(cached) = self.cache.get_as::<Transcript>(&key, ttl) {
            debug!(video_id = %video, provider = %cached.provider, "Transcript served from cache");
            return Ok(cached);
        }
        if offline {
            debug!(video_id = %video, "Offline and not cached");
            return Err(TranscriptError::Offline);
        }

        let transcript = self.chain.get_transcript(video, preferred_langs).await?;
        if let Err(e) = self.cache.set_as(&key, &transcript) {
            warn!(video_id = %video, error = %e, "Failed to cache transcript");
        }
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tubelens_models::{TranscriptProvider, TranscriptSegment};
    use tubelens_storage::FileCache;

    use super::*;
    use crate::sources::{SourceOutcome, TranscriptSource};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        found: bool,
    }

    #[async_trait]
    impl TranscriptSource for CountingSource {
        fn provider(&self) -> TranscriptProvider {
            TranscriptProvider::PrimaryApi
        }

        async fn fetch(&self, _video: &VideoId, langs: &[String]) -> SourceOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.found {
                return SourceOutcome::Empty;
            }
            SourceOutcome::Found(Transcript::from_segments(
                langs[0].clone(),
                vec![TranscriptSegment {
                    start: 1.0,
                    duration: None,
                    text: "merhaba".to_string(),
                    lang: langs[0].clone(),
                }],
                self.provider(),
            ))
        }
    }

    fn service(found: bool) -> (tempfile::TempDir, TranscriptService, Arc<AtomicUsize>) {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = TranscriptChain::with_sources(vec![Box::new(CountingSource {
            calls: calls.clone(),
            found,
        })]);
        let cache: Arc<dyn TtlCache> = Arc::new(FileCache::new(dir.path().join("cache")).unwrap());
        (dir, TranscriptService::new(chain, cache, 3600), calls)
    }

    fn video() -> VideoId {
        VideoId::parse("https://youtu.be/dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_found_transcript_is_cached() {
        let (_dir, service, calls) = service(true);
        let langs = vec!["tr".to_string()];

        let first = service.get_transcript(&video(), &langs).await.unwrap();
        let second = service.get_transcript(&video(), &langs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.lang, "tr");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Different language order is a different request
        service
            .get_transcript(&video(), &["en".to_string()])
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_available_is_not_cached() {
        let (_dir, service, calls) = service(false);
        for _ in 0..2 {
            let err = service.get_transcript(&video(), &[]).await.unwrap_err();
            assert!(err.is_not_available());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_offline_serves_cache_and_never_fetches() {
        let (dir, service, calls) = service(true);
        let offline = OfflineMode::new(dir.path().join("storage"));
        let service = service.with_offline_mode(offline.clone());
        let langs = vec!["tr".to_string()];

        service.get_transcript(&video(), &langs).await.unwrap();
        offline.set_offline(true).unwrap();

        assert!(service.get_transcript(&video(), &langs).await.is_ok());
        let err = service
            .get_transcript(&video(), &["de".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, TranscriptError::Offline);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_key_normalizes_languages() {
        let video = video();
        assert_eq!(
            TranscriptService::key_for(&video, &[]),
            TranscriptService::key_for(&video, &["en".to_string()])
        );
        assert_ne!(
            TranscriptService::key_for(&video, &["tr".to_string(), "en".to_string()]),
            TranscriptService::key_for(&video, &["en".to_string(), "tr".to_string()])
        );
    }
}
