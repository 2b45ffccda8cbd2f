//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use tubelens_ai::{CachedCompletions, CompletionOrchestrator, ProviderRegistry};
use tubelens_http::{HttpTransport, ReqwestTransport};
use tubelens_models::{ChatMessage, VideoId};
use tubelens_transcript::{TranscriptChain, TranscriptError, TranscriptService};

use crate::config::{AppConfig, SessionStore};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn transport(config: &AppConfig) -> Result<ReqwestTransport> {
    ReqwestTransport::new(config.http.clone()).context("Failed to build HTTP client")
}

/// Registry restored from the persisted session, plus its store.
fn session_registry(config: &AppConfig) -> (ProviderRegistry, SessionStore) {
    let offline = config.offline_mode();
    let store = SessionStore::new(offline.storage_dir());
    let registry = config.ai.registry().with_state(store.load());
    (registry, store)
}

pub async fn providers(config: &AppConfig, probe: bool, message: &str, json: bool) -> Result<()> {
    let (registry, _store) = session_registry(config);

    if probe {
        let orchestrator = CompletionOrchestrator::new(transport(config)?);
        let reports = orchestrator
            .probe_all(&registry, &[ChatMessage::user(message)])
            .await;
        if json {
            return print_json(&reports);
        }
        for report in &reports {
            let outcome = match (&report.content, &report.error) {
                (Some(content), _) => format!("OK    {}", content.trim()),
                (None, Some(error)) => format!("FAIL  {}", error),
                (None, None) => "FAIL".to_string(),
            };
            println!(
                "{:<20} {:<24} {:>7} ms  {}",
                report.provider,
                report.model,
                report.latency.as_millis(),
                outcome
            );
        }
        return Ok(());
    }

    let status = registry.status();
    if json {
        return print_json(&status);
    }
    if status.is_empty() {
        println!("No AI providers configured");
    }
    for row in &status {
        println!(
            "{:<20} priority {:<3} {:<10} failures {}/{}",
            row.name,
            row.priority,
            format!("{:?}", row.status).to_lowercase(),
            row.failure_count,
            row.error_threshold
        );
    }
    Ok(())
}

pub async fn complete(
    config: &AppConfig,
    prompt: &str,
    system: Option<&str>,
    no_cache: bool,
    json: bool,
) -> Result<()> {
    let (mut registry, store) = session_registry(config);
    let orchestrator = CompletionOrchestrator::new(transport(config)?);

    let mut conversation = Vec::with_capacity(2);
    if let Some(system) = system {
        conversation.push(ChatMessage::system(system));
    }
    conversation.push(ChatMessage::user(prompt));

    let result = if no_cache {
        orchestrator.request(&mut registry, &conversation).await
    } else {
        let service = CachedCompletions::new(orchestrator, config.cache()?, config.cache.ttl_secs)
            .with_offline_mode(config.offline_mode());
        service.complete(&mut registry, &conversation).await
    };

    if let Err(e) = store.save(registry.state()) {
        warn!(error = %e, "Failed to persist provider breaker state");
    }

    let completion = result.context("Completion failed")?;
    info!(provider = %completion.provider, "Completion received");
    if json {
        return print_json(&completion);
    }
    println!("{}", completion.content);
    Ok(())
}

pub async fn transcript(
    config: &AppConfig,
    video: &str,
    langs: &[String],
    no_cache: bool,
    json: bool,
) -> Result<()> {
    let video = VideoId::parse(video)?;
    let transport: Arc<dyn HttpTransport> = Arc::new(transport(config)?);
    let chain = TranscriptChain::new(transport, &config.transcript);

    let result = if no_cache {
        chain.get_transcript(&video, langs).await
    } else {
        TranscriptService::new(chain, config.cache()?, config.cache.ttl_secs)
            .with_offline_mode(config.offline_mode())
            .get_transcript(&video, langs)
            .await
    };

    let transcript = match result {
        Ok(transcript) => transcript,
        Err(TranscriptError::NotAvailable) => {
            println!("No transcript available for {}", video);
            return Ok(());
        }
        Err(e) => return Err(e).context("Transcript acquisition failed"),
    };

    if json {
        return print_json(&transcript);
    }
    println!(
        "# {} ({}, {} segments, via {})",
        video,
        transcript.lang,
        transcript.segments.len(),
        transcript.provider
    );
    println!("{}", transcript.text);
    Ok(())
}

#[derive(Serialize)]
struct OfflineStatus<'a> {
    offline: bool,
    storage_dir: &'a std::path::Path,
}

pub fn offline(config: &AppConfig, set: Option<bool>, json: bool) -> Result<()> {
    let mode = config.offline_mode();
    if let Some(on) = set {
        mode.set_offline(on).context("Failed to update offline mode")?;
    }

    let status = OfflineStatus {
        offline: mode.is_offline(),
        storage_dir: mode.storage_dir(),
    };
    if json {
        return print_json(&status);
    }
    println!(
        "Offline mode: {} ({})",
        if status.offline { "on" } else { "off" },
        status.storage_dir.display()
    );
    Ok(())
}

fn require_sqlite(config: &AppConfig) -> Result<tubelens_storage::SqliteCache> {
    match config.sqlite_cache()? {
        Some(cache) => Ok(cache),
        None => bail!("Cache maintenance needs the SQLite cache; set CACHE_DB_PATH"),
    }
}

pub fn cache_stats(config: &AppConfig, json: bool) -> Result<()> {
    let stats = require_sqlite(config)?.stats()?;
    if json {
        return print_json(&stats);
    }
    println!("Entries: {}", stats.total_entries);
    println!("Expired: {}", stats.expired_entries);
    println!("Hits:    {}", stats.total_hits);
    for (key, hits) in &stats.top_hits {
        println!("  {:>6}  {}", hits, key);
    }
    Ok(())
}

pub fn cache_cleanup(config: &AppConfig) -> Result<()> {
    let deleted = require_sqlite(config)?.cleanup_expired()?;
    println!("Removed {} expired entries", deleted);
    Ok(())
}

pub fn cache_clear(config: &AppConfig) -> Result<()> {
    let deleted = require_sqlite(config)?.clear_all()?;
    println!("Removed {} entries", deleted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tubelens_ai::AiConfig;
    use tubelens_http::HttpClientConfig;
    use tubelens_models::ProviderDescriptor;
    use tubelens_transcript::TranscriptConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::CacheConfig;

    #[tokio::test]
    async fn test_complete_survives_unwritable_breaker_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let storage_dir = dir.path().join("storage");
        // A directory where the state file should go makes the write fail
        std::fs::create_dir_all(storage_dir.join("breaker_state.json")).unwrap();

        let config = AppConfig {
            http: HttpClientConfig::default(),
            ai: AiConfig {
                providers: vec![ProviderDescriptor::new(
                    "primary",
                    format!("{}/v1/chat/completions", server.uri()),
                    "key",
                    "model",
                    1,
                )],
                error_reset_window: Duration::from_secs(300),
            },
            transcript: TranscriptConfig::default(),
            cache: CacheConfig {
                dir: dir.path().join("cache"),
                storage_dir,
                ..CacheConfig::default()
            },
        };

        complete(&config, "hello", None, true, false).await.unwrap();
    }
}
