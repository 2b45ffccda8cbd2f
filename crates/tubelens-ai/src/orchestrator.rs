//! Completion requests with provider failover.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use tubelens_http::{HttpRequest, HttpTransport};
use tubelens_models::{ChatMessage, ProviderDescriptor};

use crate::error::{AttemptError, CompletionError};
use crate::registry::ProviderRegistry;

/// Characters of an error body kept in [`AttemptError::Rejected`].
const ERROR_BODY_CHARS: usize = 200;

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    /// Name of the provider that answered
    pub provider: String,
}

/// Result of a single health-check call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub provider: String,
    pub model: String,
    pub success: bool,
    pub content: Option<String>,
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Sends conversations to providers chosen by a [`ProviderRegistry`].
#[derive(Debug, Clone)]
pub struct CompletionOrchestrator<T> {
    transport: T,
}

impl<T: HttpTransport> CompletionOrchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Ask providers for a completion until one answers.
    ///
    /// Makes at most one attempt per configured provider. A provider
    /// already tried in this call is not tried again. Per-attempt failures
    /// are recorded in `registry` and never returned directly; when every
    /// attempt fails the last one is carried in
    /// [`CompletionError::Exhausted`].
    pub async fn request(
        &self,
        registry: &mut ProviderRegistry,
        conversation: &[ChatMessage],
    ) -> Result<Completion, CompletionError> {
        let max_attempts = registry.len();
        let mut tried: Vec<String> = Vec::with_capacity(max_attempts);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let Some(provider) = registry.select_excluding(&tried) else {
                break;
            };

            match self.attempt(&provider, conversation).await {
                Ok(content) => {
                    info!(provider = %provider.name, attempt = attempt, "Completion succeeded");
                    metrics::counter!(
                        "tubelens_ai_requests_total",
                        "provider" => provider.name.clone(),
                        "outcome" => "success"
                    )
                    .increment(1);
                    registry.record_success(&provider.name);
                    return Ok(Completion {
                        content,
                        provider: provider.name,
                    });
                }
                Err(e) => {
                    warn!(
                        provider = %provider.name,
                        attempt = attempt,
                        error = %e,
                        "Completion attempt failed"
                    );
                    metrics::counter!(
                        "tubelens_ai_requests_total",
                        "provider" => provider.name.clone(),
                        "outcome" => e.kind()
                    )
                    .increment(1);
                    registry.record_failure(&provider.name);
                    tried.push(provider.name);
                    last_error = Some(e);
                }
            }
        }

        if tried.is_empty() {
            return Err(CompletionError::NoProviders);
        }

        Err(CompletionError::Exhausted {
            attempts: tried.len(),
            last_error,
        })
    }

    /// Call one provider directly, leaving breaker state untouched.
    pub async fn probe(
        &self,
        provider: &ProviderDescriptor,
        conversation: &[ChatMessage],
    ) -> ProbeReport {
        let started = Instant::now();
        let outcome = self.attempt(provider, conversation).await;
        let latency = started.elapsed();

        let (success, content, error) = match outcome {
            Ok(content) => (true, Some(content), None),
            Err(e) => (false, None, Some(e.to_string())),
        };
        ProbeReport {
            provider: provider.name.clone(),
            model: provider.model.clone(),
            success,
            content,
            error,
            latency,
        }
    }

    /// Probe every provider in priority order.
    pub async fn probe_all(
        &self,
        registry: &ProviderRegistry,
        conversation: &[ChatMessage],
    ) -> Vec<ProbeReport> {
        let mut reports = Vec::with_capacity(registry.len());
        for provider in registry.providers() {
            reports.push(self.probe(provider, conversation).await);
        }
        reports
    }

    async fn attempt(
        &self,
        provider: &ProviderDescriptor,
        conversation: &[ChatMessage],
    ) -> Result<String, AttemptError> {
        let payload = ChatCompletionRequest {
            model: &provider.model,
            messages: conversation,
            stream: false,
        };
        let request = HttpRequest::post_json(&provider.endpoint, &payload)?
            .header("Authorization", format!("Bearer {}", provider.api_key))
            .timeout(provider.timeout());

        let response = self.transport.send(request).await?;

        if response.status >= 400 {
            return Err(AttemptError::rejected(
                response.status,
                response.body_excerpt(ERROR_BODY_CHARS),
            ));
        }

        let body: Value = response.json().map_err(|_| AttemptError::Malformed)?;
        extract_content(&body).ok_or(AttemptError::Empty)
    }
}

/// `choices[0].message.content`, if present and non-blank.
fn extract_content(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use tubelens_http::{HttpError, HttpResponse, HttpResult};

    use super::*;
    use crate::registry::{ProviderStatus, DEFAULT_RESET_WINDOW};

    /// Replays scripted outcomes and records every request.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        outcomes: Arc<Mutex<VecDeque<HttpResult<HttpResponse>>>>,
        requests: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<HttpResult<HttpResponse>>) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.into())),
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::network("no scripted response")))
        }
    }

    fn answer(content: &str) -> HttpResult<HttpResponse> {
        Ok(HttpResponse::new(
            200,
            json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
                .to_string(),
        ))
    }

    fn providers(n: usize) -> Vec<ProviderDescriptor> {
        (1..=n)
            .map(|i| {
                ProviderDescriptor::new(
                    format!("provider{}", i),
                    format!("http://p{}.test/v1/chat/completions", i),
                    format!("key{}", i),
                    format!("model{}", i),
                    i as i32,
                )
            })
            .collect()
    }

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You analyze video metadata."),
            ChatMessage::user("Summarize this title."),
        ]
    }

    #[tokio::test]
    async fn test_fails_over_to_third_provider() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(500, "boom")),
            Err(HttpError::Timeout(60_000)),
            answer("summary"),
        ]);
        let orchestrator = CompletionOrchestrator::new(transport.clone());
        let mut registry = ProviderRegistry::new(providers(3), DEFAULT_RESET_WINDOW);

        let completion = orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap();

        assert_eq!(completion.provider, "provider3");
        assert_eq!(completion.content, "summary");

        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://p1.test/v1/chat/completions",
                "http://p2.test/v1/chat/completions",
                "http://p3.test/v1/chat/completions",
            ]
        );
        assert_eq!(registry.state().get("provider1").unwrap().failure_count, 1);
        assert_eq!(registry.state().get("provider3").unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn test_no_providers_makes_no_call() {
        let transport = ScriptedTransport::new(vec![answer("unused")]);
        let orchestrator = CompletionOrchestrator::new(transport.clone());
        let mut registry = ProviderRegistry::new(vec![], DEFAULT_RESET_WINDOW);

        let err = orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap_err();

        assert_eq!(err, CompletionError::NoProviders);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(200, "<html>not json</html>")),
            Ok(HttpResponse::new(200, r#"{"choices": []}"#)),
        ]);
        let orchestrator = CompletionOrchestrator::new(transport.clone());
        let mut registry = ProviderRegistry::new(providers(2), DEFAULT_RESET_WINDOW);

        let err = orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CompletionError::Exhausted {
                attempts: 2,
                last_error: Some(AttemptError::Empty),
            }
        );
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_payload_and_auth() {
        let transport = ScriptedTransport::new(vec![answer("ok")]);
        let orchestrator = CompletionOrchestrator::new(transport.clone());
        let mut registry = ProviderRegistry::new(
            vec![providers(1)
                .remove(0)
                .with_timeout(Duration::from_secs(7))],
            DEFAULT_RESET_WINDOW,
        );

        orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer key1"));
        assert_eq!(request.timeout, Duration::from_secs(7));

        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["model"], "model1");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Summarize this title.");
    }

    #[tokio::test]
    async fn test_rejection_keeps_body_excerpt() {
        let long_body = "x".repeat(500);
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(429, long_body))]);
        let orchestrator = CompletionOrchestrator::new(transport);
        let mut registry = ProviderRegistry::new(providers(1), DEFAULT_RESET_WINDOW);

        let err = orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap_err();

        match err {
            CompletionError::Exhausted {
                last_error: Some(AttemptError::Rejected { status, body }),
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(body.len(), 200);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_failures_throttle_across_requests() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(502, "")),
            answer("from two"),
            answer("still two"),
        ]);
        let orchestrator = CompletionOrchestrator::new(transport.clone());
        let mut providers = providers(2);
        providers[0].error_threshold = 1;
        let mut registry = ProviderRegistry::new(providers, DEFAULT_RESET_WINDOW);

        let first = orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap();
        assert_eq!(first.provider, "provider2");
        assert_eq!(
            registry.state().get("provider1").unwrap().status,
            ProviderStatus::Throttled
        );

        // Throttled provider is skipped outright on the next request
        let second = orchestrator
            .request(&mut registry, &conversation())
            .await
            .unwrap();
        assert_eq!(second.provider, "provider2");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_probe_does_not_touch_breaker() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(401, "bad key")), answer("pong")]);
        let orchestrator = CompletionOrchestrator::new(transport);
        let registry = ProviderRegistry::new(providers(2), DEFAULT_RESET_WINDOW);

        let reports = orchestrator.probe_all(&registry, &conversation()).await;

        assert_eq!(reports.len(), 2);
        assert!(!reports[0].success);
        assert_eq!(reports[0].error.as_deref(), Some("HTTP 401: bad key"));
        assert!(reports[1].success);
        assert_eq!(reports[1].content.as_deref(), Some("pong"));
        assert!(registry.state().0.is_empty());
    }

    #[test]
    fn test_extract_content() {
        assert_eq!(
            extract_content(&json!({"choices": [{"message": {"content": "hi"}}]})),
            Some("hi".to_string())
        );
        assert_eq!(
            extract_content(&json!({"choices": [{"message": {"content": "  "}}]})),
            None
        );
        assert_eq!(extract_content(&json!([1, 2])), None);
    }
}
