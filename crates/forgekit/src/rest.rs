//! Request plumbing shared by every backend.
//!
//! [`RequestGate`] applies pacing, the per-request timeout and the caller's
//! [`CancelToken`] to any request future, whichever client produced it. The
//! SDK-backed backends wrap their calls in it directly.
//!
//! [`RestClient`] is the transport-based JSON client used where no SDK exists.
//! It owns the transport, the base URL and the auth headers, and turns HTTP
//! status codes into [`ProviderError`] kinds, so backends only deal with paths
//! and wire types.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, header_get};
use crate::platform::{ApiRateLimiter, ProviderError, Result};
use crate::reconcile::CancelToken;

/// Percent-encode one path segment (GitLab project paths, branch names).
pub fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Build a `?k=v&...` query string. Empty when `params` is empty.
pub fn query(params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    format!("?{}", serializer.finish())
}

/// Pacing, timeout and cancellation around single requests.
#[derive(Debug, Clone)]
pub struct RequestGate {
    provider: &'static str,
    rate_limiter: Option<ApiRateLimiter>,
    timeout: Option<Duration>,
}

impl RequestGate {
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            rate_limiter: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Option<ApiRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Fail requests that take longer than `timeout`. Clients whose
    /// transport already enforces one leave this unset.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Run one request: wait for a rate-limit permit, then race `request`
    /// against `cancel` and the timeout. Nothing is sent once `cancel` fired.
    pub async fn send<T, F>(
        &self,
        cancel: &CancelToken,
        method: &str,
        path: &str,
        request: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        cancel.check()?;
        if let Some(limiter) = &self.rate_limiter {
            cancel
                .run(async {
                    limiter.wait().await;
                    Ok(())
                })
                .await?;
        }

        tracing::debug!(provider = self.provider, method, path, "Request");

        let result = cancel
            .run(async {
                match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                        ProviderError::transport(format!(
                            "no response within {}s",
                            limit.as_secs()
                        ))
                    })?,
                    None => request.await,
                }
            })
            .await;

        if let Err(err) = &result {
            tracing::debug!(
                provider = self.provider,
                method,
                path,
                "Request failed: {err}"
            );
        }
        result
    }
}

#[derive(Clone)]
pub struct RestClient {
    gate: RequestGate,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    headers: HttpHeaders,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("provider", &self.gate.provider())
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(
        provider: &'static str,
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            gate: RequestGate::new(provider),
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
        }
    }

    /// Set a header sent with every request, replacing any earlier value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Option<ApiRateLimiter>) -> Self {
        self.gate = self.gate.with_rate_limiter(limiter);
        self
    }

    #[inline]
    pub fn provider(&self) -> &'static str {
        self.gate.provider()
    }

    /// Send one request and classify the response status.
    ///
    /// Success responses are returned as-is; everything else becomes an error.
    pub async fn execute(
        &self,
        cancel: &CancelToken,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, format!("{}{}", self.base_url, path));
        request.headers.extend(self.headers.iter().cloned());
        if let Some(body) = body {
            request.body = body;
            request
                .headers
                .push(("Content-Type".to_string(), "application/json".to_string()));
        }

        self.gate
            .send(cancel, method.as_str(), path, async {
                let response = self
                    .transport
                    .send(request)
                    .await
                    .map_err(|e| ProviderError::transport(e.to_string()))?;
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(classify_status(path, &response))
                }
            })
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, cancel: &CancelToken, path: &str) -> Result<T> {
        let response = self.execute(cancel, HttpMethod::Get, path, None).await?;
        decode(&response)
    }

    /// GET where 404 or an empty body means "nothing there".
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
        path: &str,
    ) -> Result<Option<T>> {
        match self.execute(cancel, HttpMethod::Get, path, None).await {
            Ok(response) if response.body.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(response) => decode(&response).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post<B, T>(&self, cancel: &CancelToken, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(cancel, HttpMethod::Post, path, Some(encode(body)?))
            .await?;
        decode(&response)
    }

    pub async fn put<B, T>(&self, cancel: &CancelToken, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(cancel, HttpMethod::Put, path, Some(encode(body)?))
            .await?;
        decode(&response)
    }

    /// Send a request whose response body is ignored.
    pub async fn send_ignoring_body<B>(
        &self,
        cancel: &CancelToken,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let body = body.map(encode).transpose()?;
        self.execute(cancel, method, path, body).await?;
        Ok(())
    }

    pub async fn delete(&self, cancel: &CancelToken, path: &str) -> Result<()> {
        self.execute(cancel, HttpMethod::Delete, path, None).await?;
        Ok(())
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body)
        .map_err(|e| ProviderError::invalid_info(format!("cannot encode request body: {e}")))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        ProviderError::api(response.status, format!("cannot decode response body: {e}"))
    })
}

/// Map a non-success response onto the error taxonomy.
fn classify_status(path: &str, response: &HttpResponse) -> ProviderError {
    match response.status {
        404 => ProviderError::not_found(path),
        401 => ProviderError::AuthRequired,
        403 if header_get(&response.headers, "x-ratelimit-remaining") == Some("0") => {
            ProviderError::RateLimited {
                reset_at: reset_at(&response.headers),
            }
        }
        403 => ProviderError::AuthRequired,
        429 => ProviderError::RateLimited {
            reset_at: reset_at(&response.headers),
        },
        status => ProviderError::api(status, error_message(&response.body)),
    }
}

/// Reset time from `X-RateLimit-Reset` (epoch seconds) or `Retry-After`.
fn reset_at(headers: &HttpHeaders) -> Option<DateTime<Utc>> {
    if let Some(epoch) = header_get(headers, "x-ratelimit-reset").and_then(|v| v.parse().ok()) {
        return DateTime::from_timestamp(epoch, 0);
    }
    let secs: i64 = header_get(headers, "retry-after")?.parse().ok()?;
    Some(Utc::now() + chrono::Duration::seconds(secs))
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"message": ..}`, `{"error": ..}` and Stash's
/// `{"errors": [{"message": ..}]}`; falls back to the raw text.
fn error_message(body: &[u8]) -> String {
    let raw = || String::from_utf8_lossy(body).trim().to_string();
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return raw();
    };

    let text = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    };

    value
        .get("message")
        .and_then(text)
        .or_else(|| value.get("error").and_then(text))
        .or_else(|| {
            value
                .get("errors")?
                .as_array()?
                .iter()
                .filter_map(|e| e.get("message").and_then(text))
                .reduce(|a, b| format!("{a}; {b}"))
        })
        .unwrap_or_else(raw)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::http::MockTransport;

    const BASE: &str = "https://forge.test";

    fn client(transport: &MockTransport) -> RestClient {
        RestClient::new("test", "https://forge.test/", Arc::new(transport.clone()))
            .with_header("Authorization", "Bearer secret")
    }

    #[test]
    fn encode_segment_escapes_slashes_and_spaces() {
        assert_eq!(encode_segment("acme/infra"), "acme%2Finfra");
        assert_eq!(encode_segment("feature/a b"), "feature%2Fa%20b");
    }

    #[test]
    fn query_serializes_pairs() {
        assert_eq!(query(&[]), "");
        assert_eq!(
            query(&[("start", "0".to_string()), ("filter", "a b".to_string())]),
            "?start=0&filter=a+b"
        );
    }

    #[tokio::test]
    async fn get_sends_auth_header_and_decodes() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/repos/acme/infra"),
            200,
            json!({"name": "infra"}),
        );

        let value: serde_json::Value = client(&transport)
            .get(&CancelToken::new(), "/repos/acme/infra")
            .await
            .unwrap();

        assert_eq!(value["name"], "infra");
        let sent = transport.requests();
        assert_eq!(
            header_get(&sent[0].headers, "authorization"),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn status_codes_map_to_error_kinds() {
        let transport = MockTransport::new();
        let rest = client(&transport);
        let cancel = CancelToken::new();

        transport.push_status(HttpMethod::Get, format!("{BASE}/a"), 404);
        transport.push_status(HttpMethod::Get, format!("{BASE}/b"), 401);
        transport.push_json_with_headers(
            HttpMethod::Get,
            format!("{BASE}/c"),
            403,
            vec![("X-RateLimit-Remaining", "0"), ("X-RateLimit-Reset", "1700000000")],
            json!({"message": "API rate limit exceeded"}),
        );
        transport.push_status(HttpMethod::Get, format!("{BASE}/d"), 429);
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/e"),
            409,
            json!({"errors": [{"message": "Repository exists"}]}),
        );

        let get = |path: &'static str| {
            let rest = rest.clone();
            let cancel = cancel.clone();
            async move { rest.get::<serde_json::Value>(&cancel, path).await }
        };

        assert!(get("/a").await.unwrap_err().is_not_found());
        assert!(matches!(
            get("/b").await.unwrap_err(),
            ProviderError::AuthRequired
        ));
        match get("/c").await.unwrap_err() {
            ProviderError::RateLimited { reset_at } => {
                assert_eq!(reset_at.map(|t| t.timestamp()), Some(1_700_000_000));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(get("/d").await.unwrap_err().is_rate_limited());
        match get("/e").await.unwrap_err() {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Repository exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_not_reported_as_not_found() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .get::<serde_json::Value>(&CancelToken::new(), "/unregistered")
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn undecodable_body_is_an_api_error() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{BASE}/x"),
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<html>".to_vec(),
            },
        );
        let err = client(&transport)
            .get::<serde_json::Value>(&CancelToken::new(), "/x")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 200, .. }));
    }

    #[tokio::test]
    async fn cancelled_token_sends_nothing() {
        let transport = MockTransport::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = client(&transport)
            .delete(&cancel, "/repos/acme/infra")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_wait_is_cancellable() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, format!("{BASE}/a"), 200, json!({}));
        let rest = client(&transport).with_rate_limiter(Some(ApiRateLimiter::new(1)));

        rest.get::<serde_json::Value>(&CancelToken::new(), "/a")
            .await
            .unwrap();

        // The single permit is used up; the deadline fires before the next one.
        let cancel = CancelToken::with_timeout(Duration::from_millis(10));
        let err = rest
            .get::<serde_json::Value>(&cancel, "/a")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, format!("{BASE}/items"), 201, json!({"id": 1}));

        let created: serde_json::Value = client(&transport)
            .post(&CancelToken::new(), "/items", &json!({"name": "ci"}))
            .await
            .unwrap();

        assert_eq!(created["id"], 1);
        let sent = &transport.requests_with(HttpMethod::Post)[0];
        assert_eq!(sent.body, br#"{"name":"ci"}"#.to_vec());
        assert_eq!(
            header_get(&sent.headers, "content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn get_optional_treats_404_and_no_content_as_none() {
        let transport = MockTransport::new();
        transport.push_status(HttpMethod::Get, format!("{BASE}/a"), 404);
        transport.push_status(HttpMethod::Get, format!("{BASE}/b"), 204);
        transport.push_status(HttpMethod::Get, format!("{BASE}/c"), 500);
        let rest = client(&transport);
        let cancel = CancelToken::new();

        assert!(rest.get_optional::<serde_json::Value>(&cancel, "/a").await.unwrap().is_none());
        assert!(rest.get_optional::<serde_json::Value>(&cancel, "/b").await.unwrap().is_none());
        assert!(rest.get_optional::<serde_json::Value>(&cancel, "/c").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn gate_times_out_slow_requests() {
        let gate = RequestGate::new("test").with_timeout(Duration::from_secs(5));
        let err = gate
            .send(&CancelToken::new(), "GET", "/slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Transport error: no response within 5s");
    }

    #[tokio::test]
    async fn gate_does_not_start_cancelled_requests() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let started = std::sync::atomic::AtomicBool::new(false);
        let err = RequestGate::new("test")
            .send(&cancel, "GET", "/a", async {
                started.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn error_message_falls_back_to_raw_text() {
        assert_eq!(error_message(b"gateway timeout\n"), "gateway timeout");
        assert_eq!(error_message(br#"{"error":"invalid_token"}"#), "invalid_token");
    }
}
