//! GitLab API client creation and request plumbing.
//!
//! Requests are `gitlab::api` endpoints run with [`AsyncQuery`]. The crate's
//! typed endpoints are used where they exist; the rest are in
//! [`super::endpoints`].

use std::fmt::Display;

use gitlab::api::{self, AsyncQuery, Endpoint, Pageable, Pagination};
use gitlab::{AsyncGitlab, GitlabBuilder};
use serde::de::DeserializeOwned;

use super::PROVIDER;
use crate::platform::{ProviderConfig, ProviderError, Result};
use crate::reconcile::CancelToken;
use crate::rest::RequestGate;

/// GitLab API client: an `AsyncGitlab` behind the shared request gate.
pub struct GitLabClient {
    inner: AsyncGitlab,
    gate: RequestGate,
    host: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    /// Connect to the server in `config`. GitLab needs a token; the builder
    /// checks it against `/user` before returning.
    ///
    /// An `http://` host is reached without TLS.
    pub async fn connect(config: &ProviderConfig) -> Result<Self> {
        let host = config.resolved_host()?;
        let token = config.token.as_deref().ok_or(ProviderError::AuthRequired)?;

        // The builder takes the bare host and picks the scheme itself.
        let (host_only, insecure) = match host.strip_prefix("http://") {
            Some(rest) => (rest, true),
            None => (host.trim_start_matches("https://"), false),
        };
        let mut builder = GitlabBuilder::new(host_only, token);
        if insecure {
            builder.insecure();
        }

        let timeout = config.timeout();
        let inner = tokio::time::timeout(timeout, builder.build_async())
            .await
            .map_err(|_| {
                ProviderError::transport(format!("no response within {}s", timeout.as_secs()))
            })?
            .map_err(|e| classify(&host, &e.to_string()))?;

        tracing::debug!(provider = PROVIDER, host = %host, "Connected");
        Ok(Self {
            inner,
            gate: RequestGate::new(PROVIDER)
                .with_rate_limiter(config.rate_limiter())
                .with_timeout(timeout),
            host,
        })
    }

    /// API base URL.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run `endpoint` and decode its body.
    pub async fn query<E, T>(&self, cancel: &CancelToken, endpoint: E) -> Result<T>
    where
        E: Endpoint + Sync,
        T: DeserializeOwned + Send + 'static,
    {
        let route = endpoint.endpoint().into_owned();
        let method = endpoint.method();
        self.gate
            .send(cancel, method.as_str(), &route, async {
                let response: std::result::Result<T, _> = endpoint.query_async(&self.inner).await;
                response.map_err(|e| classify(&route, &e.to_string()))
            })
            .await
    }

    /// Run a listing endpoint, following every page.
    pub async fn query_all<E, T>(&self, cancel: &CancelToken, endpoint: E) -> Result<Vec<T>>
    where
        E: Endpoint + Pageable + Sync,
        T: DeserializeOwned + Send + 'static,
    {
        let route = endpoint.endpoint().into_owned();
        self.gate
            .send(cancel, "GET", &route, async {
                let response: std::result::Result<Vec<T>, _> = api::paged(endpoint, Pagination::All)
                    .query_async(&self.inner)
                    .await;
                response.map_err(|e| classify(&route, &e.to_string()))
            })
            .await
    }

    /// Run `endpoint`, discarding the response body.
    pub async fn ignore<E>(&self, cancel: &CancelToken, endpoint: E) -> Result<()>
    where
        E: Endpoint + Sync,
    {
        let route = endpoint.endpoint().into_owned();
        let method = endpoint.method();
        self.gate
            .send(cancel, method.as_str(), &route, async {
                api::ignore(endpoint)
                    .query_async(&self.inner)
                    .await
                    .map_err(|e| classify(&route, &e.to_string()))
            })
            .await
    }
}

/// Map a rejected endpoint builder onto the error taxonomy.
pub(crate) fn built<T, E: Display>(result: std::result::Result<T, E>) -> Result<T> {
    result.map_err(|e| ProviderError::invalid_info(format!("cannot build request: {e}")))
}

/// Classify a `gitlab` crate error by its message.
///
/// GitLab error messages lead with the status (`404 Project Not Found`), and
/// the crate reports service errors with their status code. Validation
/// errors come back as an object without one.
pub(crate) fn classify(resource: &(dyn Display + Sync), message: &str) -> ProviderError {
    let lower = message.to_ascii_lowercase();
    if lower.starts_with("client error") || lower.starts_with("communication") {
        return ProviderError::transport(message);
    }
    if lower.starts_with("could not parse") {
        return ProviderError::api(200, format!("cannot decode response body: {message}"));
    }
    match status_in(message) {
        Some(404) => ProviderError::not_found(resource.to_string()),
        Some(401 | 403) => ProviderError::AuthRequired,
        Some(429) => ProviderError::RateLimited { reset_at: None },
        Some(status) => ProviderError::api(status, message),
        None if lower.contains("rate limit") || lower.contains("retry later") => {
            ProviderError::RateLimited { reset_at: None }
        }
        None => ProviderError::api(400, message),
    }
}

/// First standalone three-digit error status in `message`.
fn status_in(message: &str) -> Option<u16> {
    message
        .split(|c: char| !c.is_ascii_digit())
        .filter(|token| token.len() == 3)
        .filter_map(|token| token.parse().ok())
        .find(|status| (400..600).contains(status))
}
