//! GitHub API client creation and request plumbing.
//!
//! Requests go through `octocrab`. Typed routes decode straight into the wire
//! types in [`super::types`]; routes whose success is a bare status (204/404
//! membership checks, deletes) use octocrab's raw `_get`/`_put`/`_delete`.

use std::fmt::Display;

use octocrab::Octocrab;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::pagination::cursor_page;
use super::PROVIDER;
use crate::platform::{ProviderConfig, ProviderError, Result};
use crate::reconcile::{CancelToken, Page};
use crate::rest::RequestGate;

/// GitHub API client: an octocrab instance behind the shared request gate.
#[derive(Clone)]
pub struct GitHubClient {
    inner: Octocrab,
    gate: RequestGate,
    host: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Build a client for `config`. An empty host means `api.github.com`.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let host = config.resolved_host()?;
        let mut builder = Octocrab::builder()
            .base_uri(host.as_str())
            .map_err(|e| ProviderError::invalid_info(format!("invalid GitHub host {host}: {e}")))?;
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }
        let inner = builder
            .build()
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        Ok(Self {
            inner,
            gate: RequestGate::new(PROVIDER)
                .with_rate_limiter(config.rate_limiter())
                .with_timeout(config.timeout()),
            host,
        })
    }

    /// API base URL.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn get<T>(&self, cancel: &CancelToken, route: &str) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.gate
            .send(cancel, "GET", route, async {
                let response: std::result::Result<T, octocrab::Error> =
                    self.inner.get(route, None::<&()>).await;
                response.map_err(|e| map_error(&route, e))
            })
            .await
    }

    /// GET one page of a listing, returning its items and the next cursor
    /// read from `cursor_param` in the `rel="next"` link.
    pub async fn get_page<T>(
        &self,
        cancel: &CancelToken,
        route: &str,
        cursor_param: &str,
    ) -> Result<(Vec<T>, Page)>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let page = self
            .gate
            .send(cancel, "GET", route, async {
                let response: std::result::Result<octocrab::Page<T>, octocrab::Error> =
                    self.inner.get(route, None::<&()>).await;
                response.map_err(|e| map_error(&route, e))
            })
            .await?;
        let next = page.next.as_ref().map(ToString::to_string);
        let cursor = cursor_page(next.as_deref(), cursor_param)?;
        Ok((page.items, cursor))
    }

    /// GET a route that answers 204 or 404 without a body. Returns whether
    /// the server answered 204.
    pub async fn exists(&self, cancel: &CancelToken, route: &str) -> Result<bool> {
        self.gate
            .send(cancel, "GET", route, async {
                let response = self
                    .inner
                    ._get(route)
                    .await
                    .map_err(|e| map_error(&route, e))?;
                match response.status().as_u16() {
                    204 => Ok(true),
                    404 => Ok(false),
                    status => Err(unexpected_status(route, status)),
                }
            })
            .await
    }

    pub async fn post<B, T>(&self, cancel: &CancelToken, route: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        self.gate
            .send(cancel, "POST", route, async {
                let response: std::result::Result<T, octocrab::Error> =
                    self.inner.post(route, Some(body)).await;
                response.map_err(|e| map_error(&route, e))
            })
            .await
    }

    pub async fn put<B, T>(&self, cancel: &CancelToken, route: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        self.gate
            .send(cancel, "PUT", route, async {
                let response: std::result::Result<T, octocrab::Error> =
                    self.inner.put(route, Some(body)).await;
                response.map_err(|e| map_error(&route, e))
            })
            .await
    }

    pub async fn patch<B, T>(&self, cancel: &CancelToken, route: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        self.gate
            .send(cancel, "PATCH", route, async {
                let response: std::result::Result<T, octocrab::Error> =
                    self.inner.patch(route, Some(body)).await;
                response.map_err(|e| map_error(&route, e))
            })
            .await
    }

    /// PUT whose success is a bare 2xx status (membership and permission
    /// grants answer 204 or an object nobody reads).
    pub async fn put_status<B>(&self, cancel: &CancelToken, route: &str, body: &B) -> Result<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.gate
            .send(cancel, "PUT", route, async {
                let response = self
                    .inner
                    ._put(route, Some(body))
                    .await
                    .map_err(|e| map_error(&route, e))?;
                status_result(route, response.status().as_u16())
            })
            .await
    }

    pub async fn delete(&self, cancel: &CancelToken, route: &str) -> Result<()> {
        self.gate
            .send(cancel, "DELETE", route, async {
                let response = self
                    .inner
                    ._delete(route, None::<&()>)
                    .await
                    .map_err(|e| map_error(&route, e))?;
                status_result(route, response.status().as_u16())
            })
            .await
    }
}

fn status_result(route: &str, status: u16) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(unexpected_status(route, status))
    }
}

/// Classify a raw response status the same way octocrab errors are.
fn unexpected_status(route: &str, status: u16) -> ProviderError {
    match status {
        404 => ProviderError::not_found(route),
        401 | 403 => ProviderError::AuthRequired,
        429 => ProviderError::RateLimited { reset_at: None },
        status => ProviderError::api(status, format!("unexpected status for {route}")),
    }
}

/// Map an octocrab error onto the error taxonomy.
///
/// GitHub reports an exhausted quota as 403 with a "rate limit" message, and
/// secondary limits as 429.
pub(crate) fn map_error(resource: &(dyn Display + Sync), err: octocrab::Error) -> ProviderError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            let rate_limited = source.message.to_ascii_lowercase().contains("rate limit");
            match status {
                404 => ProviderError::not_found(resource.to_string()),
                429 => ProviderError::RateLimited { reset_at: None },
                403 if rate_limited => ProviderError::RateLimited { reset_at: None },
                401 | 403 => ProviderError::AuthRequired,
                _ => ProviderError::api(status, source.message.clone()),
            }
        }
        octocrab::Error::Json { source, .. } => {
            ProviderError::api(200, format!("cannot decode response body: {source}"))
        }
        other => ProviderError::transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ProviderKind;

    #[tokio::test]
    async fn default_host_is_public_api() {
        let config = ProviderConfig::new(ProviderKind::GitHub, "").with_requests_per_second(0);
        let client = GitHubClient::new(&config).unwrap();
        assert_eq!(client.host(), "https://api.github.com");
    }

    #[test]
    fn raw_statuses_are_classified() {
        assert!(unexpected_status("/x", 404).is_not_found());
        assert!(unexpected_status("/x", 429).is_rate_limited());
        assert!(matches!(
            unexpected_status("/x", 401),
            ProviderError::AuthRequired
        ));
        assert!(matches!(
            unexpected_status("/x", 500),
            ProviderError::Api { status: 500, .. }
        ));
        assert!(status_result("/x", 204).is_ok());
    }
}
