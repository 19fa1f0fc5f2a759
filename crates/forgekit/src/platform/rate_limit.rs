use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use super::provider::ProviderKind;

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default client-side pacing per provider (requests per second).
pub mod rate_limits {
    /// GitHub: 5000 requests/hour, bursts allowed.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// GitLab: 2000 requests/minute on gitlab.com, self-hosted varies.
    pub const GITLAB_DEFAULT_RPS: u32 = 5;
    /// Stash has no published limit; stay conservative.
    pub const STASH_DEFAULT_RPS: u32 = 5;
}

/// The default pacing for a provider kind.
pub fn default_rps(kind: ProviderKind) -> u32 {
    match kind {
        ProviderKind::GitHub => rate_limits::GITHUB_DEFAULT_RPS,
        ProviderKind::GitLab => rate_limits::GITLAB_DEFAULT_RPS,
        ProviderKind::Stash => rate_limits::STASH_DEFAULT_RPS,
    }
}

/// Proactive request pacing shared by all clones.
///
/// The REST client waits on it before each request so a long drain stays
/// under the server's limit instead of hitting 429s.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}

impl ApiRateLimiter {
    /// Allow `requests_per_second` requests per second (0 is treated as 1).
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait until the next request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}
