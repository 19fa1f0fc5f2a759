//! Runtime choice of backend.
//!
//! [`GitProvider`](forgekit::GitProvider) has associated types, so commands
//! are generic functions and [`with_backend!`] picks the instantiation.

use forgekit::platform::{ProviderConfig, ProviderError, ProviderKind};

#[cfg(feature = "github")]
use forgekit::github::GitHubProvider;
#[cfg(feature = "gitlab")]
use forgekit::gitlab::GitLabProvider;
#[cfg(feature = "stash")]
use forgekit::stash::StashProvider;

pub(crate) enum Backend {
    #[cfg(feature = "github")]
    GitHub(GitHubProvider),
    #[cfg(feature = "gitlab")]
    GitLab(GitLabProvider),
    #[cfg(feature = "stash")]
    Stash(StashProvider),
}

impl Backend {
    /// GitLab checks the token while connecting; the others connect lazily.
    pub(crate) async fn connect(config: &ProviderConfig) -> Result<Self, ProviderError> {
        tracing::debug!(provider = %config.kind, host = %config.host, "Connecting");
        match config.kind {
            #[cfg(feature = "github")]
            ProviderKind::GitHub => Ok(Self::GitHub(GitHubProvider::new(config)?)),
            #[cfg(feature = "gitlab")]
            ProviderKind::GitLab => Ok(Self::GitLab(GitLabProvider::connect(config).await?)),
            #[cfg(feature = "stash")]
            ProviderKind::Stash => Ok(Self::Stash(StashProvider::new(config)?)),
            #[allow(unreachable_patterns)]
            kind => Err(ProviderError::unsupported(
                kind.as_str(),
                "this build (backend feature disabled)",
            )),
        }
    }
}

/// Run `$body` with `$p` bound to the concrete provider inside `$backend`.
macro_rules! with_backend {
    ($backend:expr, $p:ident => $body:expr) => {
        match $backend {
            #[cfg(feature = "github")]
            $crate::backend::Backend::GitHub($p) => $body,
            #[cfg(feature = "gitlab")]
            $crate::backend::Backend::GitLab($p) => $body,
            #[cfg(feature = "stash")]
            $crate::backend::Backend::Stash($p) => $body,
        }
    };
}

pub(crate) use with_backend;
