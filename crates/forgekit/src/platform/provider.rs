//! The backend seam: one API type per resource kind.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::{ProviderError, Result};
use super::info::{
    BranchInfo, CommitInfo, DeployKeyInfo, MergeMethod, OrganizationInfo, PullRequestInfo,
    RepositoryInfo, TeamAccessInfo, TeamInfo, UserInfo,
};
use super::rate_limit::{ApiRateLimiter, default_rps};
use super::refs::{
    BranchRef, CommitHistoryRef, CommitRef, DeployKeyRef, OrganizationRef, OwnerRef,
    ProviderRoot, PullRequestRef, RepositoryRef, TeamAccessRef, TeamRef, UserRef,
};
use crate::client::ResourceClient;
use crate::reconcile::{CancelToken, CreateApi, DeleteApi, ListApi, ResourceApi, UpdateApi};

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Supported hosting backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
    #[serde(alias = "bitbucket")]
    Stash,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Stash => "stash",
        }
    }

    /// Public API host, when the provider has a well-known one.
    pub fn default_host(self) -> Option<&'static str> {
        match self {
            Self::GitHub => Some("https://api.github.com"),
            Self::GitLab => Some("https://gitlab.com"),
            Self::Stash => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            "stash" | "bitbucket" => Ok(Self::Stash),
            other => Err(ProviderError::invalid_info(format!(
                "unknown provider `{other}` (expected github, gitlab or stash)"
            ))),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Connection settings for one provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL, e.g. `https://stash.example.com`. Empty means the kind's default.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Client-side pacing. `None` uses the kind's default, `Some(0)` disables it.
    #[serde(default)]
    pub requests_per_second: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("requests_per_second", &self.requests_per_second)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, host: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            token: None,
            requests_per_second: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// The configured host, or the kind's public default.
    pub fn resolved_host(&self) -> Result<String> {
        let host = self.host.trim().trim_end_matches('/');
        if !host.is_empty() {
            return Ok(host.to_string());
        }
        self.kind
            .default_host()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid_info(format!("{} needs a host", self.kind)))
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limiter(&self) -> Option<ApiRateLimiter> {
        match self.requests_per_second {
            Some(0) => None,
            Some(rps) => Some(ApiRateLimiter::new(rps)),
            None => Some(ApiRateLimiter::new(default_rps(self.kind))),
        }
    }
}

/// Pull request operations beyond generic get/list/update.
///
/// Opening is separate from `CreateApi` because the server assigns the number.
#[async_trait]
pub trait PullRequestApi: ResourceApi<Ref = PullRequestRef, Info = PullRequestInfo> {
    async fn open(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        info: &PullRequestInfo,
    ) -> Result<Self::Object>;

    async fn merge(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        method: MergeMethod,
        message: Option<&str>,
    ) -> Result<Self::Object>;
}

/// Team membership lookups.
#[async_trait]
pub trait TeamMembersApi: ResourceApi<Ref = TeamRef, Info = TeamInfo> {
    async fn list_members(&self, cancel: &CancelToken, team: &TeamRef) -> Result<Vec<UserInfo>>;

    /// A single member. NotFound when the user is not in the team.
    async fn get_member(
        &self,
        cancel: &CancelToken,
        team: &TeamRef,
        user: &UserRef,
    ) -> Result<UserInfo>;
}

/// A git hosting backend.
///
/// Each associated type is the backend's API for one resource kind. The
/// bounds fix the ref, info and list parent so callers can work against any
/// backend generically.
pub trait GitProvider: Send + Sync + 'static {
    type Repositories: ListApi<Ref = RepositoryRef, Info = RepositoryInfo, Parent = OwnerRef>
        + CreateApi
        + UpdateApi
        + DeleteApi;
    type DeployKeys: ListApi<Ref = DeployKeyRef, Info = DeployKeyInfo, Parent = RepositoryRef>
        + CreateApi
        + UpdateApi
        + DeleteApi;
    type TeamAccess: ListApi<Ref = TeamAccessRef, Info = TeamAccessInfo, Parent = RepositoryRef>
        + CreateApi
        + UpdateApi
        + DeleteApi;
    type Branches: ListApi<Ref = BranchRef, Info = BranchInfo, Parent = RepositoryRef>
        + CreateApi
        + UpdateApi
        + DeleteApi;
    type Commits: ListApi<Ref = CommitRef, Info = CommitInfo, Parent = CommitHistoryRef>;
    type PullRequests: ListApi<Parent = RepositoryRef> + UpdateApi + PullRequestApi;
    type Organizations: ListApi<Ref = OrganizationRef, Info = OrganizationInfo, Parent = ProviderRoot>;
    type Users: ListApi<Ref = UserRef, Info = UserInfo, Parent = ProviderRoot>;
    type Teams: ListApi<Parent = OrganizationRef> + TeamMembersApi;

    fn kind(&self) -> ProviderKind;

    fn repositories(&self) -> ResourceClient<Self::Repositories>;
    fn deploy_keys(&self) -> ResourceClient<Self::DeployKeys>;
    fn team_access(&self) -> ResourceClient<Self::TeamAccess>;
    fn branches(&self) -> ResourceClient<Self::Branches>;
    fn commits(&self) -> ResourceClient<Self::Commits>;
    fn pull_requests(&self) -> ResourceClient<Self::PullRequests>;
    fn organizations(&self) -> ResourceClient<Self::Organizations>;
    fn users(&self) -> ResourceClient<Self::Users>;
    fn teams(&self) -> ResourceClient<Self::Teams>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("GitHub".parse::<ProviderKind>().unwrap(), ProviderKind::GitHub);
        assert_eq!("bitbucket".parse::<ProviderKind>().unwrap(), ProviderKind::Stash);
        assert!("svn".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn config_resolves_default_host() {
        let github = ProviderConfig::new(ProviderKind::GitHub, "");
        assert_eq!(github.resolved_host().unwrap(), "https://api.github.com");

        let stash = ProviderConfig::new(ProviderKind::Stash, "https://stash.example.com/");
        assert_eq!(stash.resolved_host().unwrap(), "https://stash.example.com");

        let missing = ProviderConfig::new(ProviderKind::Stash, " ");
        assert!(missing.resolved_host().is_err());
    }

    #[test]
    fn config_rate_limiter_can_be_disabled() {
        let config = ProviderConfig::new(ProviderKind::GitLab, "").with_requests_per_second(0);
        assert!(config.rate_limiter().is_none());
        assert!(
            ProviderConfig::new(ProviderKind::GitLab, "")
                .rate_limiter()
                .is_some()
        );
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = ProviderConfig::new(ProviderKind::GitHub, "").with_token("ghp_secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"kind":"stash","host":"https://s.example"}"#).unwrap();
        assert_eq!(config.kind, ProviderKind::Stash);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.token.is_none());
    }
}
