//! GitHub backend (REST v3 through `octocrab`).
//!
//! # Module Structure
//!
//! - [`client`] - octocrab client behind the request gate, error mapping
//! - [`types`] - wire types
//! - `convert` - object <-> info mapping
//! - `pagination` - `Link` header paging
//! - `repos`, `access`, `code`, `people` - one API type per resource kind

mod access;
pub mod client;
mod code;
mod convert;
mod pagination;
mod people;
mod repos;
pub mod types;

use std::fmt::Display;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::client::ResourceClient;
use crate::platform::{
    GitProvider, ProviderConfig, ProviderError, ProviderKind, RepositoryRef, Result,
};
use crate::reconcile::{CancelToken, ListOptions, drain_all};
use crate::rest::encode_segment;

pub use access::{GitHubDeployKeys, GitHubTeamAccess};
pub use client::GitHubClient;
pub use code::{GitHubBranches, GitHubCommits, GitHubPullRequests};
pub use people::{GitHubOrganizations, GitHubTeams, GitHubUsers};
pub use repos::GitHubRepositories;

pub(crate) const PROVIDER: &str = "github";

/// GitHub backend.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client: Arc<GitHubClient>,
}

impl GitHubProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(GitHubClient::new(config)?),
        })
    }

    #[inline]
    pub fn client(&self) -> &GitHubClient {
        &self.client
    }
}

impl GitProvider for GitHubProvider {
    type Repositories = GitHubRepositories;
    type DeployKeys = GitHubDeployKeys;
    type TeamAccess = GitHubTeamAccess;
    type Branches = GitHubBranches;
    type Commits = GitHubCommits;
    type PullRequests = GitHubPullRequests;
    type Organizations = GitHubOrganizations;
    type Users = GitHubUsers;
    type Teams = GitHubTeams;

    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    fn repositories(&self) -> ResourceClient<GitHubRepositories> {
        ResourceClient::new(GitHubRepositories::new(Arc::clone(&self.client)))
    }

    fn deploy_keys(&self) -> ResourceClient<GitHubDeployKeys> {
        ResourceClient::new(GitHubDeployKeys::new(Arc::clone(&self.client)))
    }

    fn team_access(&self) -> ResourceClient<GitHubTeamAccess> {
        ResourceClient::new(GitHubTeamAccess::new(Arc::clone(&self.client)))
    }

    fn branches(&self) -> ResourceClient<GitHubBranches> {
        ResourceClient::new(GitHubBranches::new(Arc::clone(&self.client)))
    }

    fn commits(&self) -> ResourceClient<GitHubCommits> {
        ResourceClient::new(GitHubCommits::new(Arc::clone(&self.client)))
    }

    fn pull_requests(&self) -> ResourceClient<GitHubPullRequests> {
        ResourceClient::new(GitHubPullRequests::new(Arc::clone(&self.client)))
    }

    fn organizations(&self) -> ResourceClient<GitHubOrganizations> {
        ResourceClient::new(GitHubOrganizations::new(Arc::clone(&self.client)))
    }

    fn users(&self) -> ResourceClient<GitHubUsers> {
        ResourceClient::new(GitHubUsers::new(Arc::clone(&self.client)))
    }

    fn teams(&self) -> ResourceClient<GitHubTeams> {
        ResourceClient::new(GitHubTeams::new(Arc::clone(&self.client)))
    }
}

/// `/repos/{owner}/{repo}`.
pub(crate) fn repo_path(r: &RepositoryRef) -> String {
    format!(
        "/repos/{}/{}",
        encode_segment(r.owner.name()),
        encode_segment(&r.name)
    )
}

/// Drain a page-numbered listing and return the first item matching `pred`.
pub(crate) async fn find_listed<T, P>(
    client: &GitHubClient,
    cancel: &CancelToken,
    path: &str,
    resource: &(dyn Display + Sync),
    pred: P,
) -> Result<T>
where
    T: DeserializeOwned + Send + 'static,
    P: Fn(&T) -> bool,
{
    let items: Vec<T> = drain_all(ListOptions::default(), cancel, |options| {
        pagination::fetch_page(client, cancel, path, options, &[])
    })
    .await?;
    items
        .into_iter()
        .find(|item| pred(item))
        .ok_or_else(|| ProviderError::not_found(resource.to_string()))
}


#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::platform::{OwnerRef, UserRef};
    use testing::*;

    #[test]
    fn repo_path_encodes_segments() {
        assert_eq!(repo_path(&org_repo()), "/repos/acme/infra");
        let odd = RepositoryRef::new(OwnerRef::user("a b"), "x");
        assert_eq!(repo_path(&odd), "/repos/a%20b/x");
    }

    #[tokio::test]
    async fn requests_carry_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"login": "octocat", "id": 1})),
            )
            .expect(1)
            .mount(&server)
            .await;

        provider(&server)
            .users()
            .get(&CancelToken::new(), &UserRef::new("octocat"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exhausted_quota_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_json(error_json("API rate limit exceeded for 10.0.0.1.")),
            )
            .mount(&server)
            .await;

        let err = provider(&server)
            .users()
            .get(&CancelToken::new(), &UserRef::new("octocat"))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn forbidden_without_quota_message_needs_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(403).set_body_json(error_json("Must have admin rights")))
            .mount(&server)
            .await;

        let err = provider(&server)
            .users()
            .get(&CancelToken::new(), &UserRef::new("octocat"))
            .await
            .unwrap_err();
        assert!(matches!(err.root(), ProviderError::AuthRequired));
    }

    #[tokio::test]
    async fn lookups_run_on_spawned_tasks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/infra/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let keys = provider(&server).deploy_keys();
        let r = org_repo().deploy_key("ci");
        let err = tokio::spawn(async move { keys.get_info(&CancelToken::new(), &r).await })
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
