//! GitLab backend (API v4 through the `gitlab` crate).
//!
//! Organizations are top-level groups and teams are their subgroups. Projects
//! are addressed by their full path, so no id lookup is needed before reading
//! or editing one.
//!
//! # Module Structure
//!
//! - [`client`] - `AsyncGitlab` behind the request gate, error classification
//! - `endpoints` - routes the crate has no typed builder for
//! - [`types`] - wire types
//! - `repos`, `access`, `code`, `people` - one API type per resource kind

mod access;
pub mod client;
mod code;
mod convert;
mod endpoints;
mod people;
mod repos;
pub mod types;

use std::fmt::Display;
use std::sync::Arc;

use gitlab::api::{Endpoint, Pageable};
use serde::de::DeserializeOwned;

use crate::client::ResourceClient;
use crate::platform::{GitProvider, ProviderConfig, ProviderError, ProviderKind, Result};
use crate::reconcile::CancelToken;

pub use access::{GitLabDeployKeys, GitLabTeamAccess};
pub use client::GitLabClient;
pub use code::{GitLabBranches, GitLabCommits, GitLabMergeRequests};
pub use convert::{permission_from_level, permission_to_level};
pub use people::{GitLabGroups, GitLabSubgroups, GitLabUsers};
pub use repos::GitLabProjects;

pub(crate) const PROVIDER: &str = "gitlab";

/// GitLab backend.
#[derive(Debug, Clone)]
pub struct GitLabProvider {
    client: Arc<GitLabClient>,
}

impl GitLabProvider {
    /// Connect and verify the token against the server.
    pub async fn connect(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(GitLabClient::connect(config).await?),
        })
    }

    #[inline]
    pub fn client(&self) -> &GitLabClient {
        &self.client
    }
}

impl GitProvider for GitLabProvider {
    type Repositories = GitLabProjects;
    type DeployKeys = GitLabDeployKeys;
    type TeamAccess = GitLabTeamAccess;
    type Branches = GitLabBranches;
    type Commits = GitLabCommits;
    type PullRequests = GitLabMergeRequests;
    type Organizations = GitLabGroups;
    type Users = GitLabUsers;
    type Teams = GitLabSubgroups;

    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    fn repositories(&self) -> ResourceClient<GitLabProjects> {
        ResourceClient::new(GitLabProjects::new(Arc::clone(&self.client)))
    }

    fn deploy_keys(&self) -> ResourceClient<GitLabDeployKeys> {
        ResourceClient::new(GitLabDeployKeys::new(Arc::clone(&self.client)))
    }

    fn team_access(&self) -> ResourceClient<GitLabTeamAccess> {
        ResourceClient::new(GitLabTeamAccess::new(Arc::clone(&self.client)))
    }

    fn branches(&self) -> ResourceClient<GitLabBranches> {
        ResourceClient::new(GitLabBranches::new(Arc::clone(&self.client)))
    }

    fn commits(&self) -> ResourceClient<GitLabCommits> {
        ResourceClient::new(GitLabCommits::new(Arc::clone(&self.client)))
    }

    fn pull_requests(&self) -> ResourceClient<GitLabMergeRequests> {
        ResourceClient::new(GitLabMergeRequests::new(Arc::clone(&self.client)))
    }

    fn organizations(&self) -> ResourceClient<GitLabGroups> {
        ResourceClient::new(GitLabGroups::new(Arc::clone(&self.client)))
    }

    fn users(&self) -> ResourceClient<GitLabUsers> {
        ResourceClient::new(GitLabUsers::new(Arc::clone(&self.client)))
    }

    fn teams(&self) -> ResourceClient<GitLabSubgroups> {
        ResourceClient::new(GitLabSubgroups::new(Arc::clone(&self.client)))
    }
}

/// Run a listing to the end and return the first item matching `pred`.
pub(crate) async fn find_listed<E, T, P>(
    client: &GitLabClient,
    cancel: &CancelToken,
    endpoint: E,
    resource: &(dyn Display + Sync),
    pred: P,
) -> Result<T>
where
    E: Endpoint + Pageable + Sync,
    T: DeserializeOwned + Send + 'static,
    P: Fn(&T) -> bool,
{
    let items: Vec<T> = client.query_all(cancel, endpoint).await?;
    items
        .into_iter()
        .find(|item| pred(item))
        .ok_or_else(|| ProviderError::not_found(resource.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::platform::{OwnerRef, RepositoryRef};

    pub const TOKEN: &str = "glpat-test";

    /// Answer the `/user` check the client makes while connecting.
    pub async fn mount_current_user(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1,
                "username": "forgekit",
                "name": "forgekit",
                "state": "active",
                "avatar_url": null,
                "web_url": "https://gitlab.test/forgekit"
            })))
            .mount(server)
            .await;
    }

    pub fn config(server: &MockServer) -> ProviderConfig {
        ProviderConfig::new(ProviderKind::GitLab, server.uri())
            .with_token(TOKEN)
            .with_requests_per_second(0)
    }

    pub async fn provider(server: &MockServer) -> GitLabProvider {
        mount_current_user(server).await;
        GitLabProvider::connect(&config(server)).await.unwrap()
    }

    /// `acme/platform/infra`, owned by a subgroup.
    pub fn group_repo() -> RepositoryRef {
        RepositoryRef::new(OwnerRef::organization("acme/platform"), "infra")
    }

    pub fn user_repo() -> RepositoryRef {
        RepositoryRef::new(OwnerRef::user("alice"), "dotfiles")
    }

    pub const PROJECT: &str = "/api/v4/projects/acme%2Fplatform%2Finfra";

    pub fn project_json(description: &str, visibility: &str) -> serde_json::Value {
        serde_json::json!({
            "id": 11,
            "name": "infra",
            "path": "infra",
            "path_with_namespace": "acme/platform/infra",
            "description": description,
            "default_branch": "main",
            "visibility": visibility,
            "archived": false,
            "namespace": {"id": 5, "name": "platform", "path": "platform", "full_path": "acme/platform", "kind": "group"},
            "shared_with_groups": [],
            "web_url": "https://gitlab.test/acme/platform/infra"
        })
    }

    /// Error body in the shape GitLab returns.
    pub fn error_json(message: &str) -> serde_json::Value {
        serde_json::json!({"message": message})
    }

    /// Answer every `verb` request to `route` with `status` and a JSON body.
    pub async fn respond(server: &MockServer, verb: &str, route: &str, status: u16, body: serde_json::Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Answer the first GET of `route` with `first`, later ones with `then`.
    pub async fn respond_in_turn(
        server: &MockServer,
        route: &str,
        first: serde_json::Value,
        then: serde_json::Value,
    ) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(first))
            .up_to_n_times(1)
            .mount(server)
            .await;
        respond(server, "GET", route, 200, then).await;
    }

    /// Answer every `verb` request to `route` with a bodiless `status`.
    pub async fn respond_status(server: &MockServer, verb: &str, route: &str, status: u16) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    /// Form bodies of the requests `server` received with `method`.
    pub async fn sent_forms(server: &MockServer, method: &str) -> Vec<HashMap<String, String>> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == method)
            .map(|request| url::form_urlencoded::parse(&request.body).into_owned().collect())
            .collect()
    }

    /// Requests `server` received with `method`, apart from the connect check.
    pub async fn sent_count(server: &MockServer, method: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.method.as_str() == method && request.url.path() != "/api/v4/user")
            .count()
    }
}
