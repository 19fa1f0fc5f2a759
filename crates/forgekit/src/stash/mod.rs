//! Stash (Bitbucket Server) backend.
//!
//! Uses the REST 1.0 API. Organizations are projects; user repositories live
//! under the personal project `~login`. Teams are global groups, listed per
//! organization through the project's group permissions.

mod access;
mod code;
mod convert;
mod people;
mod repos;
pub mod types;

use std::fmt::Display;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::client::ResourceClient;
use crate::http::HttpTransport;
use crate::platform::{
    GitProvider, OwnerRef, ProviderConfig, ProviderError, ProviderKind, RepositoryRef, Result,
};
use crate::reconcile::{CancelToken, ListOptions, Page, drain_all};
use crate::rest::{RestClient, query};

pub use access::{StashDeployKeys, StashTeamAccess};
pub use code::{StashBranches, StashCommits, StashPullRequests};
pub use people::{StashGroups, StashProjects, StashUsers};
pub use repos::StashRepositories;

use types::Paged;

pub(crate) const PROVIDER: &str = "stash";

const API: &str = "/rest/api/1.0";
const KEYS_API: &str = "/rest/keys/1.0";
const BRANCH_UTILS_API: &str = "/rest/branch-utils/1.0";

/// Stash backend.
#[derive(Debug, Clone)]
pub struct StashProvider {
    rest: Arc<RestClient>,
}

impl StashProvider {
    /// Connect with a reqwest transport.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let transport =
            crate::http::reqwest_transport::ReqwestTransport::with_timeout(config.timeout())
                .map_err(|e| ProviderError::transport(e.to_string()))?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: &ProviderConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let host = config.resolved_host()?;
        let mut rest = RestClient::new(PROVIDER, &host, transport)
            .with_rate_limiter(config.rate_limiter());
        if let Some(token) = &config.token {
            rest = rest.with_header("Authorization", format!("Bearer {token}"));
        }
        Ok(Self {
            rest: Arc::new(rest),
        })
    }
}

impl GitProvider for StashProvider {
    type Repositories = StashRepositories;
    type DeployKeys = StashDeployKeys;
    type TeamAccess = StashTeamAccess;
    type Branches = StashBranches;
    type Commits = StashCommits;
    type PullRequests = StashPullRequests;
    type Organizations = StashProjects;
    type Users = StashUsers;
    type Teams = StashGroups;

    fn kind(&self) -> ProviderKind {
        ProviderKind::Stash
    }

    fn repositories(&self) -> ResourceClient<StashRepositories> {
        ResourceClient::new(StashRepositories::new(Arc::clone(&self.rest)))
    }

    fn deploy_keys(&self) -> ResourceClient<StashDeployKeys> {
        ResourceClient::new(StashDeployKeys::new(Arc::clone(&self.rest)))
    }

    fn team_access(&self) -> ResourceClient<StashTeamAccess> {
        ResourceClient::new(StashTeamAccess::new(Arc::clone(&self.rest)))
    }

    fn branches(&self) -> ResourceClient<StashBranches> {
        ResourceClient::new(StashBranches::new(Arc::clone(&self.rest)))
    }

    fn commits(&self) -> ResourceClient<StashCommits> {
        ResourceClient::new(StashCommits::new(Arc::clone(&self.rest)))
    }

    fn pull_requests(&self) -> ResourceClient<StashPullRequests> {
        ResourceClient::new(StashPullRequests::new(Arc::clone(&self.rest)))
    }

    fn organizations(&self) -> ResourceClient<StashProjects> {
        ResourceClient::new(StashProjects::new(Arc::clone(&self.rest)))
    }

    fn users(&self) -> ResourceClient<StashUsers> {
        ResourceClient::new(StashUsers::new(Arc::clone(&self.rest)))
    }

    fn teams(&self) -> ResourceClient<StashGroups> {
        ResourceClient::new(StashGroups::new(Arc::clone(&self.rest)))
    }
}

/// Project key of a repository owner. Users own the personal project `~login`.
pub(crate) fn project_key(owner: &OwnerRef) -> String {
    match owner {
        OwnerRef::User(user) => format!("~{}", user.login),
        OwnerRef::Organization(org) => org.path.clone(),
    }
}

/// `/rest/api/1.0/projects/{key}/repos/{slug}`.
pub(crate) fn repo_path(r: &RepositoryRef) -> String {
    format!("{API}/projects/{}/repos/{}", project_key(&r.owner), r.name)
}

/// Fetch one page of a `start`/`limit` listing.
pub(crate) async fn fetch_paged<T: DeserializeOwned>(
    rest: &RestClient,
    cancel: &CancelToken,
    path: &str,
    options: ListOptions,
    extra: &[(&str, String)],
) -> Result<(Vec<T>, Page)> {
    let mut params = vec![
        ("start", options.cursor_or(0).to_string()),
        ("limit", options.page_size.to_string()),
    ];
    params.extend(extra.iter().cloned());
    let paged: Paged<T> = rest.get(cancel, &format!("{path}{}", query(&params))).await?;
    paged.into_parts()
}

/// Drain a listing and return the first item matching `pred`.
///
/// Stash has no get-by-name for several resources; `extra` usually carries a
/// server-side filter to keep the scan short.
pub(crate) async fn find_paged<T, P>(
    rest: &RestClient,
    cancel: &CancelToken,
    path: &str,
    extra: &[(&str, String)],
    resource: &(dyn Display + Sync),
    pred: P,
) -> Result<T>
where
    T: DeserializeOwned,
    P: Fn(&T) -> bool,
{
    let items: Vec<T> = drain_all(ListOptions::default(), cancel, |options| {
        fetch_paged(rest, cancel, path, options, extra)
    })
    .await?;
    items
        .into_iter()
        .find(|item| pred(item))
        .ok_or_else(|| ProviderError::not_found(resource.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::http::MockTransport;

    pub const HOST: &str = "https://stash.test";

    pub fn provider(transport: &MockTransport) -> StashProvider {
        let config = ProviderConfig::new(ProviderKind::Stash, HOST)
            .with_token("secret")
            .with_requests_per_second(0);
        StashProvider::with_transport(&config, Arc::new(transport.clone())).unwrap()
    }

    pub fn url(path: &str) -> String {
        format!("{HOST}{path}")
    }

    pub fn org_repo() -> RepositoryRef {
        RepositoryRef::new(OwnerRef::organization("PLAT"), "infra")
    }

    pub fn repo_json(slug: &str, description: &str, public: bool) -> serde_json::Value {
        serde_json::json!({
            "id": 7,
            "slug": slug,
            "name": slug,
            "description": description,
            "scmId": "git",
            "state": "AVAILABLE",
            "forkable": true,
            "public": public,
            "project": {"key": "PLAT", "id": 1, "name": "Platform"},
            "links": {"self": [{"href": format!("{HOST}/projects/PLAT/repos/{slug}/browse")}]}
        })
    }

    pub fn page(values: serde_json::Value, next: Option<u64>) -> serde_json::Value {
        serde_json::json!({
            "values": values,
            "isLastPage": next.is_none(),
            "nextPageStart": next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport, header_get};
    use testing::*;

    #[test]
    fn user_repositories_live_in_personal_projects() {
        let r = RepositoryRef::new(OwnerRef::user("alice"), "dotfiles");
        assert_eq!(repo_path(&r), "/rest/api/1.0/projects/~alice/repos/dotfiles");
        assert_eq!(
            repo_path(&org_repo()),
            "/rest/api/1.0/projects/PLAT/repos/infra"
        );
    }

    #[test]
    fn provider_requires_host() {
        let config = ProviderConfig::new(ProviderKind::Stash, "");
        let err = StashProvider::with_transport(&config, Arc::new(MockTransport::new()))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInfo { .. }));
    }

    #[tokio::test]
    async fn requests_carry_bearer_token() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            url("/rest/api/1.0/projects/PLAT"),
            200,
            serde_json::json!({"key": "PLAT", "id": 1, "name": "Platform"}),
        );
        let provider = provider(&transport);
        provider
            .organizations()
            .get(
                &CancelToken::new(),
                &crate::platform::OrganizationRef::new("PLAT"),
            )
            .await
            .unwrap();
        let sent = transport.requests();
        assert_eq!(
            header_get(&sent[0].headers, "authorization"),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn find_paged_scans_pages_and_reports_missing() {
        let transport = MockTransport::new();
        let path = "/rest/api/1.0/admin/groups";
        transport.push_json(
            HttpMethod::Get,
            url(&format!("{path}?start=0&limit=100")),
            200,
            page(serde_json::json!([{"name": "dev"}]), Some(1)),
        );
        transport.push_json(
            HttpMethod::Get,
            url(&format!("{path}?start=1&limit=100")),
            200,
            page(serde_json::json!([{"name": "ops"}]), None),
        );
        let provider = provider(&transport);

        let found: types::Group = find_paged(
            &provider.rest,
            &CancelToken::new(),
            path,
            &[],
            &"group ops",
            |g: &types::Group| g.name == "ops",
        )
        .await
        .unwrap();
        assert_eq!(found.name, "ops");
        assert_eq!(transport.requests().len(), 2);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn lookups_run_on_spawned_tasks() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            url("/rest/keys/1.0/projects/PLAT/repos/infra/ssh?start=0&limit=100"),
            200,
            page(
                serde_json::json!([{
                    "key": {"id": 1, "text": "ssh-ed25519 AAAA", "label": "ci"},
                    "permission": "REPO_READ"
                }]),
                None,
            ),
        );
        let stash = provider(&transport);

        let cancel = CancelToken::new();
        let group = "group ops".to_string();
        assert_send(&find_paged(
            &stash.rest,
            &cancel,
            "/rest/api/1.0/admin/groups",
            &[],
            &group,
            |g: &types::Group| g.name == "ops",
        ));

        let keys = stash.deploy_keys();
        let info = tokio::spawn(async move {
            keys.get_info(&CancelToken::new(), &org_repo().deploy_key("ci"))
                .await
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(info.read_only, Some(true));
    }

    #[tokio::test]
    async fn unfinished_page_without_next_start_fails_the_listing() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            url("/rest/api/1.0/projects/PLAT/repos?start=0&limit=100"),
            200,
            serde_json::json!({"values": [repo_json("a", "", false)], "isLastPage": false}),
        );

        let err = provider(&transport)
            .repositories()
            .list(&CancelToken::new(), &OwnerRef::organization("PLAT"))
            .await
            .unwrap_err();
        assert!(matches!(err.root(), ProviderError::Api { status: 200, .. }));
    }

    #[tokio::test]
    async fn listing_without_envelope_fails() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            url("/rest/api/1.0/projects/PLAT/repos?start=0&limit=100"),
            200,
            serde_json::json!({"unexpected": true}),
        );

        let err = provider(&transport)
            .repositories()
            .list(&CancelToken::new(), &OwnerRef::organization("PLAT"))
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err.root(), ProviderError::Api { .. }));
    }
}
