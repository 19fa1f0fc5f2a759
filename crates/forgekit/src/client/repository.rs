//! Repository handles with their child resource clients.
//!
//! Organization repositories are a repository handle plus a team-access
//! client; user repositories have no team access.

use std::ops::Deref;

use super::{Resource, ResourceClient};
use crate::platform::{
    BranchInfo, CommitInfo, DeployKeyInfo, GitProvider, PullRequestApi, PullRequestInfo,
    RepositoryInfo, RepositoryRef, Result, TeamAccessInfo,
};
use crate::reconcile::{CancelToken, ReconcileAction, ReconcileError, ResourceApi};

type PullRequestObject<P> = <<P as GitProvider>::PullRequests as ResourceApi>::Object;

/// A fetched repository and the clients for resources inside it.
pub struct Repository<P: GitProvider> {
    resource: Resource<P::Repositories>,
    deploy_keys: ResourceClient<P::DeployKeys>,
    branches: ResourceClient<P::Branches>,
    commits: ResourceClient<P::Commits>,
    pull_requests: ResourceClient<P::PullRequests>,
}

/// A repository owned by a user account.
pub type UserRepository<P> = Repository<P>;

impl<P: GitProvider> Repository<P> {
    pub fn from_resource(provider: &P, resource: Resource<P::Repositories>) -> Self {
        Self {
            resource,
            deploy_keys: provider.deploy_keys(),
            branches: provider.branches(),
            commits: provider.commits(),
            pull_requests: provider.pull_requests(),
        }
    }

    pub async fn open(provider: &P, cancel: &CancelToken, r: &RepositoryRef) -> Result<Self> {
        let resource = provider.repositories().get(cancel, r).await?;
        Ok(Self::from_resource(provider, resource))
    }

    #[inline]
    pub fn reference(&self) -> &RepositoryRef {
        self.resource.reference()
    }

    pub fn info(&self) -> RepositoryInfo {
        self.resource.info()
    }

    #[inline]
    pub fn resource(&self) -> &Resource<P::Repositories> {
        &self.resource
    }

    #[inline]
    pub fn resource_mut(&mut self) -> &mut Resource<P::Repositories> {
        &mut self.resource
    }

    pub fn deploy_keys(&self) -> &ResourceClient<P::DeployKeys> {
        &self.deploy_keys
    }

    pub fn branches(&self) -> &ResourceClient<P::Branches> {
        &self.branches
    }

    pub fn commits(&self) -> &ResourceClient<P::Commits> {
        &self.commits
    }

    pub fn pull_requests(&self) -> &ResourceClient<P::PullRequests> {
        &self.pull_requests
    }

    pub async fn list_deploy_keys(&self, cancel: &CancelToken) -> Result<Vec<DeployKeyInfo>> {
        self.deploy_keys.list_info(cancel, self.reference()).await
    }

    pub async fn reconcile_deploy_key(
        &self,
        cancel: &CancelToken,
        name: &str,
        desired: &DeployKeyInfo,
    ) -> std::result::Result<ReconcileAction, ReconcileError> {
        let r = self.reference().deploy_key(name);
        Ok(self.deploy_keys.reconcile(cancel, &r, desired).await?.action)
    }

    pub async fn list_branches(&self, cancel: &CancelToken) -> Result<Vec<BranchInfo>> {
        self.branches.list_info(cancel, self.reference()).await
    }

    pub async fn branch(&self, cancel: &CancelToken, name: &str) -> Result<Resource<P::Branches>> {
        self.branches.get(cancel, &self.reference().branch(name)).await
    }

    /// Commits reachable from `branch`, newest first.
    pub async fn history(&self, cancel: &CancelToken, branch: &str) -> Result<Vec<CommitInfo>> {
        let parent = crate::platform::CommitHistoryRef {
            branch: self.reference().branch(branch),
        };
        self.commits.list_info(cancel, &parent).await
    }

    pub async fn open_pull_request(
        &self,
        cancel: &CancelToken,
        desired: &PullRequestInfo,
    ) -> Result<PullRequestObject<P>> {
        self.pull_requests
            .api()
            .open(cancel, self.reference(), desired)
            .await
    }
}

/// An organization repository: a [`Repository`] plus team access.
pub struct OrgRepository<P: GitProvider> {
    repository: Repository<P>,
    team_access: ResourceClient<P::TeamAccess>,
}

impl<P: GitProvider> OrgRepository<P> {
    pub fn new(provider: &P, repository: Repository<P>) -> Self {
        Self {
            repository,
            team_access: provider.team_access(),
        }
    }

    pub fn team_access(&self) -> &ResourceClient<P::TeamAccess> {
        &self.team_access
    }

    pub fn into_repository(self) -> Repository<P> {
        self.repository
    }

    pub async fn list_team_access(&self, cancel: &CancelToken) -> Result<Vec<TeamAccessInfo>> {
        self.team_access
            .list_info(cancel, self.repository.reference())
            .await
    }

    pub async fn reconcile_team_access(
        &self,
        cancel: &CancelToken,
        team: &str,
        desired: &TeamAccessInfo,
    ) -> std::result::Result<ReconcileAction, ReconcileError> {
        let r = self.repository.reference().team_access(team);
        Ok(self.team_access.reconcile(cancel, &r, desired).await?.action)
    }

    /// Remove a team's access. Returns whether a grant existed.
    pub async fn revoke_team_access(&self, cancel: &CancelToken, team: &str) -> Result<bool> {
        let r = self.repository.reference().team_access(team);
        self.team_access.delete_if_exists(cancel, &r).await
    }
}

impl<P: GitProvider> Deref for OrgRepository<P> {
    type Target = Repository<P>;

    fn deref(&self) -> &Repository<P> {
        &self.repository
    }
}

/// A repository handle of either ownership kind.
pub enum RepositoryHandle<P: GitProvider> {
    User(UserRepository<P>),
    Organization(OrgRepository<P>),
}

impl<P: GitProvider> RepositoryHandle<P> {
    /// Fetch `r` and wrap it according to its owner.
    pub async fn open(provider: &P, cancel: &CancelToken, r: &RepositoryRef) -> Result<Self> {
        let repository = Repository::open(provider, cancel, r).await?;
        Ok(Self::wrap(provider, repository))
    }

    pub fn wrap(provider: &P, repository: Repository<P>) -> Self {
        if repository.reference().owner.is_organization() {
            Self::Organization(OrgRepository::new(provider, repository))
        } else {
            Self::User(repository)
        }
    }

    pub fn repository(&self) -> &Repository<P> {
        match self {
            Self::User(repository) => repository,
            Self::Organization(org) => &org.repository,
        }
    }

    pub fn repository_mut(&mut self) -> &mut Repository<P> {
        match self {
            Self::User(repository) => repository,
            Self::Organization(org) => &mut org.repository,
        }
    }

    pub fn as_organization(&self) -> Option<&OrgRepository<P>> {
        match self {
            Self::Organization(org) => Some(org),
            Self::User(_) => None,
        }
    }
}
