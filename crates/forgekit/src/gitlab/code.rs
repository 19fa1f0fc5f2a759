//! Branches, commits and merge requests.

use std::sync::Arc;

use async_trait::async_trait;
use gitlab::api::projects::merge_requests::{MergeRequest as MergeRequestEndpoint, MergeRequests};
use gitlab::api::projects::repository::branches::{Branch, Branches, CreateBranch};
use gitlab::api::projects::repository::commits::{Commit, Commits};

use super::client::built;
use super::endpoints::{AcceptMergeRequest, CreateMergeRequest, DeleteBranch, EditMergeRequest};
use super::types::{BranchCommit, GitLabBranch, GitLabCommit, MergeRequest};
use super::{GitLabClient, PROVIDER};
use crate::platform::{
    BranchInfo, BranchRef, CommitHistoryRef, CommitInfo, CommitRef, MergeMethod, ProviderError,
    PullRequestApi, PullRequestInfo, PullRequestRef, RepositoryRef, Result, ResultExt,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, ListApi, ListOptions, Page, ResourceApi, UpdateApi,
};

#[derive(Debug, Clone)]
pub struct GitLabBranches {
    client: Arc<GitLabClient>,
}

impl GitLabBranches {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitLabBranches {
    type Ref = BranchRef;
    type Info = BranchInfo;
    type Object = GitLabBranch;

    fn kind(&self) -> &'static str {
        "branch"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &BranchRef) -> Result<GitLabBranch> {
        let project = r.repository.full_name();
        let endpoint = built(
            Branch::builder()
                .project(project.as_str())
                .branch(r.name.as_str())
                .build(),
        )?;
        self.client.query(cancel, endpoint).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabBranches {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        _options: ListOptions,
    ) -> Result<(Vec<GitLabBranch>, Page)> {
        let project = repository.full_name();
        let endpoint = built(Branches::builder().project(project.as_str()).build())?;
        let branches: Vec<GitLabBranch> = self
            .client
            .query_all(cancel, endpoint)
            .await
            .for_resource(repository)?;
        Ok((branches, Page::last()))
    }
}

#[async_trait]
impl CreateApi for GitLabBranches {
    fn new_object(&self, r: &BranchRef, info: &BranchInfo) -> Result<GitLabBranch> {
        let Some(sha) = &info.sha else {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no start commit was given"
            )));
        };
        Ok(GitLabBranch {
            name: r.name.clone(),
            commit: BranchCommit { id: sha.clone() },
            ..Default::default()
        })
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &BranchRef,
        object: &GitLabBranch,
    ) -> Result<GitLabBranch> {
        let project = r.repository.full_name();
        let endpoint = built(
            CreateBranch::builder()
                .project(project.as_str())
                .branch(object.name.as_str())
                .ref_(object.commit.id.as_str())
                .build(),
        )?;
        self.client
            .query(cancel, endpoint)
            .await
            .for_resource(&r.repository)
    }
}

#[async_trait]
impl UpdateApi for GitLabBranches {
    async fn update_one(
        &self,
        _cancel: &CancelToken,
        _r: &BranchRef,
        _object: &GitLabBranch,
    ) -> Result<GitLabBranch> {
        Err(ProviderError::unsupported(PROVIDER, "moving a branch"))
    }
}

#[async_trait]
impl DeleteApi for GitLabBranches {
    async fn delete_one(&self, cancel: &CancelToken, r: &BranchRef) -> Result<()> {
        let project = r.repository.full_name();
        let delete = DeleteBranch {
            project: &project,
            branch: &r.name,
        };
        self.client.ignore(cancel, delete).await.for_resource(r)
    }
}

#[derive(Debug, Clone)]
pub struct GitLabCommits {
    client: Arc<GitLabClient>,
}

impl GitLabCommits {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitLabCommits {
    type Ref = CommitRef;
    type Info = CommitInfo;
    type Object = GitLabCommit;

    fn kind(&self) -> &'static str {
        "commit"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &CommitRef) -> Result<GitLabCommit> {
        let project = r.repository.full_name();
        let endpoint = built(
            Commit::builder()
                .project(project.as_str())
                .commit(r.sha.as_str())
                .build(),
        )?;
        self.client.query(cancel, endpoint).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabCommits {
    type Parent = CommitHistoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        history: &CommitHistoryRef,
        _options: ListOptions,
    ) -> Result<(Vec<GitLabCommit>, Page)> {
        let project = history.branch.repository.full_name();
        let endpoint = built(
            Commits::builder()
                .project(project.as_str())
                .ref_name(history.branch.name.as_str())
                .build(),
        )?;
        let commits: Vec<GitLabCommit> = self
            .client
            .query_all(cancel, endpoint)
            .await
            .for_resource(&history.branch)?;
        Ok((commits, Page::last()))
    }
}

/// Merge requests, exposed as pull requests.
#[derive(Debug, Clone)]
pub struct GitLabMergeRequests {
    client: Arc<GitLabClient>,
}

impl GitLabMergeRequests {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitLabMergeRequests {
    type Ref = PullRequestRef;
    type Info = PullRequestInfo;
    type Object = MergeRequest;

    fn kind(&self) -> &'static str {
        "merge request"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &PullRequestRef) -> Result<MergeRequest> {
        let project = r.repository.full_name();
        let endpoint = built(
            MergeRequestEndpoint::builder()
                .project(project.as_str())
                .merge_request(r.number)
                .build(),
        )?;
        self.client.query(cancel, endpoint).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabMergeRequests {
    type Parent = RepositoryRef;

    /// Every state: without a `state` filter GitLab returns all of them.
    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        _options: ListOptions,
    ) -> Result<(Vec<MergeRequest>, Page)> {
        let project = repository.full_name();
        let endpoint = built(MergeRequests::builder().project(project.as_str()).build())?;
        let requests: Vec<MergeRequest> = self
            .client
            .query_all(cancel, endpoint)
            .await
            .for_resource(repository)?;
        Ok((requests, Page::last()))
    }
}

#[async_trait]
impl UpdateApi for GitLabMergeRequests {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        object: &MergeRequest,
    ) -> Result<MergeRequest> {
        let current = self.fetch_one(cancel, r).await?;
        if current.source_branch != object.source_branch {
            return Err(ProviderError::unsupported(
                PROVIDER,
                "changing the source branch of a merge request",
            ));
        }
        let project = r.repository.full_name();
        let edit = EditMergeRequest {
            project: &project,
            iid: r.number,
            title: &object.title,
            description: object.description.as_deref(),
            target_branch: &object.target_branch,
        };
        self.client.query(cancel, edit).await.for_resource(r)
    }
}

#[async_trait]
impl PullRequestApi for GitLabMergeRequests {
    async fn open(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        info: &PullRequestInfo,
    ) -> Result<MergeRequest> {
        let (Some(title), Some(source), Some(target)) =
            (&info.title, &info.source_branch, &info.target_branch)
        else {
            return Err(ProviderError::invalid_info(
                "opening a merge request needs a title, a source and a target branch",
            ));
        };
        let project = repository.full_name();
        let create = CreateMergeRequest {
            project: &project,
            title,
            description: info.description.as_deref().unwrap_or_default(),
            source_branch: source,
            target_branch: target,
        };
        self.client
            .query(cancel, create)
            .await
            .for_resource(repository)
    }

    /// Rebase merges are a project setting on GitLab, not a per-request choice.
    async fn merge(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        method: MergeMethod,
        message: Option<&str>,
    ) -> Result<MergeRequest> {
        let squash = match method {
            MergeMethod::Merge => false,
            MergeMethod::Squash => true,
            MergeMethod::Rebase => {
                return Err(ProviderError::unsupported(PROVIDER, "rebase merges"));
            }
        };
        let project = r.repository.full_name();
        let accept = AcceptMergeRequest {
            project: &project,
            iid: r.number,
            squash,
            message,
        };
        self.client
            .query(cancel, accept)
            .await
            .with_context(|| format!("merging {r}"))
    }
}
