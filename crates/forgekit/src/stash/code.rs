//! Branches, commits and pull requests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::types::{Branch, Commit, PullRequest, full_ref};
use super::{BRANCH_UTILS_API, PROVIDER, fetch_paged, find_paged, project_key, repo_path};
use crate::http::HttpMethod;
use crate::platform::{
    BranchInfo, BranchRef, CommitHistoryRef, CommitInfo, CommitRef, MergeMethod, ProviderError,
    PullRequestApi, PullRequestInfo, PullRequestRef, RepositoryRef, Result, ResultExt,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, ListApi, ListOptions, Page, ResourceApi, UpdateApi,
};
use crate::rest::{RestClient, query};

#[derive(Debug, Clone)]
pub struct StashBranches {
    rest: Arc<RestClient>,
}

impl StashBranches {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ResourceApi for StashBranches {
    type Ref = BranchRef;
    type Info = BranchInfo;
    type Object = Branch;

    fn kind(&self) -> &'static str {
        "branch"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &BranchRef) -> Result<Branch> {
        find_paged(
            &self.rest,
            cancel,
            &format!("{}/branches", repo_path(&r.repository)),
            &[("filterText", r.name.clone())],
            r,
            |branch: &Branch| branch.display_id == r.name,
        )
        .await
        .for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashBranches {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<Branch>, Page)> {
        let path = format!("{}/branches", repo_path(repository));
        fetch_paged(&self.rest, cancel, &path, options, &[])
            .await
            .for_resource(repository)
    }
}

#[async_trait]
impl CreateApi for StashBranches {
    fn new_object(&self, r: &BranchRef, info: &BranchInfo) -> Result<Branch> {
        let Some(sha) = &info.sha else {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no start commit was given"
            )));
        };
        Ok(Branch {
            id: full_ref(&r.name),
            display_id: r.name.clone(),
            latest_commit: sha.clone(),
            is_default: false,
        })
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &BranchRef,
        object: &Branch,
    ) -> Result<Branch> {
        let path = format!(
            "{BRANCH_UTILS_API}/projects/{}/repos/{}/branches",
            project_key(&r.repository.owner),
            r.repository.name
        );
        let body = json!({"name": r.name, "startPoint": object.latest_commit});
        self.rest
            .post(cancel, &path, &body)
            .await
            .for_resource(&r.repository)
    }
}

#[async_trait]
impl UpdateApi for StashBranches {
    async fn update_one(
        &self,
        _cancel: &CancelToken,
        _r: &BranchRef,
        _object: &Branch,
    ) -> Result<Branch> {
        Err(ProviderError::unsupported(PROVIDER, "moving a branch"))
    }
}

#[async_trait]
impl DeleteApi for StashBranches {
    async fn delete_one(&self, cancel: &CancelToken, r: &BranchRef) -> Result<()> {
        let branch = self.fetch_one(cancel, r).await?;
        let path = format!(
            "{BRANCH_UTILS_API}/projects/{}/repos/{}/branches",
            project_key(&r.repository.owner),
            r.repository.name
        );
        self.rest
            .send_ignoring_body(
                cancel,
                HttpMethod::Delete,
                &path,
                Some(&json!({"name": branch.id, "dryRun": false})),
            )
            .await
            .for_resource(r)
    }
}

#[derive(Debug, Clone)]
pub struct StashCommits {
    rest: Arc<RestClient>,
}

impl StashCommits {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ResourceApi for StashCommits {
    type Ref = CommitRef;
    type Info = CommitInfo;
    type Object = Commit;

    fn kind(&self) -> &'static str {
        "commit"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &CommitRef) -> Result<Commit> {
        let path = format!("{}/commits/{}", repo_path(&r.repository), r.sha);
        self.rest.get(cancel, &path).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashCommits {
    type Parent = CommitHistoryRef;

    /// Newest first, starting at the branch head.
    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        history: &CommitHistoryRef,
        options: ListOptions,
    ) -> Result<(Vec<Commit>, Page)> {
        let path = format!("{}/commits", repo_path(&history.branch.repository));
        fetch_paged(
            &self.rest,
            cancel,
            &path,
            options,
            &[("until", full_ref(&history.branch.name))],
        )
        .await
        .for_resource(&history.branch)
    }
}

#[derive(Debug, Clone)]
pub struct StashPullRequests {
    rest: Arc<RestClient>,
}

fn pull_request_path(r: &PullRequestRef) -> String {
    format!("{}/pull-requests/{}", repo_path(&r.repository), r.number)
}

fn ref_body(repository: &RepositoryRef, branch: &str) -> Value {
    json!({
        "id": full_ref(branch),
        "repository": {
            "slug": repository.name,
            "project": {"key": project_key(&repository.owner)},
        },
    })
}

fn strategy_id(method: MergeMethod) -> &'static str {
    match method {
        MergeMethod::Merge => "no-ff",
        MergeMethod::Squash => "squash",
        MergeMethod::Rebase => "rebase-no-ff",
    }
}

impl StashPullRequests {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ResourceApi for StashPullRequests {
    type Ref = PullRequestRef;
    type Info = PullRequestInfo;
    type Object = PullRequest;

    fn kind(&self) -> &'static str {
        "pull request"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &PullRequestRef) -> Result<PullRequest> {
        self.rest
            .get(cancel, &pull_request_path(r))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashPullRequests {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<PullRequest>, Page)> {
        let path = format!("{}/pull-requests", repo_path(repository));
        fetch_paged(
            &self.rest,
            cancel,
            &path,
            options,
            &[("state", "ALL".to_string())],
        )
        .await
        .for_resource(repository)
    }
}

#[async_trait]
impl UpdateApi for StashPullRequests {
    /// Writes title, description and target branch against the current
    /// version. The source branch of an open pull request is fixed.
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        object: &PullRequest,
    ) -> Result<PullRequest> {
        let current = self.fetch_one(cancel, r).await?;
        if current.from_ref.id != object.from_ref.id {
            return Err(ProviderError::unsupported(
                PROVIDER,
                "changing the source branch of a pull request",
            ));
        }
        let body = json!({
            "version": current.version,
            "title": object.title,
            "description": object.description,
            "toRef": {"id": object.to_ref.id},
        });
        self.rest
            .put(cancel, &pull_request_path(r), &body)
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl PullRequestApi for StashPullRequests {
    async fn open(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        info: &PullRequestInfo,
    ) -> Result<PullRequest> {
        let (Some(title), Some(source), Some(target)) =
            (&info.title, &info.source_branch, &info.target_branch)
        else {
            return Err(ProviderError::invalid_info(
                "opening a pull request needs a title, a source and a target branch",
            ));
        };
        let body = json!({
            "title": title,
            "description": info.description.clone().unwrap_or_default(),
            "fromRef": ref_body(repository, source),
            "toRef": ref_body(repository, target),
        });
        let path = format!("{}/pull-requests", repo_path(repository));
        self.rest
            .post(cancel, &path, &body)
            .await
            .for_resource(repository)
    }

    async fn merge(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        method: MergeMethod,
        message: Option<&str>,
    ) -> Result<PullRequest> {
        let current = self.fetch_one(cancel, r).await?;
        let path = format!(
            "{}/merge{}",
            pull_request_path(r),
            query(&[("version", current.version.to_string())])
        );
        let mut body = json!({"strategyId": strategy_id(method)});
        if let Some(message) = message {
            body["message"] = Value::String(message.to_string());
        }
        self.rest
            .post(cancel, &path, &body)
            .await
            .with_context(|| format!("merging {r}"))
    }
}
