//! Branches (git refs), commits and pull requests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::pagination::fetch_page;
use super::types::{Commit, GitObject, GitRef, MergeResult, PullRequest};
use super::{GitHubClient, PROVIDER, repo_path};
use crate::platform::{
    BranchInfo, BranchRef, CommitHistoryRef, CommitInfo, CommitRef, MergeMethod, ProviderError,
    PullRequestApi, PullRequestInfo, PullRequestRef, RepositoryRef, Result, ResultExt,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, ListApi, ListOptions, Page, ResourceApi, UpdateApi,
};
use crate::rest::encode_segment;

/// `{repo}/git/{kind}/heads/{name}`, keeping the `/` of nested branch names.
fn head_path(r: &BranchRef, kind: &str) -> String {
    let name: Vec<String> = r.name.split('/').map(encode_segment).collect();
    format!(
        "{}/git/{kind}/heads/{}",
        repo_path(&r.repository),
        name.join("/")
    )
}

#[derive(Debug, Clone)]
pub struct GitHubBranches {
    client: Arc<GitHubClient>,
}

impl GitHubBranches {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubBranches {
    type Ref = BranchRef;
    type Info = BranchInfo;
    type Object = GitRef;

    fn kind(&self) -> &'static str {
        "branch"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &BranchRef) -> Result<GitRef> {
        self.client
            .get(cancel, &head_path(r, "ref"))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubBranches {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<GitRef>, Page)> {
        let path = format!("{}/git/matching-refs/heads", repo_path(repository));
        fetch_page(&self.client, cancel, &path, options, &[])
            .await
            .for_resource(repository)
    }
}

#[async_trait]
impl CreateApi for GitHubBranches {
    fn new_object(&self, r: &BranchRef, info: &BranchInfo) -> Result<GitRef> {
        let Some(sha) = &info.sha else {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no start commit was given"
            )));
        };
        Ok(GitRef {
            name: format!("refs/heads/{}", r.name),
            object: GitObject {
                sha: sha.clone(),
                object_type: "commit".to_string(),
            },
        })
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &BranchRef,
        object: &GitRef,
    ) -> Result<GitRef> {
        let body = json!({"ref": object.name, "sha": object.object.sha});
        self.client
            .post(cancel, &format!("{}/git/refs", repo_path(&r.repository)), &body)
            .await
            .for_resource(&r.repository)
    }
}

#[async_trait]
impl UpdateApi for GitHubBranches {
    /// Fast-forward only: the server rejects moves that would drop commits.
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &BranchRef,
        object: &GitRef,
    ) -> Result<GitRef> {
        let body = json!({"sha": object.object.sha, "force": false});
        self.client
            .patch(cancel, &head_path(r, "refs"), &body)
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl DeleteApi for GitHubBranches {
    async fn delete_one(&self, cancel: &CancelToken, r: &BranchRef) -> Result<()> {
        self.client
            .delete(cancel, &head_path(r, "refs"))
            .await
            .for_resource(r)
    }
}

#[derive(Debug, Clone)]
pub struct GitHubCommits {
    client: Arc<GitHubClient>,
}

impl GitHubCommits {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubCommits {
    type Ref = CommitRef;
    type Info = CommitInfo;
    type Object = Commit;

    fn kind(&self) -> &'static str {
        "commit"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &CommitRef) -> Result<Commit> {
        let path = format!(
            "{}/commits/{}",
            repo_path(&r.repository),
            encode_segment(&r.sha)
        );
        self.client.get(cancel, &path).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubCommits {
    type Parent = CommitHistoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        history: &CommitHistoryRef,
        options: ListOptions,
    ) -> Result<(Vec<Commit>, Page)> {
        let path = format!("{}/commits", repo_path(&history.branch.repository));
        fetch_page(
            &self.client,
            cancel,
            &path,
            options,
            &[("sha", history.branch.name.clone())],
        )
        .await
        .for_resource(&history.branch)
    }
}

fn pull_path(r: &PullRequestRef) -> String {
    format!("{}/pulls/{}", repo_path(&r.repository), r.number)
}

fn merge_method(method: MergeMethod) -> &'static str {
    match method {
        MergeMethod::Merge => "merge",
        MergeMethod::Squash => "squash",
        MergeMethod::Rebase => "rebase",
    }
}

#[derive(Debug, Clone)]
pub struct GitHubPullRequests {
    client: Arc<GitHubClient>,
}

impl GitHubPullRequests {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubPullRequests {
    type Ref = PullRequestRef;
    type Info = PullRequestInfo;
    type Object = PullRequest;

    fn kind(&self) -> &'static str {
        "pull request"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &PullRequestRef) -> Result<PullRequest> {
        self.client.get(cancel, &pull_path(r)).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubPullRequests {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<PullRequest>, Page)> {
        let path = format!("{}/pulls", repo_path(repository));
        fetch_page(
            &self.client,
            cancel,
            &path,
            options,
            &[("state", "all".to_string())],
        )
        .await
        .for_resource(repository)
    }
}

#[async_trait]
impl UpdateApi for GitHubPullRequests {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        object: &PullRequest,
    ) -> Result<PullRequest> {
        let current = self.fetch_one(cancel, r).await?;
        if current.head.name != object.head.name {
            return Err(ProviderError::unsupported(
                PROVIDER,
                "changing the source branch of a pull request",
            ));
        }
        let body = json!({
            "title": object.title,
            "body": object.body,
            "base": object.base.name,
        });
        self.client
            .patch(cancel, &pull_path(r), &body)
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl PullRequestApi for GitHubPullRequests {
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
            "body": info.description.clone().unwrap_or_default(),
            "head": source,
            "base": target,
        });
        self.client
            .post(cancel, &format!("{}/pulls", repo_path(repository)), &body)
            .await
            .for_resource(repository)
    }

    /// The merge endpoint answers with a status object; the pull request is
    /// fetched again afterwards.
    async fn merge(
        &self,
        cancel: &CancelToken,
        r: &PullRequestRef,
        method: MergeMethod,
        message: Option<&str>,
    ) -> Result<PullRequest> {
        let mut body = json!({"merge_method": merge_method(method)});
        if let Some(message) = message {
            body["commit_message"] = Value::String(message.to_string());
        }
        let result: MergeResult = self
            .client
            .put(cancel, &format!("{}/merge", pull_path(r)), &body)
            .await
            .with_context(|| format!("merging {r}"))?;
        tracing::debug!(resource = %r, merged = result.merged, "{}", result.message);
        self.fetch_one(cancel, r).await
    }
}
