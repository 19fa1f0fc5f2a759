//! GitHub REST v3 wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::{Validate, Validation, Validator};

/// A user or organization as embedded in other objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub id: u64,
    /// `User` or `Organization`.
    #[serde(default, rename = "type")]
    pub account_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub owner: Account,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    /// `public`, `private` or `internal`. Older servers omit it.
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl Validate for Repository {
    fn validate(&self) -> Validation {
        Validator::new("repository")
            .require("name", &self.name)
            .require("full_name", &self.full_name)
            .require("owner.login", &self.owner.login)
            .finish()
    }
}

/// Body of repository create (POST) and update (PATCH) requests.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryWrite<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<&'a str>,
}

impl<'a> RepositoryWrite<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            name: &repo.name,
            description: repo.description.as_deref(),
            private: repo.private,
            visibility: repo.visibility.as_deref(),
            default_branch: repo.default_branch.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployKey {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub read_only: bool,
}

impl Validate for DeployKey {
    fn validate(&self) -> Validation {
        Validator::new("deploy key")
            .require_that("id", self.id != 0)
            .require("key", &self.key)
            .require("title", &self.title)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Only present on `/repos/{owner}/{repo}/teams` entries.
    #[serde(default)]
    pub permission: Option<String>,
}

impl Validate for Team {
    fn validate(&self) -> Validation {
        Validator::new("team")
            .require("name", &self.name)
            .require("slug", &self.slug)
            .finish()
    }
}

/// A team as listed on a repository, carrying its permission there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamGrant(pub Team);

impl Validate for TeamGrant {
    fn validate(&self) -> Validation {
        Validator::new("team access")
            .require("slug", &self.0.slug)
            .require("permission", &self.0.permission)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    #[serde(default)]
    pub sha: String,
    #[serde(default, rename = "type")]
    pub object_type: String,
}

/// A git reference (`refs/heads/...`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(default, rename = "ref")]
    pub name: String,
    #[serde(default)]
    pub object: GitObject,
}

impl Validate for GitRef {
    fn validate(&self) -> Validation {
        Validator::new("branch")
            .require("ref", &self.name)
            .require("object.sha", &self.object.sha)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Signature,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitParent {
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub commit: CommitDetail,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Validate for Commit {
    fn validate(&self) -> Validation {
        Validator::new("commit")
            .require("sha", &self.sha)
            .require("commit.author.name", &self.commit.author.name)
            .finish()
    }
}

/// `head` or `base` of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestBranch {
    /// Branch name.
    #[serde(default, rename = "ref")]
    pub name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    /// `open` or `closed`; merged pull requests are closed with `merged_at`.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub head: PullRequestBranch,
    #[serde(default)]
    pub base: PullRequestBranch,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Validate for PullRequest {
    fn validate(&self) -> Validation {
        Validator::new("pull request")
            .require_that("number", self.number != 0)
            .require("title", &self.title)
            .require("state", &self.state)
            .require("head.ref", &self.head.name)
            .require("base.ref", &self.base.name)
            .finish()
    }
}

/// Response of `PUT /repos/{owner}/{repo}/pulls/{number}/merge`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeResult {
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for Organization {
    fn validate(&self) -> Validation {
        Validator::new("organization")
            .require("login", &self.login)
            .require_that("id", self.id != 0)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Validate for User {
    fn validate(&self) -> Validation {
        Validator::new("user")
            .require("login", &self.login)
            .require_that("id", self.id != 0)
            .finish()
    }
}

/// Response of the team membership endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Membership {
    /// `active` or `pending`.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub role: String,
}
