//! Stash (Bitbucket Server) REST wire types.
//!
//! Identity fields default when absent so a truncated response still
//! decodes; [`Validate`] then rejects it.

use serde::{Deserialize, Serialize};

use crate::platform::{ProviderError, Result};
use crate::reconcile::{Page, Validate, Validation, Validator};

/// Envelope of every paged Stash listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub values: Vec<T>,
    pub is_last_page: bool,
    #[serde(default)]
    pub next_page_start: Option<u64>,
}

impl<T> Paged<T> {
    /// Split into items and paging state. A page that is not the last must
    /// say where the next one starts.
    pub fn into_parts(self) -> Result<(Vec<T>, Page)> {
        let page = match (self.is_last_page, self.next_page_start) {
            (true, _) => Page::last(),
            (false, Some(next)) => Page::next(next),
            (false, None) => {
                return Err(ProviderError::api(
                    200,
                    "page is not the last but carries no nextPageStart",
                ));
            }
        };
        Ok((self.values, page))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, rename = "self", skip_serializing_if = "Vec::is_empty")]
    pub self_links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clone: Vec<Link>,
}

impl Links {
    pub fn web_url(&self) -> Option<String> {
        self.self_links.first().map(|l| l.href.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(default)]
    pub links: Links,
}

impl Validate for Project {
    fn validate(&self) -> Validation {
        Validator::new("project")
            .require("key", &self.key)
            .require("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scm_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub forkable: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub project: Project,
    #[serde(default)]
    pub links: Links,
    /// Filled from the `branches/default` endpoint, not part of the body.
    #[serde(skip)]
    pub default_branch: Option<String>,
}

impl Validate for Repository {
    fn validate(&self) -> Validation {
        Validator::new("repository")
            .require("slug", &self.slug)
            .require("name", &self.name)
            .require("project.key", &self.project.key)
            .finish()
    }
}

/// Body of repository create/update requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryWrite<'a> {
    pub name: &'a str,
    pub scm_id: &'a str,
    pub description: &'a str,
    pub public: bool,
    pub forkable: bool,
}

impl<'a> From<&'a Repository> for RepositoryWrite<'a> {
    fn from(repo: &'a Repository) -> Self {
        Self {
            name: &repo.name,
            scm_id: if repo.scm_id.is_empty() {
                "git"
            } else {
                &repo.scm_id
            },
            description: &repo.description,
            public: repo.public,
            forkable: repo.forkable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Full ref name, e.g. `refs/heads/main`.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_id: String,
    #[serde(default)]
    pub latest_commit: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Validate for Branch {
    fn validate(&self) -> Validation {
        Validator::new("branch")
            .require("id", &self.id)
            .require("displayId", &self.display_id)
            .require("latestCommit", &self.latest_commit)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub label: String,
}

/// A repository access key (`rest/keys/1.0`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    #[serde(default)]
    pub key: SshKey,
    /// `REPO_READ` or `REPO_WRITE`.
    #[serde(default)]
    pub permission: String,
}

impl Validate for AccessKey {
    fn validate(&self) -> Validation {
        Validator::new("access key")
            .require_that("key.id", self.key.id != 0)
            .require("key.text", &self.key.text)
            .require("permission", &self.permission)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub name: String,
}

impl Validate for Group {
    fn validate(&self) -> Validation {
        Validator::new("group").require("name", &self.name).finish()
    }
}

/// A group's permission on a repository or project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermission {
    #[serde(default)]
    pub group: Group,
    /// `REPO_READ`, `REPO_WRITE`, `REPO_ADMIN` (or `PROJECT_*` on projects).
    #[serde(default)]
    pub permission: String,
}

impl Validate for GroupPermission {
    fn validate(&self) -> Validation {
        Validator::new("group permission")
            .require("group.name", &self.group.name)
            .require("permission", &self.permission)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: u64,
    /// Login name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub active: bool,
}

impl Validate for User {
    fn validate(&self) -> Validation {
        Validator::new("user")
            .require("name", &self.name)
            .require("slug", &self.slug)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_id: String,
    #[serde(default)]
    pub author: Person,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub author_timestamp: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parents: Vec<Parent>,
}

impl Validate for Commit {
    fn validate(&self) -> Validation {
        Validator::new("commit")
            .require("id", &self.id)
            .require("author.name", &self.author.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefProject {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRepository {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub project: RefProject,
}

/// One side of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRef {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub display_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RefRepository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    #[serde(default)]
    pub id: u64,
    /// Optimistic-lock version, required on every write.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `OPEN`, `DECLINED` or `MERGED`.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub from_ref: PullRequestRef,
    #[serde(default)]
    pub to_ref: PullRequestRef,
    #[serde(default, skip_serializing)]
    pub links: Links,
}

impl Validate for PullRequest {
    fn validate(&self) -> Validation {
        Validator::new("pull request")
            .require_that("id", self.id != 0)
            .require("title", &self.title)
            .require("state", &self.state)
            .require("fromRef.id", &self.from_ref.id)
            .require("toRef.id", &self.to_ref.id)
            .finish()
    }
}

/// Strip `refs/heads/` from a ref id.
pub fn short_ref(id: &str) -> &str {
    id.strip_prefix("refs/heads/").unwrap_or(id)
}

/// Qualify a branch name as `refs/heads/...`.
pub fn full_ref(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("refs/heads/{name}")
    }
}
