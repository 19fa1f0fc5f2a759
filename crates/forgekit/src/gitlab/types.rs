//! GitLab API v4 data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::{Validate, Validation, Validator};

/// GitLab namespace (group or user).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabNamespace {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// Full path (e.g., "group/subgroup").
    #[serde(default)]
    pub full_path: String,
    /// Kind: "group" or "user".
    #[serde(default)]
    pub kind: String,
}

/// A group a project is shared with, as embedded in the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedGroup {
    #[serde(default)]
    pub group_id: u64,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub group_full_path: String,
    #[serde(default)]
    pub group_access_level: u8,
}

impl Validate for SharedGroup {
    fn validate(&self) -> Validation {
        Validator::new("team access")
            .require("group_full_path", &self.group_full_path)
            .require_that("group_access_level", self.group_access_level != 0)
            .finish()
    }
}

/// GitLab project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabProject {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Project path (slug).
    #[serde(default)]
    pub path: String,
    /// Full path including namespace (e.g., "group/subgroup/project").
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Unset on empty repositories.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Visibility level: "public", "private", or "internal".
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub namespace: GitLabNamespace,
    #[serde(default)]
    pub shared_with_groups: Vec<SharedGroup>,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl Validate for GitLabProject {
    fn validate(&self) -> Validation {
        Validator::new("project")
            .require("path", &self.path)
            .require("path_with_namespace", &self.path_with_namespace)
            .require("visibility", &self.visibility)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabDeployKey {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub can_push: bool,
}

impl Validate for GitLabDeployKey {
    fn validate(&self) -> Validation {
        Validator::new("deploy key")
            .require_that("id", self.id != 0)
            .require("title", &self.title)
            .require("key", &self.key)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCommit {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabBranch {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub commit: BranchCommit,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub protected: bool,
}

impl Validate for GitLabBranch {
    fn validate(&self) -> Validation {
        Validator::new("branch")
            .require("name", &self.name)
            .require("commit.id", &self.commit.id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabCommit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub authored_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl Validate for GitLabCommit {
    fn validate(&self) -> Validation {
        Validator::new("commit")
            .require("id", &self.id)
            .require("author_name", &self.author_name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Project-scoped number.
    #[serde(default)]
    pub iid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `opened`, `closed`, `locked` or `merged`.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

impl Validate for MergeRequest {
    fn validate(&self) -> Validation {
        Validator::new("merge request")
            .require_that("iid", self.iid != 0)
            .require("title", &self.title)
            .require("state", &self.state)
            .require("source_branch", &self.source_branch)
            .require("target_branch", &self.target_branch)
            .finish()
    }
}

/// GitLab group information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabGroup {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// Full path (e.g., "parent/child").
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for GitLabGroup {
    fn validate(&self) -> Validation {
        Validator::new("group")
            .require_that("id", self.id != 0)
            .require("full_path", &self.full_path)
            .finish()
    }
}

/// A subgroup acting as a team of its parent group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subgroup(pub GitLabGroup);

impl Validate for Subgroup {
    fn validate(&self) -> Validation {
        self.0.validate()
    }
}

/// GitLab user information. Also the shape of group member entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabUser {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Only visible to administrators or the user themselves.
    #[serde(default)]
    pub email: Option<String>,
    /// Present on member entries.
    #[serde(default)]
    pub access_level: Option<u8>,
}

impl Validate for GitLabUser {
    fn validate(&self) -> Validation {
        Validator::new("user")
            .require_that("id", self.id != 0)
            .require("username", &self.username)
            .finish()
    }
}
