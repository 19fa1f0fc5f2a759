//! Declarative "info" shapes of the unified domain model.
//!
//! Every field is optional. `None` means "don't care": the field is neither
//! compared during reconciliation nor written during an update.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ProviderError, Result};

/// A declarative, partial description of a resource.
pub trait DesiredInfo: Clone + fmt::Debug + Send + Sync + 'static {
    /// Whether `actual` agrees with every field set in `self`.
    fn matches(&self, actual: &Self) -> bool;

    /// Reject desired states that can never be written.
    fn validate_info(&self) -> Result<()> {
        Ok(())
    }
}

/// Compare one optional desired field against the actual value.
#[inline]
fn field_matches<T: PartialEq>(desired: &Option<T>, actual: &Option<T>) -> bool {
    match desired {
        Some(want) => actual.as_ref() == Some(want),
        None => true,
    }
}

/// Repository visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "internal" => Ok(Self::Internal),
            "private" => Ok(Self::Private),
            other => Err(ProviderError::invalid_info(format!(
                "unknown visibility `{other}`"
            ))),
        }
    }
}

/// Permission level a team holds on a repository.
///
/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Triage => "triage",
            Self::Push => "push",
            Self::Maintain => "maintain",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pull" | "read" => Ok(Self::Pull),
            "triage" => Ok(Self::Triage),
            "push" | "write" => Ok(Self::Push),
            "maintain" => Ok(Self::Maintain),
            "admin" => Ok(Self::Admin),
            other => Err(ProviderError::invalid_info(format!(
                "unknown permission `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub description: Option<String>,
    pub default_branch: Option<String>,
    pub visibility: Option<Visibility>,
}

impl DesiredInfo for RepositoryInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.description, &actual.description)
            && field_matches(&self.default_branch, &actual.default_branch)
            && field_matches(&self.visibility, &actual.visibility)
    }

    fn validate_info(&self) -> Result<()> {
        if let Some(branch) = &self.default_branch
            && branch.trim().is_empty()
        {
            return Err(ProviderError::invalid_info("default branch cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployKeyInfo {
    /// Public key material, e.g. `ssh-ed25519 AAAA...`.
    pub key: Option<String>,
    pub read_only: Option<bool>,
}

impl DesiredInfo for DeployKeyInfo {
    fn matches(&self, actual: &Self) -> bool {
        let key_matches = match (&self.key, &actual.key) {
            (Some(want), Some(have)) => normalize_key(want) == normalize_key(have),
            (Some(_), None) => false,
            (None, _) => true,
        };
        key_matches && field_matches(&self.read_only, &actual.read_only)
    }

    fn validate_info(&self) -> Result<()> {
        if let Some(key) = &self.key
            && key.split_whitespace().count() < 2
        {
            return Err(ProviderError::invalid_info(
                "deploy key must be `<type> <base64> [comment]`",
            ));
        }
        Ok(())
    }
}

/// Strip the trailing comment of an OpenSSH public key.
///
/// Providers store keys with or without the comment, so only type and key
/// body take part in comparisons.
pub fn normalize_key(key: &str) -> String {
    key.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAccessInfo {
    pub permission: Option<Permission>,
}

impl DesiredInfo for TeamAccessInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.permission, &actual.permission)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Commit the branch points at.
    pub sha: Option<String>,
}

impl DesiredInfo for BranchInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.sha, &actual.sha)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        })
    }
}

/// Merge strategy when merging a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    /// Read-only: ignored on write.
    pub state: Option<PullRequestState>,
    /// Read-only: ignored on write.
    pub web_url: Option<String>,
}

impl DesiredInfo for PullRequestInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.title, &actual.title)
            && field_matches(&self.description, &actual.description)
            && field_matches(&self.source_branch, &actual.source_branch)
            && field_matches(&self.target_branch, &actual.target_branch)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: Option<String>,
    pub message: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub authored_at: Option<DateTime<Utc>>,
    pub parents: Vec<String>,
    pub web_url: Option<String>,
}

impl DesiredInfo for CommitInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.sha, &actual.sha) && field_matches(&self.message, &actual.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub login: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl DesiredInfo for UserInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.login, &actual.login)
            && field_matches(&self.name, &actual.name)
            && field_matches(&self.email, &actual.email)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DesiredInfo for OrganizationInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.name, &actual.name)
            && field_matches(&self.description, &actual.description)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DesiredInfo for TeamInfo {
    fn matches(&self, actual: &Self) -> bool {
        field_matches(&self.name, &actual.name)
            && field_matches(&self.description, &actual.description)
    }
}
