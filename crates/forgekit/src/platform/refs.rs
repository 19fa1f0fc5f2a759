//! Resource identities.
//!
//! A ref names a resource inside a provider's namespace and is the lookup key
//! for every operation. Refs are plain values: build one, then only read it.

use std::fmt;

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRef {
    pub login: String,
}

impl UserRef {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {}", self.login)
    }
}

/// An organization (GitHub org, GitLab group, Stash project).
///
/// `path` may contain `/`-separated subgroups on GitLab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrganizationRef {
    pub path: String,
}

impl OrganizationRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for OrganizationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "organization {}", self.path)
    }
}

/// The owner of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerRef {
    User(UserRef),
    Organization(OrganizationRef),
}

impl OwnerRef {
    pub fn user(login: impl Into<String>) -> Self {
        Self::User(UserRef::new(login))
    }

    pub fn organization(path: impl Into<String>) -> Self {
        Self::Organization(OrganizationRef::new(path))
    }

    /// The owner's login or organization path.
    pub fn name(&self) -> &str {
        match self {
            Self::User(user) => &user.login,
            Self::Organization(org) => &org.path,
        }
    }

    #[inline]
    pub fn is_organization(&self) -> bool {
        matches!(self, Self::Organization(_))
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(user) => user.fmt(f),
            Self::Organization(org) => org.fmt(f),
        }
    }
}

/// A repository, owned by a user or an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: OwnerRef,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: OwnerRef, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    /// `owner/name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.name(), self.name)
    }

    pub fn deploy_key(&self, name: impl Into<String>) -> DeployKeyRef {
        DeployKeyRef {
            repository: self.clone(),
            name: name.into(),
        }
    }

    pub fn team_access(&self, team: impl Into<String>) -> TeamAccessRef {
        TeamAccessRef {
            repository: self.clone(),
            team: team.into(),
        }
    }

    pub fn branch(&self, name: impl Into<String>) -> BranchRef {
        BranchRef {
            repository: self.clone(),
            name: name.into(),
        }
    }

    pub fn commit(&self, sha: impl Into<String>) -> CommitRef {
        CommitRef {
            repository: self.clone(),
            sha: sha.into(),
        }
    }

    pub fn pull_request(&self, number: u64) -> PullRequestRef {
        PullRequestRef {
            repository: self.clone(),
            number,
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repository {}", self.full_name())
    }
}

/// A deploy key of a repository, identified by its name/title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeployKeyRef {
    pub repository: RepositoryRef,
    pub name: String,
}

impl fmt::Display for DeployKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deploy key {} of {}",
            self.name,
            self.repository.full_name()
        )
    }
}

/// A team's (group's) access grant on a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TeamAccessRef {
    pub repository: RepositoryRef,
    pub team: String,
}

impl fmt::Display for TeamAccessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "team access {} on {}",
            self.team,
            self.repository.full_name()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchRef {
    pub repository: RepositoryRef,
    pub name: String,
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch {} of {}", self.name, self.repository.full_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitRef {
    pub repository: RepositoryRef,
    pub sha: String,
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "commit {} of {}", self.sha, self.repository.full_name())
    }
}

/// The commit history of one branch, used as the parent of commit lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitHistoryRef {
    pub branch: BranchRef,
}

impl fmt::Display for CommitHistoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "history of {}", self.branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub repository: RepositoryRef,
    pub number: u64,
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pull request #{} of {}",
            self.number,
            self.repository.full_name()
        )
    }
}

/// A team (GitHub team, GitLab subgroup, Stash group).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TeamRef {
    pub organization: OrganizationRef,
    pub name: String,
}

impl TeamRef {
    pub fn new(organization: OrganizationRef, name: impl Into<String>) -> Self {
        Self {
            organization,
            name: name.into(),
        }
    }
}

impl fmt::Display for TeamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {} of {}", self.name, self.organization.path)
    }
}

/// Parent of provider-wide listings (all organizations, all users).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProviderRoot;

impl fmt::Display for ProviderRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("provider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_ref_full_name_uses_owner_name() {
        let user_repo = RepositoryRef::new(OwnerRef::user("alice"), "dotfiles");
        assert_eq!(user_repo.full_name(), "alice/dotfiles");

        let org_repo = RepositoryRef::new(OwnerRef::organization("platform/infra"), "tools");
        assert_eq!(org_repo.full_name(), "platform/infra/tools");
        assert!(org_repo.owner.is_organization());
    }

    #[test]
    fn child_refs_keep_the_repository() {
        let repo = RepositoryRef::new(OwnerRef::organization("acme"), "api");
        let key = repo.deploy_key("ci");
        assert_eq!(key.repository, repo);
        assert_eq!(key.to_string(), "deploy key ci of acme/api");
        assert_eq!(
            repo.pull_request(7).to_string(),
            "pull request #7 of acme/api"
        );
    }
}
