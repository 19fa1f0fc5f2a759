//! GitLab object <-> unified info conversions.

use super::types::{
    GitLabBranch, GitLabCommit, GitLabDeployKey, GitLabGroup, GitLabProject, GitLabUser,
    MergeRequest, SharedGroup, Subgroup,
};
use crate::platform::{
    BranchInfo, CommitInfo, DeployKeyInfo, OrganizationInfo, Permission, PullRequestInfo,
    PullRequestState, RepositoryInfo, TeamAccessInfo, TeamInfo, UserInfo,
};
use crate::reconcile::InfoMapper;

pub const REPORTER: u8 = 20;
pub const DEVELOPER: u8 = 30;
pub const MAINTAINER: u8 = 40;
pub const OWNER: u8 = 50;

/// GitLab access level to the unified permission.
pub fn permission_from_level(level: u8) -> Option<Permission> {
    match level {
        REPORTER => Some(Permission::Pull),
        DEVELOPER => Some(Permission::Push),
        MAINTAINER => Some(Permission::Maintain),
        OWNER => Some(Permission::Admin),
        _ => None,
    }
}

/// Unified permission to a GitLab access level.
///
/// Triage has no GitLab equivalent; callers reject it first.
pub fn permission_to_level(permission: Permission) -> u8 {
    match permission {
        Permission::Pull | Permission::Triage => REPORTER,
        Permission::Push => DEVELOPER,
        Permission::Maintain => MAINTAINER,
        Permission::Admin => OWNER,
    }
}

impl InfoMapper for GitLabProject {
    type Info = RepositoryInfo;

    fn display_name(&self) -> String {
        self.path.clone()
    }

    fn to_info(&self) -> RepositoryInfo {
        RepositoryInfo {
            description: Some(self.description.clone().unwrap_or_default()),
            default_branch: self.default_branch.clone(),
            visibility: self.visibility.parse().ok(),
        }
    }

    fn apply_info(&mut self, info: &RepositoryInfo) {
        if let Some(description) = &info.description {
            self.description = Some(description.clone());
        }
        if let Some(branch) = &info.default_branch {
            self.default_branch = Some(branch.clone());
        }
        if let Some(visibility) = info.visibility {
            self.visibility = visibility.as_str().to_string();
        }
    }
}

impl InfoMapper for GitLabDeployKey {
    type Info = DeployKeyInfo;

    fn display_name(&self) -> String {
        self.title.clone()
    }

    fn to_info(&self) -> DeployKeyInfo {
        DeployKeyInfo {
            key: Some(self.key.clone()),
            read_only: Some(!self.can_push),
        }
    }

    fn apply_info(&mut self, info: &DeployKeyInfo) {
        if let Some(key) = &info.key {
            self.key = key.clone();
        }
        if let Some(read_only) = info.read_only {
            self.can_push = !read_only;
        }
    }
}

impl InfoMapper for SharedGroup {
    type Info = TeamAccessInfo;

    fn display_name(&self) -> String {
        self.group_full_path.clone()
    }

    fn to_info(&self) -> TeamAccessInfo {
        TeamAccessInfo {
            permission: permission_from_level(self.group_access_level),
        }
    }

    fn apply_info(&mut self, info: &TeamAccessInfo) {
        if let Some(permission) = info.permission {
            self.group_access_level = permission_to_level(permission);
        }
    }
}

impl InfoMapper for GitLabBranch {
    type Info = BranchInfo;

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn to_info(&self) -> BranchInfo {
        BranchInfo {
            sha: Some(self.commit.id.clone()),
        }
    }

    fn apply_info(&mut self, info: &BranchInfo) {
        if let Some(sha) = &info.sha {
            self.commit.id = sha.clone();
        }
    }
}

impl InfoMapper for GitLabCommit {
    type Info = CommitInfo;

    fn display_name(&self) -> String {
        self.id.clone()
    }

    fn to_info(&self) -> CommitInfo {
        CommitInfo {
            sha: Some(self.id.clone()),
            message: Some(self.message.clone()),
            author: Some(self.author_name.clone()),
            author_email: self.author_email.clone(),
            authored_at: self.authored_date,
            parents: self.parent_ids.clone(),
            web_url: self.web_url.clone(),
        }
    }

    fn apply_info(&mut self, info: &CommitInfo) {
        if let Some(sha) = &info.sha {
            self.id = sha.clone();
        }
        if let Some(message) = &info.message {
            self.message = message.clone();
        }
    }
}

impl InfoMapper for MergeRequest {
    type Info = PullRequestInfo;

    fn display_name(&self) -> String {
        format!("!{}", self.iid)
    }

    fn to_info(&self) -> PullRequestInfo {
        let state = match self.state.as_str() {
            "opened" => Some(PullRequestState::Open),
            "closed" | "locked" => Some(PullRequestState::Closed),
            "merged" => Some(PullRequestState::Merged),
            _ => None,
        };
        PullRequestInfo {
            title: Some(self.title.clone()),
            description: Some(self.description.clone().unwrap_or_default()),
            source_branch: Some(self.source_branch.clone()),
            target_branch: Some(self.target_branch.clone()),
            state,
            web_url: self.web_url.clone(),
        }
    }

    fn apply_info(&mut self, info: &PullRequestInfo) {
        if let Some(title) = &info.title {
            self.title = title.clone();
        }
        if let Some(description) = &info.description {
            self.description = Some(description.clone());
        }
        if let Some(source) = &info.source_branch {
            self.source_branch = source.clone();
        }
        if let Some(target) = &info.target_branch {
            self.target_branch = target.clone();
        }
    }
}

impl InfoMapper for GitLabGroup {
    type Info = OrganizationInfo;

    fn display_name(&self) -> String {
        self.full_path.clone()
    }

    fn to_info(&self) -> OrganizationInfo {
        OrganizationInfo {
            name: Some(self.name.clone()),
            description: self.description.clone(),
        }
    }

    fn apply_info(&mut self, info: &OrganizationInfo) {
        if let Some(name) = &info.name {
            self.name = name.clone();
        }
        if let Some(description) = &info.description {
            self.description = Some(description.clone());
        }
    }
}

impl InfoMapper for Subgroup {
    type Info = TeamInfo;

    fn display_name(&self) -> String {
        self.0.path.clone()
    }

    fn to_info(&self) -> TeamInfo {
        TeamInfo {
            name: Some(self.0.name.clone()),
            description: self.0.description.clone(),
        }
    }

    fn apply_info(&mut self, info: &TeamInfo) {
        if let Some(name) = &info.name {
            self.0.name = name.clone();
        }
        if let Some(description) = &info.description {
            self.0.description = Some(description.clone());
        }
    }
}

impl InfoMapper for GitLabUser {
    type Info = UserInfo;

    fn display_name(&self) -> String {
        self.username.clone()
    }

    fn to_info(&self) -> UserInfo {
        UserInfo {
            login: Some(self.username.clone()),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    fn apply_info(&mut self, info: &UserInfo) {
        if let Some(login) = &info.login {
            self.username = login.clone();
        }
        if let Some(name) = &info.name {
            self.name = Some(name.clone());
        }
        if let Some(email) = &info.email {
            self.email = Some(email.clone());
        }
    }
}
