//! Stash object <-> unified info conversions.

use chrono::DateTime;

use super::types::{
    AccessKey, Branch, Commit, Group, GroupPermission, Project, PullRequest, Repository, User,
    full_ref, short_ref,
};
use crate::platform::{
    BranchInfo, CommitInfo, DeployKeyInfo, OrganizationInfo, Permission, PullRequestInfo,
    PullRequestState, RepositoryInfo, TeamAccessInfo, TeamInfo, UserInfo, Visibility,
};
use crate::reconcile::InfoMapper;

pub const REPO_READ: &str = "REPO_READ";
pub const REPO_WRITE: &str = "REPO_WRITE";
pub const REPO_ADMIN: &str = "REPO_ADMIN";

/// Stash repository (or project) permission to the unified level.
pub fn permission_from_stash(permission: &str) -> Option<Permission> {
    match permission {
        "REPO_READ" | "PROJECT_READ" => Some(Permission::Pull),
        "REPO_WRITE" | "PROJECT_WRITE" => Some(Permission::Push),
        "REPO_ADMIN" | "PROJECT_ADMIN" => Some(Permission::Admin),
        _ => None,
    }
}

/// Unified level to a Stash repository permission.
///
/// Triage and maintain have no Stash equivalent; callers reject them first.
pub fn permission_to_stash(permission: Permission) -> &'static str {
    match permission {
        Permission::Pull | Permission::Triage => REPO_READ,
        Permission::Push | Permission::Maintain => REPO_WRITE,
        Permission::Admin => REPO_ADMIN,
    }
}

impl InfoMapper for Repository {
    type Info = RepositoryInfo;

    fn display_name(&self) -> String {
        self.slug.clone()
    }

    fn to_info(&self) -> RepositoryInfo {
        RepositoryInfo {
            description: Some(self.description.clone()),
            default_branch: self.default_branch.clone(),
            visibility: Some(if self.public {
                Visibility::Public
            } else {
                Visibility::Private
            }),
        }
    }

    fn apply_info(&mut self, info: &RepositoryInfo) {
        if let Some(description) = &info.description {
            self.description = description.clone();
        }
        if let Some(branch) = &info.default_branch {
            self.default_branch = Some(branch.clone());
        }
        if let Some(visibility) = info.visibility {
            self.public = visibility == Visibility::Public;
        }
    }
}

impl InfoMapper for AccessKey {
    type Info = DeployKeyInfo;

    fn display_name(&self) -> String {
        self.key.label.clone()
    }

    fn to_info(&self) -> DeployKeyInfo {
        DeployKeyInfo {
            key: Some(self.key.text.clone()),
            read_only: Some(self.permission != REPO_WRITE),
        }
    }

    fn apply_info(&mut self, info: &DeployKeyInfo) {
        if let Some(key) = &info.key {
            self.key.text = key.clone();
        }
        if let Some(read_only) = info.read_only {
            self.permission = if read_only { REPO_READ } else { REPO_WRITE }.to_string();
        }
    }
}

impl InfoMapper for GroupPermission {
    type Info = TeamAccessInfo;

    fn display_name(&self) -> String {
        self.group.name.clone()
    }

    fn to_info(&self) -> TeamAccessInfo {
        TeamAccessInfo {
            permission: permission_from_stash(&self.permission),
        }
    }

    fn apply_info(&mut self, info: &TeamAccessInfo) {
        if let Some(permission) = info.permission {
            self.permission = permission_to_stash(permission).to_string();
        }
    }
}

impl InfoMapper for Branch {
    type Info = BranchInfo;

    fn display_name(&self) -> String {
        self.display_id.clone()
    }

    fn to_info(&self) -> BranchInfo {
        BranchInfo {
            sha: Some(self.latest_commit.clone()),
        }
    }

    fn apply_info(&mut self, info: &BranchInfo) {
        if let Some(sha) = &info.sha {
            self.latest_commit = sha.clone();
        }
    }
}

impl InfoMapper for Commit {
    type Info = CommitInfo;

    fn display_name(&self) -> String {
        self.id.clone()
    }

    fn to_info(&self) -> CommitInfo {
        CommitInfo {
            sha: Some(self.id.clone()),
            message: Some(self.message.clone()),
            author: Some(self.author.name.clone()),
            author_email: self.author.email_address.clone(),
            authored_at: DateTime::from_timestamp_millis(self.author_timestamp),
            parents: self.parents.iter().map(|p| p.id.clone()).collect(),
            web_url: None,
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

fn pull_request_state(state: &str) -> Option<PullRequestState> {
    match state {
        "OPEN" => Some(PullRequestState::Open),
        "DECLINED" => Some(PullRequestState::Closed),
        "MERGED" => Some(PullRequestState::Merged),
        _ => None,
    }
}

impl InfoMapper for PullRequest {
    type Info = PullRequestInfo;

    fn display_name(&self) -> String {
        format!("#{}", self.id)
    }

    fn to_info(&self) -> PullRequestInfo {
        PullRequestInfo {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            source_branch: Some(short_ref(&self.from_ref.id).to_string()),
            target_branch: Some(short_ref(&self.to_ref.id).to_string()),
            state: pull_request_state(&self.state),
            web_url: self.links.web_url(),
        }
    }

    fn apply_info(&mut self, info: &PullRequestInfo) {
        if let Some(title) = &info.title {
            self.title = title.clone();
        }
        if let Some(description) = &info.description {
            self.description = description.clone();
        }
        if let Some(source) = &info.source_branch {
            self.from_ref.id = full_ref(source);
        }
        if let Some(target) = &info.target_branch {
            self.to_ref.id = full_ref(target);
        }
    }
}

impl InfoMapper for Project {
    type Info = OrganizationInfo;

    fn display_name(&self) -> String {
        self.key.clone()
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

impl InfoMapper for User {
    type Info = UserInfo;

    fn display_name(&self) -> String {
        self.slug.clone()
    }

    fn to_info(&self) -> UserInfo {
        UserInfo {
            login: Some(self.name.clone()),
            name: Some(self.display_name.clone()).filter(|n| !n.is_empty()),
            email: self.email_address.clone(),
        }
    }

    fn apply_info(&mut self, info: &UserInfo) {
        if let Some(login) = &info.login {
            self.name = login.clone();
        }
        if let Some(name) = &info.name {
            self.display_name = name.clone();
        }
        if let Some(email) = &info.email {
            self.email_address = Some(email.clone());
        }
    }
}

impl InfoMapper for Group {
    type Info = TeamInfo;

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn to_info(&self) -> TeamInfo {
        TeamInfo {
            name: Some(self.name.clone()),
            description: None,
        }
    }

    fn apply_info(&mut self, info: &TeamInfo) {
        if let Some(name) = &info.name {
            self.name = name.clone();
        }
    }
}
