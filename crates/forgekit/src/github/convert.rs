//! GitHub object <-> unified info conversions.

use super::types::{
    Commit, DeployKey, GitRef, Organization, PullRequest, Repository, Team, TeamGrant, User,
};
use crate::platform::{
    BranchInfo, CommitInfo, DeployKeyInfo, OrganizationInfo, PullRequestInfo, PullRequestState,
    RepositoryInfo, TeamAccessInfo, TeamInfo, UserInfo, Visibility,
};
use crate::reconcile::InfoMapper;

/// Determine visibility from a GitHub repository.
///
/// `internal` only exists on enterprise organizations; servers that omit the
/// `visibility` field fall back to the `private` flag.
fn github_visibility(repo: &Repository) -> Visibility {
    match repo.visibility.as_deref().and_then(|v| v.parse().ok()) {
        Some(visibility) => visibility,
        None if repo.private => Visibility::Private,
        None => Visibility::Public,
    }
}

impl InfoMapper for Repository {
    type Info = RepositoryInfo;

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn to_info(&self) -> RepositoryInfo {
        RepositoryInfo {
            // GitHub reports an empty description as null.
            description: Some(self.description.clone().unwrap_or_default()),
            default_branch: self.default_branch.clone(),
            visibility: Some(github_visibility(self)),
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
            self.private = visibility != Visibility::Public;
            self.visibility = Some(visibility.as_str().to_string());
        }
    }
}

impl InfoMapper for DeployKey {
    type Info = DeployKeyInfo;

    fn display_name(&self) -> String {
        self.title.clone()
    }

    fn to_info(&self) -> DeployKeyInfo {
        DeployKeyInfo {
            key: Some(self.key.clone()),
            read_only: Some(self.read_only),
        }
    }

    fn apply_info(&mut self, info: &DeployKeyInfo) {
        if let Some(key) = &info.key {
            self.key = key.clone();
        }
        if let Some(read_only) = info.read_only {
            self.read_only = read_only;
        }
    }
}

impl InfoMapper for TeamGrant {
    type Info = TeamAccessInfo;

    fn display_name(&self) -> String {
        self.0.slug.clone()
    }

    fn to_info(&self) -> TeamAccessInfo {
        TeamAccessInfo {
            permission: self.0.permission.as_deref().and_then(|p| p.parse().ok()),
        }
    }

    fn apply_info(&mut self, info: &TeamAccessInfo) {
        if let Some(permission) = info.permission {
            self.0.permission = Some(permission.as_str().to_string());
        }
    }
}

impl InfoMapper for GitRef {
    type Info = BranchInfo;

    fn display_name(&self) -> String {
        self.name.trim_start_matches("refs/heads/").to_string()
    }

    fn to_info(&self) -> BranchInfo {
        BranchInfo {
            sha: Some(self.object.sha.clone()),
        }
    }

    fn apply_info(&mut self, info: &BranchInfo) {
        if let Some(sha) = &info.sha {
            self.object.sha = sha.clone();
        }
    }
}

impl InfoMapper for Commit {
    type Info = CommitInfo;

    fn display_name(&self) -> String {
        self.sha.clone()
    }

    fn to_info(&self) -> CommitInfo {
        CommitInfo {
            sha: Some(self.sha.clone()),
            message: Some(self.commit.message.clone()),
            author: Some(self.commit.author.name.clone()),
            author_email: self.commit.author.email.clone(),
            authored_at: self.commit.author.date,
            parents: self.parents.iter().map(|p| p.sha.clone()).collect(),
            web_url: self.html_url.clone(),
        }
    }

    fn apply_info(&mut self, info: &CommitInfo) {
        if let Some(sha) = &info.sha {
            self.sha = sha.clone();
        }
        if let Some(message) = &info.message {
            self.commit.message = message.clone();
        }
    }
}

impl InfoMapper for PullRequest {
    type Info = PullRequestInfo;

    fn display_name(&self) -> String {
        format!("#{}", self.number)
    }

    fn to_info(&self) -> PullRequestInfo {
        let state = match (self.state.as_str(), self.merged_at) {
            (_, Some(_)) => Some(PullRequestState::Merged),
            ("open", None) => Some(PullRequestState::Open),
            ("closed", None) => Some(PullRequestState::Closed),
            _ => None,
        };
        PullRequestInfo {
            title: Some(self.title.clone()),
            description: Some(self.body.clone().unwrap_or_default()),
            source_branch: Some(self.head.name.clone()),
            target_branch: Some(self.base.name.clone()),
            state,
            web_url: self.html_url.clone(),
        }
    }

    fn apply_info(&mut self, info: &PullRequestInfo) {
        if let Some(title) = &info.title {
            self.title = title.clone();
        }
        if let Some(description) = &info.description {
            self.body = Some(description.clone());
        }
        if let Some(source) = &info.source_branch {
            self.head.name = source.clone();
        }
        if let Some(target) = &info.target_branch {
            self.base.name = target.clone();
        }
    }
}

impl InfoMapper for Organization {
    type Info = OrganizationInfo;

    fn display_name(&self) -> String {
        self.login.clone()
    }

    fn to_info(&self) -> OrganizationInfo {
        OrganizationInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    fn apply_info(&mut self, info: &OrganizationInfo) {
        if let Some(name) = &info.name {
            self.name = Some(name.clone());
        }
        if let Some(description) = &info.description {
            self.description = Some(description.clone());
        }
    }
}

impl InfoMapper for User {
    type Info = UserInfo;

    fn display_name(&self) -> String {
        self.login.clone()
    }

    fn to_info(&self) -> UserInfo {
        UserInfo {
            login: Some(self.login.clone()),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    fn apply_info(&mut self, info: &UserInfo) {
        if let Some(login) = &info.login {
            self.login = login.clone();
        }
        if let Some(name) = &info.name {
            self.name = Some(name.clone());
        }
        if let Some(email) = &info.email {
            self.email = Some(email.clone());
        }
    }
}

impl InfoMapper for Team {
    type Info = TeamInfo;

    fn display_name(&self) -> String {
        self.slug.clone()
    }

    fn to_info(&self) -> TeamInfo {
        TeamInfo {
            name: Some(self.name.clone()),
            description: self.description.clone(),
        }
    }

    fn apply_info(&mut self, info: &TeamInfo) {
        if let Some(name) = &info.name {
            self.name = name.clone();
        }
        if let Some(description) = &info.description {
            self.description = Some(description.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::platform::{DesiredInfo, Permission};
    use crate::reconcile::applied;

    #[test]
    fn visibility_prefers_explicit_field() {
        let internal = Repository {
            private: true,
            visibility: Some("internal".to_string()),
            ..Default::default()
        };
        assert_eq!(github_visibility(&internal), Visibility::Internal);

        let legacy = Repository {
            private: true,
            ..Default::default()
        };
        assert_eq!(github_visibility(&legacy), Visibility::Private);
    }

    #[test]
    fn null_description_reads_as_empty() {
        let desired = RepositoryInfo {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(desired.matches(&Repository::default().to_info()));
    }

    #[test]
    fn making_public_clears_private_flag() {
        let repo = Repository {
            private: true,
            visibility: Some("private".to_string()),
            ..Default::default()
        };
        let public = applied(
            &repo,
            &RepositoryInfo {
                visibility: Some(Visibility::Public),
                ..Default::default()
            },
        );
        assert!(!public.private);
        assert_eq!(public.to_info().visibility, Some(Visibility::Public));
    }

    #[test]
    fn team_grant_permission_levels() {
        let grant = TeamGrant(Team {
            slug: "ops".to_string(),
            permission: Some("maintain".to_string()),
            ..Default::default()
        });
        assert_eq!(grant.to_info().permission, Some(Permission::Maintain));

        let raised = applied(
            &grant,
            &TeamAccessInfo {
                permission: Some(Permission::Admin),
            },
        );
        assert_eq!(raised.0.permission.as_deref(), Some("admin"));
    }

    #[test]
    fn merged_pull_request_is_merged_not_closed() {
        let pr = PullRequest {
            number: 1,
            state: "closed".to_string(),
            merged_at: Some(Utc::now()),
            ..Default::default()
        };
        assert_eq!(pr.to_info().state, Some(PullRequestState::Merged));

        let closed = PullRequest {
            merged_at: None,
            ..pr
        };
        assert_eq!(closed.to_info().state, Some(PullRequestState::Closed));
    }
}
