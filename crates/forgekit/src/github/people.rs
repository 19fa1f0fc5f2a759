//! Organizations, users and teams.

use std::sync::Arc;

use async_trait::async_trait;

use super::pagination::{fetch_page, fetch_since};
use super::GitHubClient;
use super::types::{Membership, Organization, Team, User};
use crate::platform::{
    OrganizationInfo, OrganizationRef, ProviderError, ProviderRoot, Result, ResultExt,
    TeamInfo, TeamMembersApi, TeamRef, UserInfo, UserRef,
};
use crate::reconcile::{
    CancelToken, InfoMapper, ListApi, ListOptions, Page, ResourceApi, drain_validated,
};
use crate::rest::encode_segment;

#[derive(Debug, Clone)]
pub struct GitHubOrganizations {
    client: Arc<GitHubClient>,
}

impl GitHubOrganizations {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubOrganizations {
    type Ref = OrganizationRef;
    type Info = OrganizationInfo;
    type Object = Organization;

    fn kind(&self) -> &'static str {
        "organization"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &OrganizationRef) -> Result<Organization> {
        self.client
            .get(cancel, &format!("/orgs/{}", encode_segment(&r.path)))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubOrganizations {
    type Parent = ProviderRoot;

    /// Every organization on the server, in creation order.
    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        _root: &ProviderRoot,
        options: ListOptions,
    ) -> Result<(Vec<Organization>, Page)> {
        fetch_since(&self.client, cancel, "/organizations", options).await
    }
}

#[derive(Debug, Clone)]
pub struct GitHubUsers {
    client: Arc<GitHubClient>,
}

impl GitHubUsers {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubUsers {
    type Ref = UserRef;
    type Info = UserInfo;
    type Object = User;

    fn kind(&self) -> &'static str {
        "user"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &UserRef) -> Result<User> {
        self.client
            .get(cancel, &format!("/users/{}", encode_segment(&r.login)))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubUsers {
    type Parent = ProviderRoot;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        _root: &ProviderRoot,
        options: ListOptions,
    ) -> Result<(Vec<User>, Page)> {
        fetch_since(&self.client, cancel, "/users", options).await
    }
}

fn team_path(team: &TeamRef) -> String {
    format!(
        "/orgs/{}/teams/{}",
        encode_segment(&team.organization.path),
        encode_segment(&team.name)
    )
}

/// Teams are addressed by slug.
#[derive(Debug, Clone)]
pub struct GitHubTeams {
    client: Arc<GitHubClient>,
}

impl GitHubTeams {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubTeams {
    type Ref = TeamRef;
    type Info = TeamInfo;
    type Object = Team;

    fn kind(&self) -> &'static str {
        "team"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &TeamRef) -> Result<Team> {
        self.client.get(cancel, &team_path(r)).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubTeams {
    type Parent = OrganizationRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        org: &OrganizationRef,
        options: ListOptions,
    ) -> Result<(Vec<Team>, Page)> {
        let path = format!("/orgs/{}/teams", encode_segment(&org.path));
        fetch_page(&self.client, cancel, &path, options, &[])
            .await
            .for_resource(org)
    }
}

#[async_trait]
impl TeamMembersApi for GitHubTeams {
    async fn list_members(&self, cancel: &CancelToken, team: &TeamRef) -> Result<Vec<UserInfo>> {
        let path = format!("{}/members", team_path(team));
        let users: Vec<User> = drain_validated(ListOptions::default(), cancel, |options| {
            fetch_page(&self.client, cancel, &path, options, &[])
        })
        .await
        .for_resource(team)?;
        Ok(users.iter().map(InfoMapper::to_info).collect())
    }

    /// Pending invitations do not count as membership.
    async fn get_member(
        &self,
        cancel: &CancelToken,
        team: &TeamRef,
        user: &UserRef,
    ) -> Result<UserInfo> {
        let path = format!(
            "{}/memberships/{}",
            team_path(team),
            encode_segment(&user.login)
        );
        let not_member = || ProviderError::not_found(format!("{user} in {team}"));
        let membership: Membership = self.client.get(cancel, &path).await.map_err(|e| {
            if e.is_not_found() { not_member() } else { e }
        })?;
        if membership.state != "active" {
            return Err(not_member());
        }
        let member: User = self
            .client
            .get(cancel, &format!("/users/{}", encode_segment(&user.login)))
            .await
            .for_resource(user)?;
        Ok(member.to_info())
    }
}
