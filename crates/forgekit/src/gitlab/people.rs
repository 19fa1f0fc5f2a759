//! Groups, subgroups and users.

use std::sync::Arc;

use async_trait::async_trait;
use gitlab::api::{groups, users};

use super::client::built;
use super::endpoints::{Subgroups, TopLevelGroups};
use super::types::{GitLabGroup, GitLabUser, Subgroup};
use super::GitLabClient;
use crate::platform::{
    OrganizationInfo, OrganizationRef, ProviderError, ProviderRoot, Result, ResultExt,
    TeamInfo, TeamMembersApi, TeamRef, UserInfo, UserRef,
};
use crate::reconcile::{
    CancelToken, InfoMapper, ListApi, ListOptions, Page, ResourceApi, validate_all,
};

async fn fetch_group<T>(client: &GitLabClient, cancel: &CancelToken, full_path: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let endpoint = built(groups::Group::builder().group(full_path).build())?;
    client.query(cancel, endpoint).await
}

/// Top-level groups, exposed as organizations.
#[derive(Debug, Clone)]
pub struct GitLabGroups {
    client: Arc<GitLabClient>,
}

impl GitLabGroups {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitLabGroups {
    type Ref = OrganizationRef;
    type Info = OrganizationInfo;
    type Object = GitLabGroup;

    fn kind(&self) -> &'static str {
        "organization"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &OrganizationRef) -> Result<GitLabGroup> {
        fetch_group(&self.client, cancel, &r.path)
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabGroups {
    type Parent = ProviderRoot;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        _root: &ProviderRoot,
        _options: ListOptions,
    ) -> Result<(Vec<GitLabGroup>, Page)> {
        let groups: Vec<GitLabGroup> = self.client.query_all(cancel, TopLevelGroups).await?;
        Ok((groups, Page::last()))
    }
}

#[derive(Debug, Clone)]
pub struct GitLabUsers {
    client: Arc<GitLabClient>,
}

impl GitLabUsers {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

/// Users are only addressable by id; the username filter answers with a
/// list of zero or one entries.
async fn find_user(client: &GitLabClient, cancel: &CancelToken, r: &UserRef) -> Result<GitLabUser> {
    let endpoint = built(users::Users::builder().username(r.login.as_str()).build())?;
    let found: Vec<GitLabUser> = client.query(cancel, endpoint).await.for_resource(r)?;
    found
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::not_found(r.to_string()))
}

#[async_trait]
impl ResourceApi for GitLabUsers {
    type Ref = UserRef;
    type Info = UserInfo;
    type Object = GitLabUser;

    fn kind(&self) -> &'static str {
        "user"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &UserRef) -> Result<GitLabUser> {
        find_user(&self.client, cancel, r).await
    }
}

#[async_trait]
impl ListApi for GitLabUsers {
    type Parent = ProviderRoot;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        _root: &ProviderRoot,
        _options: ListOptions,
    ) -> Result<(Vec<GitLabUser>, Page)> {
        let endpoint = built(users::Users::builder().build())?;
        let found: Vec<GitLabUser> = self.client.query_all(cancel, endpoint).await?;
        Ok((found, Page::last()))
    }
}

fn subgroup_path(team: &TeamRef) -> String {
    format!("{}/{}", team.organization.path, team.name)
}

/// Subgroups of an organization's group, exposed as teams.
#[derive(Debug, Clone)]
pub struct GitLabSubgroups {
    client: Arc<GitLabClient>,
}

impl GitLabSubgroups {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitLabSubgroups {
    type Ref = TeamRef;
    type Info = TeamInfo;
    type Object = Subgroup;

    fn kind(&self) -> &'static str {
        "team"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &TeamRef) -> Result<Subgroup> {
        fetch_group(&self.client, cancel, &subgroup_path(r))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabSubgroups {
    type Parent = OrganizationRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        org: &OrganizationRef,
        _options: ListOptions,
    ) -> Result<(Vec<Subgroup>, Page)> {
        let teams: Vec<Subgroup> = self
            .client
            .query_all(cancel, Subgroups { group: &org.path })
            .await
            .for_resource(org)?;
        Ok((teams, Page::last()))
    }
}

#[async_trait]
impl TeamMembersApi for GitLabSubgroups {
    /// Direct members only; members inherited from parent groups are omitted.
    async fn list_members(&self, cancel: &CancelToken, team: &TeamRef) -> Result<Vec<UserInfo>> {
        let group = subgroup_path(team);
        let endpoint = built(groups::members::GroupMembers::builder().group(group.as_str()).build())?;
        let members: Vec<GitLabUser> = self
            .client
            .query_all(cancel, endpoint)
            .await
            .for_resource(team)?;
        validate_all(&members)?;
        Ok(members.iter().map(InfoMapper::to_info).collect())
    }

    async fn get_member(
        &self,
        cancel: &CancelToken,
        team: &TeamRef,
        user: &UserRef,
    ) -> Result<UserInfo> {
        let not_member = || ProviderError::not_found(format!("{user} in {team}"));
        let found = find_user(&self.client, cancel, user)
            .await
            .map_err(|e| if e.is_not_found() { not_member() } else { e })?;
        let group = subgroup_path(team);
        let endpoint = built(
            groups::members::GroupMember::builder()
                .group(group.as_str())
                .user(found.id)
                .build(),
        )?;
        let member: GitLabUser = self.client.query(cancel, endpoint).await.map_err(|e| {
            if e.is_not_found() { not_member() } else { e }
        })?;
        Ok(member.to_info())
    }
}
