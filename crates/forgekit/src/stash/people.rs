//! Projects (organizations), users and groups (teams).

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Group, GroupPermission, Project, User};
use super::{API, PROVIDER, fetch_paged, find_paged};
use crate::platform::{
    OrganizationInfo, OrganizationRef, ProviderError, ProviderRoot, Result, ResultExt,
    TeamInfo, TeamMembersApi, TeamRef, UserInfo, UserRef,
};
use crate::reconcile::{
    CancelToken, InfoMapper, ListApi, ListOptions, Page, ResourceApi, drain_validated,
};
use crate::rest::{RestClient, encode_segment};

#[derive(Debug, Clone)]
pub struct StashProjects {
    rest: Arc<RestClient>,
}

impl StashProjects {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ResourceApi for StashProjects {
    type Ref = OrganizationRef;
    type Info = OrganizationInfo;
    type Object = Project;

    fn kind(&self) -> &'static str {
        "organization"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &OrganizationRef) -> Result<Project> {
        self.rest
            .get(cancel, &format!("{API}/projects/{}", encode_segment(&r.path)))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashProjects {
    type Parent = ProviderRoot;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        _root: &ProviderRoot,
        options: ListOptions,
    ) -> Result<(Vec<Project>, Page)> {
        fetch_paged(&self.rest, cancel, &format!("{API}/projects"), options, &[]).await
    }
}

#[derive(Debug, Clone)]
pub struct StashUsers {
    rest: Arc<RestClient>,
}

impl StashUsers {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ResourceApi for StashUsers {
    type Ref = UserRef;
    type Info = UserInfo;
    type Object = User;

    fn kind(&self) -> &'static str {
        "user"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &UserRef) -> Result<User> {
        self.rest
            .get(cancel, &format!("{API}/users/{}", encode_segment(&r.login)))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashUsers {
    type Parent = ProviderRoot;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        _root: &ProviderRoot,
        options: ListOptions,
    ) -> Result<(Vec<User>, Page)> {
        fetch_paged(&self.rest, cancel, &format!("{API}/users"), options, &[]).await
    }
}

/// Groups are global in Stash. An organization's teams are the groups
/// holding a permission on its project.
#[derive(Debug, Clone)]
pub struct StashGroups {
    rest: Arc<RestClient>,
}

impl StashGroups {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

fn project_groups_path(org: &OrganizationRef) -> String {
    format!(
        "{API}/projects/{}/permissions/groups",
        encode_segment(&org.path)
    )
}

#[async_trait]
impl ResourceApi for StashGroups {
    type Ref = TeamRef;
    type Info = TeamInfo;
    type Object = Group;

    fn kind(&self) -> &'static str {
        "team"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &TeamRef) -> Result<Group> {
        let grant: GroupPermission = find_paged(
            &self.rest,
            cancel,
            &project_groups_path(&r.organization),
            &[("filter", r.name.clone())],
            r,
            |grant: &GroupPermission| grant.group.name == r.name,
        )
        .await
        .for_resource(r)?;
        Ok(grant.group)
    }
}

#[async_trait]
impl ListApi for StashGroups {
    type Parent = OrganizationRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        org: &OrganizationRef,
        options: ListOptions,
    ) -> Result<(Vec<Group>, Page)> {
        let (grants, page): (Vec<GroupPermission>, Page) =
            fetch_paged(&self.rest, cancel, &project_groups_path(org), options, &[])
                .await
                .for_resource(org)?;
        Ok((grants.into_iter().map(|g| g.group).collect(), page))
    }
}

#[async_trait]
impl TeamMembersApi for StashGroups {
    async fn list_members(&self, cancel: &CancelToken, team: &TeamRef) -> Result<Vec<UserInfo>> {
        let path = format!("{API}/admin/groups/more-members");
        let context = [("context", team.name.clone())];
        let users: Vec<User> = drain_validated(ListOptions::default(), cancel, |options| {
            fetch_paged(&self.rest, cancel, &path, options, &context)
        })
        .await
        .for_resource(team)?;
        Ok(users.iter().map(InfoMapper::to_info).collect())
    }

    async fn get_member(
        &self,
        _cancel: &CancelToken,
        _team: &TeamRef,
        _user: &UserRef,
    ) -> Result<UserInfo> {
        Err(ProviderError::unsupported(PROVIDER, "team membership lookup"))
    }
}
