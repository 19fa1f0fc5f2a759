//! Deploy keys and team repository permissions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::pagination::fetch_page;
use super::types::{DeployKey, Team, TeamGrant};
use super::{GitHubClient, PROVIDER, find_listed, repo_path};
use crate::platform::{
    DeployKeyInfo, DeployKeyRef, OwnerRef, ProviderError, RepositoryRef, Result, ResultExt,
    TeamAccessInfo, TeamAccessRef,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, Page, ResourceApi,
    UpdateApi,
};
use crate::rest::encode_segment;

fn keys_path(r: &RepositoryRef) -> String {
    format!("{}/keys", repo_path(r))
}

#[derive(Debug, Clone)]
pub struct GitHubDeployKeys {
    client: Arc<GitHubClient>,
}

impl GitHubDeployKeys {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubDeployKeys {
    type Ref = DeployKeyRef;
    type Info = DeployKeyInfo;
    type Object = DeployKey;

    fn kind(&self) -> &'static str {
        "deploy key"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &DeployKeyRef) -> Result<DeployKey> {
        find_listed(
            &self.client,
            cancel,
            &keys_path(&r.repository),
            r,
            |key: &DeployKey| key.title == r.name,
        )
        .await
        .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubDeployKeys {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<DeployKey>, Page)> {
        fetch_page(&self.client, cancel, &keys_path(repository), options, &[])
            .await
            .for_resource(repository)
    }
}

#[async_trait]
impl CreateApi for GitHubDeployKeys {
    fn new_object(&self, r: &DeployKeyRef, info: &DeployKeyInfo) -> Result<DeployKey> {
        if info.key.is_none() {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no key material was given"
            )));
        }
        let mut key = DeployKey {
            title: r.name.clone(),
            read_only: true,
            ..Default::default()
        };
        key.apply_info(info);
        Ok(key)
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &DeployKeyRef,
        object: &DeployKey,
    ) -> Result<DeployKey> {
        let body = json!({
            "title": r.name,
            "key": object.key,
            "read_only": object.read_only,
        });
        self.client
            .post(cancel, &keys_path(&r.repository), &body)
            .await
            .for_resource(&r.repository)
    }
}

#[async_trait]
impl UpdateApi for GitHubDeployKeys {
    /// Deploy keys cannot be edited: the old key is removed and the new one
    /// added under the same title.
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &DeployKeyRef,
        object: &DeployKey,
    ) -> Result<DeployKey> {
        self.delete_one(cancel, r).await?;
        self.create_one(cancel, r, object).await
    }
}

#[async_trait]
impl DeleteApi for GitHubDeployKeys {
    async fn delete_one(&self, cancel: &CancelToken, r: &DeployKeyRef) -> Result<()> {
        let current = self.fetch_one(cancel, r).await?;
        self.client
            .delete(
                cancel,
                &format!("{}/{}", keys_path(&r.repository), current.id),
            )
            .await
            .for_resource(r)
    }
}

/// Team access applies to organization repositories only.
fn organization_of(repository: &RepositoryRef) -> Result<&str> {
    match &repository.owner {
        OwnerRef::Organization(org) => Ok(&org.path),
        OwnerRef::User(_) => Err(ProviderError::unsupported(
            PROVIDER,
            "team access on user repositories",
        )),
    }
}

fn team_repo_path(org: &str, r: &TeamAccessRef) -> String {
    format!(
        "/orgs/{}/teams/{}/repos/{}/{}",
        encode_segment(org),
        encode_segment(&r.team),
        encode_segment(r.repository.owner.name()),
        encode_segment(&r.repository.name)
    )
}

#[derive(Debug, Clone)]
pub struct GitHubTeamAccess {
    client: Arc<GitHubClient>,
}

impl GitHubTeamAccess {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    async fn grant(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &TeamGrant,
    ) -> Result<TeamGrant> {
        let org = organization_of(&r.repository)?;
        self.client
            .put_status(
                cancel,
                &team_repo_path(org, r),
                &json!({"permission": object.0.permission}),
            )
            .await
            .for_resource(r)?;
        self.fetch_one(cancel, r).await
    }
}

#[async_trait]
impl ResourceApi for GitHubTeamAccess {
    type Ref = TeamAccessRef;
    type Info = TeamAccessInfo;
    type Object = TeamGrant;

    fn kind(&self) -> &'static str {
        "team access"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &TeamAccessRef) -> Result<TeamGrant> {
        organization_of(&r.repository)?;
        find_listed(
            &self.client,
            cancel,
            &format!("{}/teams", repo_path(&r.repository)),
            r,
            |grant: &TeamGrant| grant.0.slug == r.team,
        )
        .await
        .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubTeamAccess {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<TeamGrant>, Page)> {
        organization_of(repository)?;
        let path = format!("{}/teams", repo_path(repository));
        fetch_page(&self.client, cancel, &path, options, &[])
            .await
            .for_resource(repository)
    }
}

#[async_trait]
impl CreateApi for GitHubTeamAccess {
    fn new_object(&self, r: &TeamAccessRef, info: &TeamAccessInfo) -> Result<TeamGrant> {
        if info.permission.is_none() {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no permission was given"
            )));
        }
        let mut grant = TeamGrant(Team {
            name: r.team.clone(),
            slug: r.team.clone(),
            ..Default::default()
        });
        grant.apply_info(info);
        Ok(grant)
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &TeamGrant,
    ) -> Result<TeamGrant> {
        self.grant(cancel, r, object).await
    }
}

#[async_trait]
impl UpdateApi for GitHubTeamAccess {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &TeamGrant,
    ) -> Result<TeamGrant> {
        self.grant(cancel, r, object).await
    }
}

#[async_trait]
impl DeleteApi for GitHubTeamAccess {
    async fn delete_one(&self, cancel: &CancelToken, r: &TeamAccessRef) -> Result<()> {
        self.fetch_one(cancel, r).await?;
        let org = organization_of(&r.repository)?;
        self.client
            .delete(cancel, &team_repo_path(org, r))
            .await
            .for_resource(r)
    }
}
