//! Repository access keys and group permissions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::convert::{REPO_READ, permission_to_stash};
use super::types::{AccessKey, Group, GroupPermission, SshKey};
use super::{KEYS_API, fetch_paged, find_paged, repo_path};
use crate::http::HttpMethod;
use crate::platform::{
    DeployKeyInfo, DeployKeyRef, Permission, ProviderError, RepositoryRef, Result, ResultExt,
    TeamAccessInfo, TeamAccessRef, normalize_key,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, Page, ResourceApi,
    UpdateApi,
};
use crate::rest::{RestClient, query};

/// `/rest/keys/1.0/projects/{key}/repos/{slug}/ssh`.
fn keys_path(r: &RepositoryRef) -> String {
    let api_path = repo_path(r);
    let repo = api_path.strip_prefix(super::API).unwrap_or(&api_path);
    format!("{KEYS_API}{repo}/ssh")
}

fn group_permissions_path(r: &RepositoryRef) -> String {
    format!("{}/permissions/groups", repo_path(r))
}

/// Deploy keys are Stash access keys, identified by their label.
#[derive(Debug, Clone)]
pub struct StashDeployKeys {
    rest: Arc<RestClient>,
}

impl StashDeployKeys {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ResourceApi for StashDeployKeys {
    type Ref = DeployKeyRef;
    type Info = DeployKeyInfo;
    type Object = AccessKey;

    fn kind(&self) -> &'static str {
        "deploy key"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &DeployKeyRef) -> Result<AccessKey> {
        find_paged(
            &self.rest,
            cancel,
            &keys_path(&r.repository),
            &[],
            r,
            |key: &AccessKey| key.key.label == r.name,
        )
        .await
        .for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashDeployKeys {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<AccessKey>, Page)> {
        fetch_paged(&self.rest, cancel, &keys_path(repository), options, &[])
            .await
            .for_resource(repository)
    }
}

#[async_trait]
impl CreateApi for StashDeployKeys {
    fn new_object(&self, r: &DeployKeyRef, info: &DeployKeyInfo) -> Result<AccessKey> {
        if info.key.is_none() {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no key material was given"
            )));
        }
        let mut key = AccessKey {
            key: SshKey {
                label: r.name.clone(),
                ..Default::default()
            },
            permission: REPO_READ.to_string(),
        };
        key.apply_info(info);
        Ok(key)
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &DeployKeyRef,
        object: &AccessKey,
    ) -> Result<AccessKey> {
        let body = json!({
            "key": {"text": object.key.text, "label": r.name},
            "permission": object.permission,
        });
        self.rest
            .post(cancel, &keys_path(&r.repository), &body)
            .await
            .for_resource(&r.repository)
    }
}

#[async_trait]
impl UpdateApi for StashDeployKeys {
    /// Key material is immutable: a changed key is deleted and re-added.
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &DeployKeyRef,
        object: &AccessKey,
    ) -> Result<AccessKey> {
        let current = self.fetch_one(cancel, r).await?;
        let path = keys_path(&r.repository);

        if normalize_key(&current.key.text) != normalize_key(&object.key.text) {
            tracing::debug!(resource = %r, "Key material changed, replacing access key");
            self.rest
                .delete(cancel, &format!("{path}/{}", current.key.id))
                .await
                .for_resource(r)?;
            return self.create_one(cancel, r, object).await;
        }

        self.rest
            .send_ignoring_body::<()>(
                cancel,
                HttpMethod::Put,
                &format!(
                    "{path}/{}/permission/{}",
                    current.key.id, object.permission
                ),
                None,
            )
            .await
            .for_resource(r)?;
        self.fetch_one(cancel, r).await
    }
}

#[async_trait]
impl DeleteApi for StashDeployKeys {
    async fn delete_one(&self, cancel: &CancelToken, r: &DeployKeyRef) -> Result<()> {
        let current = self.fetch_one(cancel, r).await?;
        self.rest
            .delete(
                cancel,
                &format!("{}/{}", keys_path(&r.repository), current.key.id),
            )
            .await
            .for_resource(r)
    }
}

/// Team access is a group permission on the repository.
#[derive(Debug, Clone)]
pub struct StashTeamAccess {
    rest: Arc<RestClient>,
}

impl StashTeamAccess {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    async fn grant(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        permission: &str,
    ) -> Result<GroupPermission> {
        let path = format!(
            "{}{}",
            group_permissions_path(&r.repository),
            query(&[
                ("permission", permission.to_string()),
                ("name", r.team.clone()),
            ])
        );
        self.rest
            .send_ignoring_body::<()>(cancel, HttpMethod::Put, &path, None)
            .await
            .for_resource(r)?;
        self.fetch_one(cancel, r).await
    }
}

#[async_trait]
impl ResourceApi for StashTeamAccess {
    type Ref = TeamAccessRef;
    type Info = TeamAccessInfo;
    type Object = GroupPermission;

    fn kind(&self) -> &'static str {
        "team access"
    }

    fn check_info(&self, info: &TeamAccessInfo) -> Result<()> {
        match info.permission {
            Some(p @ (Permission::Triage | Permission::Maintain)) => Err(
                ProviderError::invalid_info(format!("stash has no `{p}` repository permission")),
            ),
            _ => Ok(()),
        }
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &TeamAccessRef) -> Result<GroupPermission> {
        find_paged(
            &self.rest,
            cancel,
            &group_permissions_path(&r.repository),
            &[("filter", r.team.clone())],
            r,
            |grant: &GroupPermission| grant.group.name == r.team,
        )
        .await
        .for_resource(r)
    }
}

#[async_trait]
impl ListApi for StashTeamAccess {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        options: ListOptions,
    ) -> Result<(Vec<GroupPermission>, Page)> {
        fetch_paged(
            &self.rest,
            cancel,
            &group_permissions_path(repository),
            options,
            &[],
        )
        .await
        .for_resource(repository)
    }
}

#[async_trait]
impl CreateApi for StashTeamAccess {
    fn new_object(&self, r: &TeamAccessRef, info: &TeamAccessInfo) -> Result<GroupPermission> {
        let Some(permission) = info.permission else {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no permission was given"
            )));
        };
        Ok(GroupPermission {
            group: Group {
                name: r.team.clone(),
            },
            permission: permission_to_stash(permission).to_string(),
        })
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &GroupPermission,
    ) -> Result<GroupPermission> {
        self.grant(cancel, r, &object.permission).await
    }
}

#[async_trait]
impl UpdateApi for StashTeamAccess {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &GroupPermission,
    ) -> Result<GroupPermission> {
        self.grant(cancel, r, &object.permission).await
    }
}

#[async_trait]
impl DeleteApi for StashTeamAccess {
    /// Stash answers 204 for groups without access, so presence is checked first.
    async fn delete_one(&self, cancel: &CancelToken, r: &TeamAccessRef) -> Result<()> {
        self.fetch_one(cancel, r).await?;
        let path = format!(
            "{}{}",
            group_permissions_path(&r.repository),
            query(&[("name", r.team.clone())])
        );
        self.rest.delete(cancel, &path).await.for_resource(r)
    }
}
