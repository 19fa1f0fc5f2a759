//! Deploy keys and group shares.

use std::sync::Arc;

use async_trait::async_trait;
use gitlab::api::{groups, projects};

use super::client::built;
use super::endpoints::{
    CreateDeployKey, DeleteDeployKey, DeployKeys, EditDeployKey, ShareProject, UnshareProject,
};
use super::types::{GitLabDeployKey, GitLabGroup, GitLabProject, SharedGroup};
use super::{GitLabClient, find_listed};
use crate::platform::{
    DeployKeyInfo, DeployKeyRef, OwnerRef, Permission, ProviderError, RepositoryRef, Result,
    ResultExt, TeamAccessInfo, TeamAccessRef, normalize_key,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, Page, ResourceApi,
    UpdateApi,
};

#[derive(Debug, Clone)]
pub struct GitLabDeployKeys {
    client: Arc<GitLabClient>,
}

impl GitLabDeployKeys {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitLabDeployKeys {
    type Ref = DeployKeyRef;
    type Info = DeployKeyInfo;
    type Object = GitLabDeployKey;

    fn kind(&self) -> &'static str {
        "deploy key"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &DeployKeyRef) -> Result<GitLabDeployKey> {
        let project = r.repository.full_name();
        find_listed(
            &self.client,
            cancel,
            DeployKeys { project: &project },
            r,
            |key: &GitLabDeployKey| key.title == r.name,
        )
        .await
        .for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabDeployKeys {
    type Parent = RepositoryRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        _options: ListOptions,
    ) -> Result<(Vec<GitLabDeployKey>, Page)> {
        let project = repository.full_name();
        let keys: Vec<GitLabDeployKey> = self
            .client
            .query_all(cancel, DeployKeys { project: &project })
            .await
            .for_resource(repository)?;
        Ok((keys, Page::last()))
    }
}

#[async_trait]
impl CreateApi for GitLabDeployKeys {
    fn new_object(&self, r: &DeployKeyRef, info: &DeployKeyInfo) -> Result<GitLabDeployKey> {
        if info.key.is_none() {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no key material was given"
            )));
        }
        let mut key = GitLabDeployKey {
            title: r.name.clone(),
            ..Default::default()
        };
        key.apply_info(info);
        Ok(key)
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &DeployKeyRef,
        object: &GitLabDeployKey,
    ) -> Result<GitLabDeployKey> {
        let project = r.repository.full_name();
        let create = CreateDeployKey {
            project: &project,
            title: &r.name,
            key: &object.key,
            can_push: object.can_push,
        };
        self.client
            .query(cancel, create)
            .await
            .for_resource(&r.repository)
    }
}

#[async_trait]
impl UpdateApi for GitLabDeployKeys {
    /// Only `can_push` is editable in place. New key material replaces the
    /// key.
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &DeployKeyRef,
        object: &GitLabDeployKey,
    ) -> Result<GitLabDeployKey> {
        let current = self.fetch_one(cancel, r).await?;
        let project = r.repository.full_name();
        if normalize_key(&current.key) != normalize_key(&object.key) {
            let delete = DeleteDeployKey {
                project: &project,
                id: current.id,
            };
            self.client.ignore(cancel, delete).await.for_resource(r)?;
            return self.create_one(cancel, r, object).await;
        }
        let edit = EditDeployKey {
            project: &project,
            id: current.id,
            can_push: object.can_push,
        };
        self.client.query(cancel, edit).await.for_resource(r)
    }
}

#[async_trait]
impl DeleteApi for GitLabDeployKeys {
    async fn delete_one(&self, cancel: &CancelToken, r: &DeployKeyRef) -> Result<()> {
        let current = self.fetch_one(cancel, r).await?;
        let project = r.repository.full_name();
        let delete = DeleteDeployKey {
            project: &project,
            id: current.id,
        };
        self.client.ignore(cancel, delete).await.for_resource(r)
    }
}

/// Full path of the group a team access ref names.
///
/// A bare name is a subgroup of the owning group; anything with a `/` is
/// already a full path.
fn team_group(r: &TeamAccessRef) -> String {
    match &r.repository.owner {
        OwnerRef::Organization(org) if !r.team.contains('/') => {
            format!("{}/{}", org.path, r.team)
        }
        _ => r.team.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct GitLabTeamAccess {
    client: Arc<GitLabClient>,
}

impl GitLabTeamAccess {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }

    async fn shares(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<Vec<SharedGroup>> {
        let full_name = r.full_name();
        let endpoint = built(projects::Project::builder().project(full_name.as_str()).build())?;
        let project: GitLabProject = self.client.query(cancel, endpoint).await.for_resource(r)?;
        Ok(project.shared_with_groups)
    }

    async fn share(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &SharedGroup,
    ) -> Result<SharedGroup> {
        let endpoint = built(
            groups::Group::builder()
                .group(object.group_full_path.as_str())
                .build(),
        )?;
        let group: GitLabGroup = self
            .client
            .query(cancel, endpoint)
            .await
            .with_context(|| format!("resolving group of {r}"))?;
        let project = r.repository.full_name();
        let share = ShareProject {
            project: &project,
            group_id: group.id,
            group_access: object.group_access_level,
        };
        self.client
            .ignore(cancel, share)
            .await
            .for_resource(&r.repository)?;
        self.fetch_one(cancel, r).await
    }

    async fn unshare(&self, cancel: &CancelToken, r: &TeamAccessRef, group_id: u64) -> Result<()> {
        let project = r.repository.full_name();
        let unshare = UnshareProject {
            project: &project,
            group_id,
        };
        self.client.ignore(cancel, unshare).await.for_resource(r)
    }
}

#[async_trait]
impl ResourceApi for GitLabTeamAccess {
    type Ref = TeamAccessRef;
    type Info = TeamAccessInfo;
    type Object = SharedGroup;

    fn kind(&self) -> &'static str {
        "team access"
    }

    fn check_info(&self, info: &TeamAccessInfo) -> Result<()> {
        match info.permission {
            Some(Permission::Triage) => Err(ProviderError::invalid_info(
                "gitlab has no `triage` access level",
            )),
            _ => Ok(()),
        }
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &TeamAccessRef) -> Result<SharedGroup> {
        let group = team_group(r);
        self.shares(cancel, &r.repository)
            .await?
            .into_iter()
            .find(|share| share.group_full_path == group)
            .ok_or_else(|| ProviderError::not_found(r.to_string()))
    }
}

#[async_trait]
impl ListApi for GitLabTeamAccess {
    type Parent = RepositoryRef;

    /// Shares are embedded in the project, so there is a single page.
    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        repository: &RepositoryRef,
        _options: ListOptions,
    ) -> Result<(Vec<SharedGroup>, Page)> {
        Ok((self.shares(cancel, repository).await?, Page::last()))
    }
}

#[async_trait]
impl CreateApi for GitLabTeamAccess {
    fn new_object(&self, r: &TeamAccessRef, info: &TeamAccessInfo) -> Result<SharedGroup> {
        if info.permission.is_none() {
            return Err(ProviderError::invalid_info(format!(
                "{r} does not exist and no permission was given"
            )));
        }
        let full_path = team_group(r);
        let mut share = SharedGroup {
            group_name: full_path.rsplit('/').next().unwrap_or_default().to_string(),
            group_full_path: full_path,
            ..Default::default()
        };
        share.apply_info(info);
        Ok(share)
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &SharedGroup,
    ) -> Result<SharedGroup> {
        self.share(cancel, r, object).await
    }
}

#[async_trait]
impl UpdateApi for GitLabTeamAccess {
    /// Shares have no edit endpoint: the group is unshared and shared again.
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &TeamAccessRef,
        object: &SharedGroup,
    ) -> Result<SharedGroup> {
        self.unshare(cancel, r, object.group_id).await?;
        self.share(cancel, r, object).await
    }
}

#[async_trait]
impl DeleteApi for GitLabTeamAccess {
    async fn delete_one(&self, cancel: &CancelToken, r: &TeamAccessRef) -> Result<()> {
        let current = self.fetch_one(cancel, r).await?;
        self.unshare(cancel, r, current.group_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::MockServer;

    use crate::gitlab::testing::*;
    use crate::platform::{DeployKeyInfo, GitProvider, Permission, TeamAccessInfo};
    use crate::reconcile::{CancelToken, ReconcileAction, ReconcileStage};

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIA";
    const KEYS: &str = "/api/v4/projects/acme%2Fplatform%2Finfra/deploy_keys";
    const OPS: &str = "/api/v4/groups/acme%2Fplatform%2Fops";

    fn shared(level: u8) -> serde_json::Value {
        let mut project = project_json("x", "private");
        project["shared_with_groups"] = json!([{
            "group_id": 8,
            "group_name": "ops",
            "group_full_path": "acme/platform/ops",
            "group_access_level": level
        }]);
        project
    }

    #[tokio::test]
    async fn read_only_flip_is_edited_in_place() {
        let server = MockServer::start().await;
        respond(
            &server,
            "GET",
            KEYS,
            200,
            json!([{"id": 4, "title": "ci", "key": format!("{KEY} ci@host"), "can_push": false}]),
        )
        .await;
        respond(
            &server,
            "PUT",
            &format!("{KEYS}/4"),
            200,
            json!({"id": 4, "title": "ci", "key": KEY, "can_push": true}),
        )
        .await;

        let done = provider(&server)
            .await
            .deploy_keys()
            .reconcile(
                &CancelToken::new(),
                &group_repo().deploy_key("ci"),
                &DeployKeyInfo {
                    key: Some(KEY.to_string()),
                    read_only: Some(false),
                },
            )
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Updated);
        assert_eq!(sent_count(&server, "DELETE").await, 0);
        let form = &sent_forms(&server, "PUT").await[0];
        assert_eq!(form.len(), 1);
        assert_eq!(form["can_push"], "true");
    }

    #[tokio::test]
    async fn new_key_material_replaces_key() {
        let server = MockServer::start().await;
        respond(
            &server,
            "GET",
            KEYS,
            200,
            json!([{"id": 4, "title": "ci", "key": "ssh-ed25519 OLD", "can_push": false}]),
        )
        .await;
        respond_status(&server, "DELETE", &format!("{KEYS}/4"), 204).await;
        respond(
            &server,
            "POST",
            KEYS,
            201,
            json!({"id": 5, "title": "ci", "key": KEY, "can_push": false}),
        )
        .await;

        let done = provider(&server)
            .await
            .deploy_keys()
            .reconcile(
                &CancelToken::new(),
                &group_repo().deploy_key("ci"),
                &DeployKeyInfo {
                    key: Some(KEY.to_string()),
                    read_only: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(done.object.api_object().id, 5);
        let form = &sent_forms(&server, "POST").await[0];
        assert_eq!(form["title"], "ci");
        assert_eq!(form["key"], KEY);
    }

    #[tokio::test]
    async fn bare_team_name_is_a_subgroup_of_the_owner() {
        let server = MockServer::start().await;
        respond(&server, "GET", PROJECT, 200, shared(30)).await;

        let info = provider(&server)
            .await
            .team_access()
            .get_info(&CancelToken::new(), &group_repo().team_access("ops"))
            .await
            .unwrap();
        assert_eq!(info.permission, Some(Permission::Push));
    }

    #[tokio::test]
    async fn missing_share_is_created_with_group_id() {
        let server = MockServer::start().await;
        respond_in_turn(&server, PROJECT, project_json("x", "private"), shared(40)).await;
        respond(
            &server,
            "GET",
            OPS,
            200,
            json!({"id": 8, "name": "ops", "full_path": "acme/platform/ops"}),
        )
        .await;
        respond_status(&server, "POST", &format!("{PROJECT}/share"), 201).await;

        let done = provider(&server)
            .await
            .team_access()
            .reconcile(
                &CancelToken::new(),
                &group_repo().team_access("ops"),
                &TeamAccessInfo {
                    permission: Some(Permission::Maintain),
                },
            )
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Created);
        let form = &sent_forms(&server, "POST").await[0];
        assert_eq!(form["group_id"], "8");
        assert_eq!(form["group_access"], "40");
    }

    #[tokio::test]
    async fn permission_change_reshares() {
        let server = MockServer::start().await;
        respond_in_turn(&server, PROJECT, shared(20), shared(50)).await;
        respond_status(&server, "DELETE", &format!("{PROJECT}/share/8"), 204).await;
        respond(
            &server,
            "GET",
            OPS,
            200,
            json!({"id": 8, "name": "ops", "full_path": "acme/platform/ops"}),
        )
        .await;
        respond_status(&server, "POST", &format!("{PROJECT}/share"), 201).await;

        let done = provider(&server)
            .await
            .team_access()
            .reconcile(
                &CancelToken::new(),
                &group_repo().team_access("acme/platform/ops"),
                &TeamAccessInfo {
                    permission: Some(Permission::Admin),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.action, ReconcileAction::Updated);
        assert_eq!(done.object.info().permission, Some(Permission::Admin));
        assert_eq!(sent_count(&server, "DELETE").await, 1);
    }

    #[tokio::test]
    async fn triage_is_rejected_up_front() {
        let server = MockServer::start().await;
        let err = provider(&server)
            .await
            .team_access()
            .reconcile(
                &CancelToken::new(),
                &group_repo().team_access("ops"),
                &TeamAccessInfo {
                    permission: Some(Permission::Triage),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage, ReconcileStage::Validate);
        assert_eq!(sent_count(&server, "GET").await, 0);
    }
}
