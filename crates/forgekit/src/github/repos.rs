use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::pagination::fetch_page;
use super::types::{Account, Repository, RepositoryWrite};
use super::{GitHubClient, repo_path};
use crate::platform::{
    OwnerRef, ProviderError, RepositoryInfo, RepositoryRef, Result, ResultExt, Visibility,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, Page, ResourceApi,
    UpdateApi,
};
use crate::rest::encode_segment;

#[derive(Debug, Clone)]
pub struct GitHubRepositories {
    client: Arc<GitHubClient>,
}

impl GitHubRepositories {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceApi for GitHubRepositories {
    type Ref = RepositoryRef;
    type Info = RepositoryInfo;
    type Object = Repository;

    fn kind(&self) -> &'static str {
        "repository"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<Repository> {
        self.client.get(cancel, &repo_path(r)).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitHubRepositories {
    type Parent = OwnerRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        owner: &OwnerRef,
        options: ListOptions,
    ) -> Result<(Vec<Repository>, Page)> {
        let path = match owner {
            OwnerRef::Organization(org) => format!("/orgs/{}/repos", encode_segment(&org.path)),
            OwnerRef::User(user) => format!("/users/{}/repos", encode_segment(&user.login)),
        };
        fetch_page(&self.client, cancel, &path, options, &[])
            .await
            .for_resource(owner)
    }
}

#[async_trait]
impl CreateApi for GitHubRepositories {
    fn new_object(&self, r: &RepositoryRef, info: &RepositoryInfo) -> Result<Repository> {
        if !r.owner.is_organization() && info.visibility == Some(Visibility::Internal) {
            return Err(ProviderError::invalid_info(
                "internal visibility is only available to organization repositories",
            ));
        }
        let mut repo = Repository {
            name: r.name.clone(),
            full_name: r.full_name(),
            owner: Account {
                login: r.owner.name().to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        repo.apply_info(info);
        Ok(repo)
    }

    /// The default branch cannot be chosen at creation; it is set afterwards
    /// when it differs from the one GitHub picked.
    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        object: &Repository,
    ) -> Result<Repository> {
        let path = match &r.owner {
            OwnerRef::Organization(org) => format!("/orgs/{}/repos", encode_segment(&org.path)),
            OwnerRef::User(_) => "/user/repos".to_string(),
        };
        let body = RepositoryWrite {
            default_branch: None,
            ..RepositoryWrite::new(object)
        };
        let created: Repository = self
            .client
            .post(cancel, &path, &body)
            .await
            .for_resource(&r.owner)?;

        match &object.default_branch {
            Some(branch) if created.default_branch.as_ref() != Some(branch) => self
                .client
                .patch(cancel, &repo_path(r), &json!({"default_branch": branch}))
                .await
                .with_context(|| format!("setting default branch of {r}")),
            _ => Ok(created),
        }
    }
}

#[async_trait]
impl UpdateApi for GitHubRepositories {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        object: &Repository,
    ) -> Result<Repository> {
        self.client
            .patch(cancel, &repo_path(r), &RepositoryWrite::new(object))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl DeleteApi for GitHubRepositories {
    async fn delete_one(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<()> {
        self.client.delete(cancel, &repo_path(r)).await.for_resource(r)
    }
}
