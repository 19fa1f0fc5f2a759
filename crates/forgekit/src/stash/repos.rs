use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::types::{Branch, Project, Repository, RepositoryWrite, full_ref};
use super::{API, fetch_paged, project_key, repo_path};
use crate::http::HttpMethod;
use crate::platform::{
    OwnerRef, ProviderError, RepositoryInfo, RepositoryRef, Result, ResultExt, Visibility,
};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, Page, ResourceApi,
    UpdateApi,
};
use crate::rest::RestClient;

#[derive(Debug, Clone)]
pub struct StashRepositories {
    rest: Arc<RestClient>,
}

impl StashRepositories {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    async fn default_branch(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
    ) -> Result<Option<String>> {
        let branch: Option<Branch> = self
            .rest
            .get_optional(cancel, &format!("{}/branches/default", repo_path(r)))
            .await?;
        Ok(branch.map(|b| b.display_id))
    }

    async fn set_default_branch(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        branch: &str,
    ) -> Result<()> {
        self.rest
            .send_ignoring_body(
                cancel,
                HttpMethod::Put,
                &format!("{}/branches/default", repo_path(r)),
                Some(&json!({ "id": full_ref(branch) })),
            )
            .await
            .with_context(|| format!("setting default branch of {r}"))
    }
}

#[async_trait]
impl ResourceApi for StashRepositories {
    type Ref = RepositoryRef;
    type Info = RepositoryInfo;
    type Object = Repository;

    fn kind(&self) -> &'static str {
        "repository"
    }

    fn check_info(&self, info: &RepositoryInfo) -> Result<()> {
        if info.visibility == Some(Visibility::Internal) {
            return Err(ProviderError::invalid_info(
                "stash repositories are either public or private",
            ));
        }
        Ok(())
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<Repository> {
        let mut repo: Repository = self.rest.get(cancel, &repo_path(r)).await.for_resource(r)?;
        repo.default_branch = self.default_branch(cancel, r).await?;
        Ok(repo)
    }
}

#[async_trait]
impl ListApi for StashRepositories {
    type Parent = OwnerRef;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        owner: &OwnerRef,
        options: ListOptions,
    ) -> Result<(Vec<Repository>, Page)> {
        let path = format!("{API}/projects/{}/repos", project_key(owner));
        fetch_paged(&self.rest, cancel, &path, options, &[])
            .await
            .for_resource(owner)
    }
}

#[async_trait]
impl CreateApi for StashRepositories {
    fn new_object(&self, r: &RepositoryRef, info: &RepositoryInfo) -> Result<Repository> {
        let mut repo = Repository {
            slug: r.name.clone(),
            name: r.name.clone(),
            scm_id: "git".to_string(),
            forkable: true,
            project: Project {
                key: project_key(&r.owner),
                ..Default::default()
            },
            ..Default::default()
        };
        repo.apply_info(info);
        Ok(repo)
    }

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        object: &Repository,
    ) -> Result<Repository> {
        let path = format!("{API}/projects/{}/repos", project_key(&r.owner));
        let mut created: Repository = self
            .rest
            .post(cancel, &path, &RepositoryWrite::from(object))
            .await
            .for_resource(&r.owner)?;

        if let Some(branch) = &object.default_branch {
            self.set_default_branch(cancel, r, branch).await?;
            created.default_branch = Some(branch.clone());
        }
        Ok(created)
    }
}

#[async_trait]
impl UpdateApi for StashRepositories {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        object: &Repository,
    ) -> Result<Repository> {
        let mut updated: Repository = self
            .rest
            .put(cancel, &repo_path(r), &RepositoryWrite::from(object))
            .await
            .for_resource(r)?;

        let current = self.default_branch(cancel, r).await?;
        updated.default_branch = match &object.default_branch {
            Some(branch) if current.as_ref() != Some(branch) => {
                self.set_default_branch(cancel, r, branch).await?;
                Some(branch.clone())
            }
            _ => current,
        };
        Ok(updated)
    }
}

#[async_trait]
impl DeleteApi for StashRepositories {
    async fn delete_one(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<()> {
        self.rest
            .delete(cancel, &repo_path(r))
            .await
            .for_resource(r)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::http::{HttpMethod, MockTransport};
    use crate::platform::{GitProvider, OwnerRef, RepositoryInfo, Visibility};
    use crate::reconcile::{CancelToken, ReconcileAction, ReconcileStage};
    use crate::stash::testing::*;

    const REPO: &str = "/rest/api/1.0/projects/PLAT/repos/infra";

    fn default_branch(transport: &MockTransport, name: &str) {
        transport.push_json(
            HttpMethod::Get,
            url(&format!("{REPO}/branches/default")),
            200,
            json!({"id": format!("refs/heads/{name}"), "displayId": name, "latestCommit": "abc", "isDefault": true}),
        );
    }

    #[tokio::test]
    async fn get_fills_default_branch() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, url(REPO), 200, repo_json("infra", "Infra", false));
        default_branch(&transport, "main");

        let repo = provider(&transport)
            .repositories()
            .get(&CancelToken::new(), &org_repo())
            .await
            .unwrap();

        let info = repo.info();
        assert_eq!(info.default_branch.as_deref(), Some("main"));
        assert_eq!(info.visibility, Some(Visibility::Private));
        assert_eq!(info.description.as_deref(), Some("Infra"));
    }

    #[tokio::test]
    async fn empty_repository_has_no_default_branch() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, url(REPO), 200, repo_json("infra", "", true));
        transport.push_status(HttpMethod::Get, url(&format!("{REPO}/branches/default")), 204);

        let info = provider(&transport)
            .repositories()
            .get_info(&CancelToken::new(), &org_repo())
            .await
            .unwrap();
        assert!(info.default_branch.is_none());
    }

    #[tokio::test]
    async fn reconcile_creates_missing_repository() {
        let transport = MockTransport::new();
        transport.push_status(HttpMethod::Get, url(REPO), 404);
        transport.push_json(
            HttpMethod::Post,
            url("/rest/api/1.0/projects/PLAT/repos"),
            201,
            repo_json("infra", "Infra", false),
        );

        let desired = RepositoryInfo {
            description: Some("Infra".to_string()),
            visibility: Some(Visibility::Private),
            default_branch: None,
        };
        let done = provider(&transport)
            .repositories()
            .reconcile(&CancelToken::new(), &org_repo(), &desired)
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Created);
        let body: serde_json::Value =
            serde_json::from_slice(&transport.requests_with(HttpMethod::Post)[0].body).unwrap();
        assert_eq!(body["name"], "infra");
        assert_eq!(body["scmId"], "git");
        assert_eq!(body["public"], false);
        assert_eq!(body["description"], "Infra");
    }

    #[tokio::test]
    async fn reconcile_updates_only_description() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, url(REPO), 200, repo_json("infra", "y", true));
        default_branch(&transport, "main");
        transport.push_json(HttpMethod::Put, url(REPO), 200, repo_json("infra", "x", true));
        default_branch(&transport, "main");

        let desired = RepositoryInfo {
            description: Some("x".to_string()),
            ..Default::default()
        };
        let done = provider(&transport)
            .repositories()
            .reconcile(&CancelToken::new(), &org_repo(), &desired)
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Updated);
        let put: serde_json::Value =
            serde_json::from_slice(&transport.requests_with(HttpMethod::Put)[0].body).unwrap();
        assert_eq!(put["description"], "x");
        assert_eq!(put["public"], true);
        assert_eq!(done.object.info().default_branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn reconcile_matching_state_is_a_no_op() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, url(REPO), 200, repo_json("infra", "y", false));
        default_branch(&transport, "main");

        let desired = RepositoryInfo {
            visibility: Some(Visibility::Private),
            default_branch: Some("main".to_string()),
            ..Default::default()
        };
        let done = provider(&transport)
            .repositories()
            .reconcile(&CancelToken::new(), &org_repo(), &desired)
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Unchanged);
        assert!(transport.requests_with(HttpMethod::Put).is_empty());
        assert!(transport.requests_with(HttpMethod::Post).is_empty());
    }

    #[tokio::test]
    async fn default_branch_change_is_written() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, url(REPO), 200, repo_json("infra", "y", false));
        default_branch(&transport, "master");
        transport.push_json(HttpMethod::Put, url(REPO), 200, repo_json("infra", "y", false));
        default_branch(&transport, "master");
        transport.push_status(HttpMethod::Put, url(&format!("{REPO}/branches/default")), 204);

        let desired = RepositoryInfo {
            default_branch: Some("main".to_string()),
            ..Default::default()
        };
        let done = provider(&transport)
            .repositories()
            .reconcile(&CancelToken::new(), &org_repo(), &desired)
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Updated);
        let puts = transport.requests_with(HttpMethod::Put);
        let branch_body: serde_json::Value = serde_json::from_slice(&puts[1].body).unwrap();
        assert_eq!(branch_body["id"], "refs/heads/main");
    }

    #[tokio::test]
    async fn internal_visibility_is_rejected_up_front() {
        let transport = MockTransport::new();
        let err = provider(&transport)
            .repositories()
            .reconcile(
                &CancelToken::new(),
                &org_repo(),
                &RepositoryInfo {
                    visibility: Some(Visibility::Internal),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage, ReconcileStage::Validate);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn list_drains_personal_project() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            url("/rest/api/1.0/projects/~alice/repos?start=0&limit=100"),
            200,
            page(json!([repo_json("a", "", false)]), Some(1)),
        );
        transport.push_json(
            HttpMethod::Get,
            url("/rest/api/1.0/projects/~alice/repos?start=1&limit=100"),
            200,
            page(json!([repo_json("b", "", false)]), None),
        );

        let repos = provider(&transport)
            .repositories()
            .list(&CancelToken::new(), &OwnerRef::user("alice"))
            .await
            .unwrap();
        let slugs: Vec<_> = repos.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, ["a", "b"]);
    }

    #[tokio::test]
    async fn delete_missing_repository_is_not_found() {
        let transport = MockTransport::new();
        transport.push_status(HttpMethod::Delete, url(REPO), 404);

        let err = provider(&transport)
            .repositories()
            .delete(&CancelToken::new(), &org_repo())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: repository PLAT/infra");
    }
}
