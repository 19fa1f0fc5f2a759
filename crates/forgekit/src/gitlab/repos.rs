use std::sync::Arc;

use async_trait::async_trait;
use gitlab::api::{groups, projects, users};

use super::client::built;
use super::endpoints::{CreateProject, DeleteProject, EditProject, Namespace};
use super::types::{GitLabNamespace, GitLabProject};
use super::GitLabClient;
use crate::platform::{OwnerRef, RepositoryInfo, RepositoryRef, Result, ResultExt};
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, Page, ResourceApi,
    UpdateApi,
};

#[derive(Debug, Clone)]
pub struct GitLabProjects {
    client: Arc<GitLabClient>,
}

impl GitLabProjects {
    pub(crate) fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }

    /// Id of the user or group namespace that will own a new project.
    async fn namespace_id(&self, cancel: &CancelToken, owner: &OwnerRef) -> Result<u64> {
        let namespace: GitLabNamespace = self
            .client
            .query(cancel, Namespace { path: owner.name() })
            .await
            .for_resource(owner)?;
        Ok(namespace.id)
    }
}

#[async_trait]
impl ResourceApi for GitLabProjects {
    type Ref = RepositoryRef;
    type Info = RepositoryInfo;
    type Object = GitLabProject;

    fn kind(&self) -> &'static str {
        "repository"
    }

    async fn fetch_one(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<GitLabProject> {
        let full_name = r.full_name();
        let endpoint = built(projects::Project::builder().project(full_name.as_str()).build())?;
        self.client.query(cancel, endpoint).await.for_resource(r)
    }
}

#[async_trait]
impl ListApi for GitLabProjects {
    type Parent = OwnerRef;

    /// Projects directly in the namespace; subgroup projects are not included.
    /// The client follows every page itself, so this is always the last page.
    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        owner: &OwnerRef,
        _options: ListOptions,
    ) -> Result<(Vec<GitLabProject>, Page)> {
        let items: Vec<GitLabProject> = match owner {
            OwnerRef::Organization(org) => {
                let endpoint = built(
                    groups::projects::GroupProjects::builder()
                        .group(org.path.as_str())
                        .build(),
                )?;
                self.client.query_all(cancel, endpoint).await
            }
            OwnerRef::User(user) => {
                let endpoint =
                    built(users::UserProjects::builder().user(user.login.as_str()).build())?;
                self.client.query_all(cancel, endpoint).await
            }
        }
        .for_resource(owner)?;
        Ok((items, Page::last()))
    }
}

#[async_trait]
impl CreateApi for GitLabProjects {
    fn new_object(&self, r: &RepositoryRef, info: &RepositoryInfo) -> Result<GitLabProject> {
        let mut project = GitLabProject {
            name: r.name.clone(),
            path: r.name.clone(),
            path_with_namespace: r.full_name(),
            visibility: "private".to_string(),
            ..Default::default()
        };
        project.apply_info(info);
        Ok(project)
    }

    /// The default branch only exists once something is pushed, so it is set
    /// with a follow-up edit when it differs from the server's choice.
    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        object: &GitLabProject,
    ) -> Result<GitLabProject> {
        let namespace_id = self.namespace_id(cancel, &r.owner).await?;
        let create = CreateProject {
            name: &object.name,
            path: &object.path,
            namespace_id,
            description: object.description.as_deref(),
            visibility: &object.visibility,
        };
        let created: GitLabProject = self
            .client
            .query(cancel, create)
            .await
            .for_resource(&r.owner)?;

        match &object.default_branch {
            Some(branch) if created.default_branch.as_ref() != Some(branch) => {
                let full_name = r.full_name();
                let edit = EditProject {
                    project: &full_name,
                    default_branch: Some(branch.as_str()),
                    ..Default::default()
                };
                self.client
                    .query(cancel, edit)
                    .await
                    .with_context(|| format!("setting default branch of {r}"))
            }
            _ => Ok(created),
        }
    }
}

#[async_trait]
impl UpdateApi for GitLabProjects {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &RepositoryRef,
        object: &GitLabProject,
    ) -> Result<GitLabProject> {
        let full_name = r.full_name();
        self.client
            .query(cancel, EditProject::settings(&full_name, object))
            .await
            .for_resource(r)
    }
}

#[async_trait]
impl DeleteApi for GitLabProjects {
    /// Deletion is asynchronous on the server; the project may remain visible
    /// for a while after this returns.
    async fn delete_one(&self, cancel: &CancelToken, r: &RepositoryRef) -> Result<()> {
        let full_name = r.full_name();
        self.client
            .ignore(cancel, DeleteProject { project: &full_name })
            .await
            .for_resource(r)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::MockServer;

    use crate::gitlab::testing::*;
    use crate::platform::{GitProvider, OwnerRef, RepositoryInfo, Visibility};
    use crate::reconcile::{CancelToken, ReconcileAction};

    #[tokio::test]
    async fn missing_project_is_created_in_namespace() {
        let server = MockServer::start().await;
        respond(&server, "GET", PROJECT, 404, error_json("404 Project Not Found")).await;
        respond(
            &server,
            "GET",
            "/api/v4/namespaces/acme%2Fplatform",
            200,
            json!({"id": 5, "full_path": "acme/platform", "kind": "group"}),
        )
        .await;
        respond(&server, "POST", "/api/v4/projects", 201, project_json("Infra", "internal")).await;

        let done = provider(&server)
            .await
            .repositories()
            .reconcile(
                &CancelToken::new(),
                &group_repo(),
                &RepositoryInfo {
                    description: Some("Infra".to_string()),
                    visibility: Some(Visibility::Internal),
                    default_branch: Some("main".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Created);
        let form = &sent_forms(&server, "POST").await[0];
        assert_eq!(form["namespace_id"], "5");
        assert_eq!(form["path"], "infra");
        assert_eq!(form["visibility"], "internal");
        assert_eq!(sent_count(&server, "PUT").await, 0);
    }

    #[tokio::test]
    async fn differing_default_branch_is_set_after_create() {
        let server = MockServer::start().await;
        respond(&server, "GET", PROJECT, 404, error_json("404 Project Not Found")).await;
        respond(
            &server,
            "GET",
            "/api/v4/namespaces/acme%2Fplatform",
            200,
            json!({"id": 5, "full_path": "acme/platform", "kind": "group"}),
        )
        .await;
        respond(&server, "POST", "/api/v4/projects", 201, project_json("", "private")).await;
        let mut trunk = project_json("", "private");
        trunk["default_branch"] = json!("trunk");
        respond(&server, "PUT", PROJECT, 200, trunk).await;

        provider(&server)
            .await
            .repositories()
            .create(
                &CancelToken::new(),
                &group_repo(),
                &RepositoryInfo {
                    default_branch: Some("trunk".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let edits = sent_forms(&server, "PUT").await;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0]["default_branch"], "trunk");
        assert!(!edits[0].contains_key("visibility"));
    }

    #[tokio::test]
    async fn visibility_change_is_put() {
        let server = MockServer::start().await;
        respond(&server, "GET", PROJECT, 200, project_json("x", "private")).await;
        respond(&server, "PUT", PROJECT, 200, project_json("x", "public")).await;

        let done = provider(&server)
            .await
            .repositories()
            .reconcile(
                &CancelToken::new(),
                &group_repo(),
                &RepositoryInfo {
                    visibility: Some(Visibility::Public),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(done.action, ReconcileAction::Updated);
        let form = &sent_forms(&server, "PUT").await[0];
        assert_eq!(form["visibility"], "public");
        assert!(!form.contains_key("namespace_id"));
    }

    #[tokio::test]
    async fn matching_project_is_unchanged() {
        let server = MockServer::start().await;
        respond(&server, "GET", PROJECT, 200, project_json("x", "private")).await;

        let done = provider(&server)
            .await
            .repositories()
            .reconcile(
                &CancelToken::new(),
                &group_repo(),
                &RepositoryInfo {
                    description: Some("x".to_string()),
                    visibility: Some(Visibility::Private),
                    default_branch: Some("main".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.action, ReconcileAction::Unchanged);
        assert_eq!(sent_count(&server, "GET").await, 1);
        assert_eq!(sent_count(&server, "PUT").await, 0);
    }

    #[tokio::test]
    async fn user_projects_are_listed_by_username() {
        let server = MockServer::start().await;
        respond(
            &server,
            "GET",
            "/api/v4/users/alice/projects",
            200,
            json!([{
                "id": 1,
                "name": "dotfiles",
                "path": "dotfiles",
                "path_with_namespace": "alice/dotfiles",
                "visibility": "public"
            }]),
        )
        .await;

        let repos = provider(&server)
            .await
            .repositories()
            .list_info(&CancelToken::new(), &OwnerRef::user("alice"))
            .await
            .unwrap();
        assert_eq!(repos[0].visibility, Some(Visibility::Public));
        assert_eq!(repos[0].description.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn user_project_path_is_encoded() {
        let server = MockServer::start().await;
        let mut dotfiles = project_json("", "public");
        dotfiles["path_with_namespace"] = json!("alice/dotfiles");
        respond(&server, "GET", "/api/v4/projects/alice%2Fdotfiles", 200, dotfiles).await;

        let info = provider(&server)
            .await
            .repositories()
            .get_info(&CancelToken::new(), &user_repo())
            .await
            .unwrap();
        assert_eq!(info.visibility, Some(Visibility::Public));
    }

    #[tokio::test]
    async fn delete_missing_project_reports_not_found() {
        let server = MockServer::start().await;
        respond(&server, "DELETE", PROJECT, 404, error_json("404 Project Not Found")).await;

        let removed = provider(&server)
            .await
            .repositories()
            .delete_if_exists(&CancelToken::new(), &group_repo())
            .await
            .unwrap();
        assert!(!removed);
    }
}
