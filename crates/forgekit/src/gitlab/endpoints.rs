//! Endpoints the `gitlab` crate has no typed builder for.
//!
//! Each one is a plain struct implementing [`Endpoint`]; listings are also
//! [`Pageable`] so `api::paged` can follow them.

use std::borrow::Cow;

use gitlab::api::{BodyError, Endpoint, FormParams, Pageable, QueryParams};
use http::Method;

use super::types::GitLabProject;
use crate::rest::encode_segment;

type Body = Result<Option<(&'static str, Vec<u8>)>, BodyError>;

fn project(path: &str) -> String {
    format!("projects/{}", encode_segment(path))
}

/// A user or group namespace by full path.
#[derive(Debug, Clone, Copy)]
pub struct Namespace<'a> {
    pub path: &'a str,
}

impl Endpoint for Namespace<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("namespaces/{}", encode_segment(self.path)).into()
    }
}

/// Groups without a parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevelGroups;

impl Endpoint for TopLevelGroups {
    fn method(&self) -> Method {
        Method::GET
    }

    fn endpoint(&self) -> Cow<'static, str> {
        "groups".into()
    }

    fn parameters(&self) -> QueryParams<'_> {
        let mut params = QueryParams::default();
        params.push("top_level_only", true);
        params
    }
}

impl Pageable for TopLevelGroups {}

/// Direct subgroups of a group.
#[derive(Debug, Clone, Copy)]
pub struct Subgroups<'a> {
    pub group: &'a str,
}

impl Endpoint for Subgroups<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("groups/{}/subgroups", encode_segment(self.group)).into()
    }
}

impl Pageable for Subgroups<'_> {}

#[derive(Debug, Clone)]
pub struct CreateProject<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub namespace_id: u64,
    pub description: Option<&'a str>,
    pub visibility: &'a str,
}

impl Endpoint for CreateProject<'_> {
    fn method(&self) -> Method {
        Method::POST
    }

    fn endpoint(&self) -> Cow<'static, str> {
        "projects".into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params
            .push("name", self.name)
            .push("path", self.path)
            .push("namespace_id", self.namespace_id)
            .push_opt("description", self.description)
            .push("visibility", self.visibility);
        params.into_body()
    }
}

/// Edit of a project's settings. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct EditProject<'a> {
    pub project: &'a str,
    pub description: Option<&'a str>,
    pub visibility: Option<&'a str>,
    pub default_branch: Option<&'a str>,
}

impl<'a> EditProject<'a> {
    /// Editable settings of `object`, written to `project`.
    pub fn settings(project: &'a str, object: &'a GitLabProject) -> Self {
        Self {
            project,
            description: object.description.as_deref(),
            visibility: Some(&object.visibility),
            default_branch: object.default_branch.as_deref(),
        }
    }
}

impl Endpoint for EditProject<'_> {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn endpoint(&self) -> Cow<'static, str> {
        project(self.project).into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params
            .push_opt("description", self.description)
            .push_opt("visibility", self.visibility)
            .push_opt("default_branch", self.default_branch);
        params.into_body()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteProject<'a> {
    pub project: &'a str,
}

impl Endpoint for DeleteProject<'_> {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn endpoint(&self) -> Cow<'static, str> {
        project(self.project).into()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeployKeys<'a> {
    pub project: &'a str,
}

impl Endpoint for DeployKeys<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/deploy_keys", project(self.project)).into()
    }
}

impl Pageable for DeployKeys<'_> {}

#[derive(Debug, Clone)]
pub struct CreateDeployKey<'a> {
    pub project: &'a str,
    pub title: &'a str,
    pub key: &'a str,
    pub can_push: bool,
}

impl Endpoint for CreateDeployKey<'_> {
    fn method(&self) -> Method {
        Method::POST
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/deploy_keys", project(self.project)).into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params
            .push("title", self.title)
            .push("key", self.key)
            .push("can_push", self.can_push);
        params.into_body()
    }
}

/// Only `can_push` (and the title) can change on an existing key.
#[derive(Debug, Clone, Copy)]
pub struct EditDeployKey<'a> {
    pub project: &'a str,
    pub id: u64,
    pub can_push: bool,
}

impl Endpoint for EditDeployKey<'_> {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/deploy_keys/{}", project(self.project), self.id).into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params.push("can_push", self.can_push);
        params.into_body()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteDeployKey<'a> {
    pub project: &'a str,
    pub id: u64,
}

impl Endpoint for DeleteDeployKey<'_> {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/deploy_keys/{}", project(self.project), self.id).into()
    }
}

/// Share a project with a group at an access level.
#[derive(Debug, Clone, Copy)]
pub struct ShareProject<'a> {
    pub project: &'a str,
    pub group_id: u64,
    pub group_access: u8,
}

impl Endpoint for ShareProject<'_> {
    fn method(&self) -> Method {
        Method::POST
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/share", project(self.project)).into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params
            .push("group_id", self.group_id)
            .push("group_access", u64::from(self.group_access));
        params.into_body()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnshareProject<'a> {
    pub project: &'a str,
    pub group_id: u64,
}

impl Endpoint for UnshareProject<'_> {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/share/{}", project(self.project), self.group_id).into()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteBranch<'a> {
    pub project: &'a str,
    pub branch: &'a str,
}

impl Endpoint for DeleteBranch<'_> {
    fn method(&self) -> Method {
        Method::DELETE
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!(
            "{}/repository/branches/{}",
            project(self.project),
            encode_segment(self.branch)
        )
        .into()
    }
}

#[derive(Debug, Clone)]
pub struct CreateMergeRequest<'a> {
    pub project: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub source_branch: &'a str,
    pub target_branch: &'a str,
}

impl Endpoint for CreateMergeRequest<'_> {
    fn method(&self) -> Method {
        Method::POST
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/merge_requests", project(self.project)).into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params
            .push("title", self.title)
            .push("description", self.description)
            .push("source_branch", self.source_branch)
            .push("target_branch", self.target_branch);
        params.into_body()
    }
}

#[derive(Debug, Clone)]
pub struct EditMergeRequest<'a> {
    pub project: &'a str,
    pub iid: u64,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub target_branch: &'a str,
}

impl Endpoint for EditMergeRequest<'_> {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/merge_requests/{}", project(self.project), self.iid).into()
    }

    fn body(&self) -> Body {
        let mut params = FormParams::default();
        params
            .push("title", self.title)
            .push_opt("description", self.description)
            .push("target_branch", self.target_branch);
        params.into_body()
    }
}

/// Accept a merge request. A squash takes its message in
/// `squash_commit_message`, a merge commit in `merge_commit_message`.
#[derive(Debug, Clone)]
pub struct AcceptMergeRequest<'a> {
    pub project: &'a str,
    pub iid: u64,
    pub squash: bool,
    pub message: Option<&'a str>,
}

impl Endpoint for AcceptMergeRequest<'_> {
    fn method(&self) -> Method {
        Method::PUT
    }

    fn endpoint(&self) -> Cow<'static, str> {
        format!("{}/merge_requests/{}/merge", project(self.project), self.iid).into()
    }

    fn body(&self) -> Body {
        let message_field = if self.squash {
            "squash_commit_message"
        } else {
            "merge_commit_message"
        };
        let mut params = FormParams::default();
        if self.squash {
            params.push("squash", true);
        }
        params.push_opt(message_field, self.message);
        params.into_body()
    }
}
