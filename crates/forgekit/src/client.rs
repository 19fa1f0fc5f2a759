//! Per-resource-kind client facade.
//!
//! [`ResourceClient`] wraps one backend API and exposes the uniform
//! get / list / create / update / delete / reconcile surface. Which methods
//! exist for a kind follows from which capability traits its API implements.

mod repository;
mod resource;

use std::sync::Arc;

use crate::platform::{DesiredInfo, Result};
use crate::reconcile::{
    self, CancelToken, CreateApi, DeleteApi, InfoMapper, ListApi, ListOptions, ReconcileError,
    Reconciled, ResourceApi, UpdateApi, drain_validated, validated,
};

pub use repository::{OrgRepository, Repository, RepositoryHandle, UserRepository};
pub use resource::Resource;

/// Client for one resource kind of one backend.
pub struct ResourceClient<A> {
    api: Arc<A>,
    page_size: u32,
}

impl<A> Clone for ResourceClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            page_size: self.page_size,
        }
    }
}

impl<A: ResourceApi> ResourceClient<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            page_size: reconcile::DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The backend API, for provider-specific calls.
    #[inline]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch and validate the raw provider object.
    pub async fn get_object(&self, cancel: &CancelToken, r: &A::Ref) -> Result<A::Object> {
        let object = self.api.fetch_one(cancel, r).await?;
        validated(object)
    }

    /// Fetch a resource handle.
    pub async fn get(&self, cancel: &CancelToken, r: &A::Ref) -> Result<Resource<A>> {
        let object = self.get_object(cancel, r).await?;
        Ok(Resource::new(self.clone(), r.clone(), object))
    }

    /// Fetch and return only the unified info.
    pub async fn get_info(&self, cancel: &CancelToken, r: &A::Ref) -> Result<A::Info> {
        Ok(self.get_object(cancel, r).await?.to_info())
    }

    fn check_desired(&self, desired: &A::Info) -> Result<()> {
        desired.validate_info()?;
        self.api.check_info(desired)
    }
}

impl<A: ListApi> ResourceClient<A> {
    /// Every resource under `parent`, all pages drained and validated.
    pub async fn list(&self, cancel: &CancelToken, parent: &A::Parent) -> Result<Vec<A::Object>> {
        let api = &self.api;
        let objects = drain_validated(
            ListOptions::with_page_size(self.page_size),
            cancel,
            |options| api.fetch_page(cancel, parent, options),
        )
        .await?;
        tracing::debug!(
            kind = api.kind(),
            parent = %parent,
            count = objects.len(),
            "Listed"
        );
        Ok(objects)
    }

    /// [`ResourceClient::list`], converted to infos.
    pub async fn list_info(&self, cancel: &CancelToken, parent: &A::Parent) -> Result<Vec<A::Info>> {
        Ok(self
            .list(cancel, parent)
            .await?
            .iter()
            .map(InfoMapper::to_info)
            .collect())
    }
}

impl<A: CreateApi> ResourceClient<A> {
    /// Create `r` from `desired`. Does not check for an existing resource.
    pub async fn create(
        &self,
        cancel: &CancelToken,
        r: &A::Ref,
        desired: &A::Info,
    ) -> Result<Resource<A>> {
        self.check_desired(desired)?;
        let object = self.api.new_object(r, desired)?;
        let created = validated(self.api.create_one(cancel, r, &object).await?)?;
        tracing::info!(kind = self.api.kind(), resource = %r, "Created");
        Ok(Resource::new(self.clone(), r.clone(), created))
    }
}

impl<A: UpdateApi> ResourceClient<A> {
    /// Re-fetch `r`, apply `desired` and push the result.
    pub async fn update(
        &self,
        cancel: &CancelToken,
        r: &A::Ref,
        desired: &A::Info,
    ) -> Result<Resource<A>> {
        self.check_desired(desired)?;
        let current = self.get_object(cancel, r).await?;
        let merged = reconcile::applied(&current, desired);
        let updated = validated(self.api.update_one(cancel, r, &merged).await?)?;
        tracing::info!(kind = self.api.kind(), resource = %r, "Updated");
        Ok(Resource::new(self.clone(), r.clone(), updated))
    }
}

impl<A: DeleteApi> ResourceClient<A> {
    /// Delete `r`. An absent resource is `NotFound`.
    pub async fn delete(&self, cancel: &CancelToken, r: &A::Ref) -> Result<()> {
        match self.api.delete_one(cancel, r).await {
            Ok(()) => {
                tracing::info!(kind = self.api.kind(), resource = %r, "Deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(kind = self.api.kind(), resource = %r, "Delete of missing resource");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete `r` if it exists. Returns whether something was deleted.
    pub async fn delete_if_exists(&self, cancel: &CancelToken, r: &A::Ref) -> Result<bool> {
        match self.api.delete_one(cancel, r).await {
            Ok(()) => {
                tracing::info!(kind = self.api.kind(), resource = %r, "Deleted");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<A: CreateApi + UpdateApi> ResourceClient<A> {
    /// Make `r` match `desired`, creating or updating as needed.
    pub async fn reconcile(
        &self,
        cancel: &CancelToken,
        r: &A::Ref,
        desired: &A::Info,
    ) -> std::result::Result<Reconciled<Resource<A>>, ReconcileError> {
        match reconcile::reconcile(self.api.as_ref(), cancel, r, desired).await {
            Ok(done) => Ok(Reconciled {
                object: Resource::new(self.clone(), r.clone(), done.object),
                action: done.action,
            }),
            Err(e) => {
                tracing::warn!(
                    kind = self.api.kind(),
                    resource = %r,
                    action_taken = e.action_taken,
                    "Reconcile failed: {}",
                    e.source
                );
                Err(e)
            }
        }
    }
}
