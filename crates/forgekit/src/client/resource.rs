use std::fmt;

use super::ResourceClient;
use crate::platform::Result;
use crate::reconcile::{
    CancelToken, CreateApi, DeleteApi, InfoMapper, ReconcileAction, ReconcileError, ResourceApi,
    UpdateApi,
};

/// A fetched resource: its ref plus the last object the server returned.
///
/// The object is replaced only after a successful round-trip, never patched
/// locally ahead of the server.
pub struct Resource<A: ResourceApi> {
    client: ResourceClient<A>,
    reference: A::Ref,
    object: A::Object,
}

impl<A: ResourceApi> Clone for Resource<A> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            reference: self.reference.clone(),
            object: self.object.clone(),
        }
    }
}

impl<A: ResourceApi> fmt::Debug for Resource<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("reference", &self.reference)
            .field("object", &self.object)
            .finish()
    }
}

impl<A: ResourceApi> Resource<A> {
    pub(crate) fn new(client: ResourceClient<A>, reference: A::Ref, object: A::Object) -> Self {
        Self {
            client,
            reference,
            object,
        }
    }

    #[inline]
    pub fn reference(&self) -> &A::Ref {
        &self.reference
    }

    /// The unified view of the last server state.
    pub fn info(&self) -> A::Info {
        self.object.to_info()
    }

    /// The raw provider object, for provider-specific fields.
    #[inline]
    pub fn api_object(&self) -> &A::Object {
        &self.object
    }

    pub fn into_object(self) -> A::Object {
        self.object
    }

    /// Re-fetch from the server.
    pub async fn refresh(&mut self, cancel: &CancelToken) -> Result<()> {
        self.object = self.client.get_object(cancel, &self.reference).await?;
        Ok(())
    }
}

impl<A: UpdateApi> Resource<A> {
    /// Apply `desired` to fresh server state and push it.
    pub async fn update(&mut self, cancel: &CancelToken, desired: &A::Info) -> Result<()> {
        let updated = self.client.update(cancel, &self.reference, desired).await?;
        self.object = updated.object;
        Ok(())
    }
}

impl<A: CreateApi + UpdateApi> Resource<A> {
    pub async fn reconcile(
        &mut self,
        cancel: &CancelToken,
        desired: &A::Info,
    ) -> std::result::Result<ReconcileAction, ReconcileError> {
        let done = self.client.reconcile(cancel, &self.reference, desired).await?;
        self.object = done.object.object;
        Ok(done.action)
    }
}

impl<A: DeleteApi> Resource<A> {
    /// Delete the resource. The handle is consumed either way.
    pub async fn delete(self, cancel: &CancelToken) -> Result<()> {
        self.client.delete(cancel, &self.reference).await
    }
}
