//! Capability traits a backend implements per resource kind.
//!
//! Each capability is its own trait so a resource kind exposes exactly what
//! its backend can do. Operations a backend cannot perform on some inputs
//! (e.g. team access on a user-owned repository) return
//! [`ProviderError::Unsupported`](crate::platform::ProviderError::Unsupported).

use std::fmt::{Debug, Display};

use async_trait::async_trait;

use super::cancel::CancelToken;
use super::mapper::InfoMapper;
use super::paginate::{ListOptions, Page};
use crate::platform::{DesiredInfo, Result};

/// Bounds shared by every resource identity.
pub trait ResourceId: Clone + Debug + Display + Send + Sync + 'static {}

impl<T> ResourceId for T where T: Clone + Debug + Display + Send + Sync + 'static {}

/// Fetch a single resource.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    type Ref: ResourceId;
    type Info: DesiredInfo;
    type Object: InfoMapper<Info = Self::Info>;

    /// Human-readable resource kind, e.g. `"repository"`.
    fn kind(&self) -> &'static str;

    /// Reject desired states this backend cannot represent.
    ///
    /// A value the backend would silently coerce (e.g. `internal` visibility
    /// on a server without it) would never compare equal after a write, so it
    /// is refused up front instead.
    fn check_info(&self, _info: &Self::Info) -> Result<()> {
        Ok(())
    }

    /// Fetch the current server object. Absence is `ProviderError::NotFound`.
    async fn fetch_one(&self, cancel: &CancelToken, r: &Self::Ref) -> Result<Self::Object>;
}

/// Fetch one page of resources under a parent.
#[async_trait]
pub trait ListApi: ResourceApi {
    type Parent: ResourceId;

    async fn fetch_page(
        &self,
        cancel: &CancelToken,
        parent: &Self::Parent,
        options: ListOptions,
    ) -> Result<(Vec<Self::Object>, Page)>;
}

/// Create a resource from a desired state.
#[async_trait]
pub trait CreateApi: ResourceApi {
    /// Build the object to send for `r` from `info` (no I/O).
    fn new_object(&self, r: &Self::Ref, info: &Self::Info) -> Result<Self::Object>;

    async fn create_one(
        &self,
        cancel: &CancelToken,
        r: &Self::Ref,
        object: &Self::Object,
    ) -> Result<Self::Object>;
}

/// Push a modified object.
#[async_trait]
pub trait UpdateApi: ResourceApi {
    async fn update_one(
        &self,
        cancel: &CancelToken,
        r: &Self::Ref,
        object: &Self::Object,
    ) -> Result<Self::Object>;
}

/// Delete a resource. Absence is `ProviderError::NotFound`.
#[async_trait]
pub trait DeleteApi: ResourceApi {
    async fn delete_one(&self, cancel: &CancelToken, r: &Self::Ref) -> Result<()>;
}
