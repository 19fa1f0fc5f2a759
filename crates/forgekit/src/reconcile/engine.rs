//! The reconciler: make a server resource match a desired state.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::api::{CreateApi, UpdateApi};
use super::cancel::CancelToken;
use super::mapper::{applied, satisfies};
use super::validate::validated;
use crate::platform::{DesiredInfo, ProviderError};

/// What a successful reconcile did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    /// Server state already matched; nothing was written.
    Unchanged,
    /// The resource did not exist and was created.
    Created,
    /// The resource existed with different values and was updated.
    Updated,
}

impl ReconcileAction {
    /// Whether a write was performed.
    #[inline]
    pub fn action_taken(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Updated => "updated",
        })
    }
}

/// Result of a successful reconcile.
#[derive(Debug, Clone)]
pub struct Reconciled<O> {
    /// The server object after reconciliation.
    pub object: O,
    pub action: ReconcileAction,
}

impl<O> Reconciled<O> {
    #[inline]
    pub fn action_taken(&self) -> bool {
        self.action.action_taken()
    }
}

/// Step at which a reconcile failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileStage {
    /// The desired state was rejected before any request.
    Validate,
    /// Fetching the current state failed with something other than NotFound.
    Fetch,
    Create,
    Update,
}

impl fmt::Display for ReconcileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validating desired state",
            Self::Fetch => "fetching current state",
            Self::Create => "creating",
            Self::Update => "updating",
        })
    }
}

/// A failed reconcile.
///
/// `action_taken` is true when a create or update request was sent, even if
/// the server rejected it: the write may have had partial effects.
#[derive(Debug, Error)]
#[error("reconcile of {resource} failed while {stage}: {source}")]
pub struct ReconcileError {
    pub resource: String,
    pub stage: ReconcileStage,
    pub action_taken: bool,
    #[source]
    pub source: ProviderError,
}

impl ReconcileError {
    fn new(
        resource: &impl fmt::Display,
        stage: ReconcileStage,
        action_taken: bool,
        source: ProviderError,
    ) -> Self {
        Self {
            resource: resource.to_string(),
            stage,
            action_taken,
            source,
        }
    }

    /// Unwrap into the underlying provider error, dropping reconcile details.
    pub fn into_provider_error(self) -> ProviderError {
        self.source
    }
}

/// Make the resource at `r` match `desired`.
///
/// 1. Fetch the current object.
/// 2. NotFound: build an object from `desired` and create it.
/// 3. Any other fetch error: fail without writing.
/// 4. Every field set in `desired` matches: return it unchanged.
/// 5. Otherwise apply `desired` to the fetched object and update.
///
/// No retries happen here; retry policy belongs to the caller.
pub async fn reconcile<A>(
    api: &A,
    cancel: &CancelToken,
    r: &A::Ref,
    desired: &A::Info,
) -> Result<Reconciled<A::Object>, ReconcileError>
where
    A: CreateApi + UpdateApi,
{
    desired
        .validate_info()
        .and_then(|()| api.check_info(desired))
        .map_err(|e| ReconcileError::new(r, ReconcileStage::Validate, false, e))?;

    let fetched = match api.fetch_one(cancel, r).await {
        Ok(object) => validated(object),
        Err(e) => Err(e),
    };

    let current = match fetched {
        Ok(current) => current,
        Err(e) if e.is_not_found() => {
            tracing::debug!(kind = api.kind(), resource = %r, "Resource absent, creating");
            let object = api
                .new_object(r, desired)
                .map_err(|e| ReconcileError::new(r, ReconcileStage::Create, false, e))?;
            let created = api
                .create_one(cancel, r, &object)
                .await
                .and_then(validated)
                .map_err(|e| ReconcileError::new(r, ReconcileStage::Create, true, e))?;
            tracing::info!(kind = api.kind(), resource = %r, "Created");
            return Ok(Reconciled {
                object: created,
                action: ReconcileAction::Created,
            });
        }
        Err(e) => {
            return Err(ReconcileError::new(r, ReconcileStage::Fetch, false, e));
        }
    };

    if satisfies(&current, desired) {
        tracing::debug!(kind = api.kind(), resource = %r, "Already up to date");
        return Ok(Reconciled {
            object: current,
            action: ReconcileAction::Unchanged,
        });
    }

    let merged = applied(&current, desired);
    let updated = api
        .update_one(cancel, r, &merged)
        .await
        .and_then(validated)
        .map_err(|e| ReconcileError::new(r, ReconcileStage::Update, true, e))?;
    tracing::info!(kind = api.kind(), resource = %r, "Updated");

    Ok(Reconciled {
        object: updated,
        action: ReconcileAction::Updated,
    })
}
