//! forgekit - one reconciliation layer over several git hosting APIs.
//!
//! Resources (repositories, deploy keys, team access, branches, commits, pull
//! requests, organizations, users and teams) are named by refs, described by
//! partial "info" records and driven toward a desired state by a generic
//! reconciler. Each backend only supplies wire types and request plumbing.
//!
//! # Features
//!
//! - `github` - GitHub REST v3 backend (octocrab)
//! - `gitlab` - GitLab REST v4 backend (`gitlab` crate)
//! - `stash` - Bitbucket Server (Stash) REST 1.0 backend over the reqwest transport
//!
//! All three are on by default.
//!
//! # Example
//!
//! ```ignore
//! use forgekit::platform::{DeployKeyInfo, GitProvider, OwnerRef, ProviderConfig, ProviderKind, RepositoryRef};
//! use forgekit::reconcile::CancelToken;
//! use forgekit::stash::StashProvider;
//!
//! let config = ProviderConfig::new(ProviderKind::Stash, "https://stash.example.com")
//!     .with_token(token);
//! let stash = StashProvider::new(&config)?;
//! let repo = RepositoryRef::new(OwnerRef::organization("PLAT"), "infra");
//!
//! let done = stash
//!     .deploy_keys()
//!     .reconcile(&CancelToken::new(), &repo.deploy_key("ci"), &DeployKeyInfo {
//!         key: Some(public_key),
//!         read_only: Some(true),
//!     })
//!     .await?;
//! println!("{}", done.action);
//! ```

pub mod client;
pub mod http;
pub mod platform;
pub mod reconcile;
pub mod rest;
pub mod retry;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "gitlab")]
pub mod gitlab;

#[cfg(feature = "stash")]
pub mod stash;

pub use client::{OrgRepository, Repository, RepositoryHandle, Resource, ResourceClient};
pub use platform::{
    ApiRateLimiter, GitProvider, ProviderConfig, ProviderError, ProviderKind, Result, rate_limits,
};
pub use reconcile::{CancelToken, ReconcileAction, ReconcileError, Reconciled};
