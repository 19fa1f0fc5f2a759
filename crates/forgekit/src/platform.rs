//! Provider-agnostic domain model.
//!
//! Refs name resources, infos describe desired state, [`ProviderError`] is the
//! shared error taxonomy and [`GitProvider`] is the seam each backend
//! implements.
//!
//! # Example
//!
//! ```ignore
//! use forgekit::platform::{GitProvider, OwnerRef, RepositoryInfo, RepositoryRef, Visibility};
//! use forgekit::reconcile::CancelToken;
//!
//! async fn ensure_private<P: GitProvider>(provider: &P) -> forgekit::platform::Result<()> {
//!     let r = RepositoryRef::new(OwnerRef::organization("platform"), "infra");
//!     let desired = RepositoryInfo {
//!         visibility: Some(Visibility::Private),
//!         ..Default::default()
//!     };
//!     let done = provider
//!         .repositories()
//!         .reconcile(&CancelToken::new(), &r, &desired)
//!         .await
//!         .map_err(|e| e.into_provider_error())?;
//!     println!("{}: {}", r, done.action);
//!     Ok(())
//! }
//! ```

mod errors;
mod info;
mod provider;
mod rate_limit;
mod refs;

pub use errors::{ProviderError, Result, ResultExt, short_error_message};
pub use info::{
    BranchInfo, CommitInfo, DeployKeyInfo, DesiredInfo, MergeMethod, OrganizationInfo,
    Permission, PullRequestInfo, PullRequestState, RepositoryInfo, TeamAccessInfo, TeamInfo,
    UserInfo, Visibility, normalize_key,
};
pub use provider::{
    DEFAULT_TIMEOUT_SECS, GitProvider, ProviderConfig, ProviderKind, PullRequestApi,
    TeamMembersApi,
};
pub use rate_limit::{ApiRateLimiter, default_rps, rate_limits};
pub use refs::{
    BranchRef, CommitHistoryRef, CommitRef, DeployKeyRef, OrganizationRef, OwnerRef,
    ProviderRoot, PullRequestRef, RepositoryRef, TeamAccessRef, TeamRef, UserRef,
};

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_not_found_message_names_resource() {
        let err = ProviderError::not_found("acme/infra");
        assert!(err.to_string().contains("Not found"));
        assert!(err.to_string().contains("acme/infra"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rate_limited_message_includes_reset() {
        let err = ProviderError::RateLimited {
            reset_at: Some(Utc::now()),
        };
        assert!(err.to_string().contains("Rate limit"));
        assert!(err.to_string().contains("Resets at"));

        let bare = ProviderError::RateLimited { reset_at: None };
        assert_eq!(bare.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_context_preserves_kind() {
        let err = ProviderError::transport("connection reset")
            .context("listing repositories")
            .context("reconciling acme/infra");
        assert!(err.is_transport());
        assert!(!err.is_not_found());
        assert!(
            err.to_string()
                .starts_with("reconciling acme/infra: listing repositories")
        );
    }

    #[test]
    fn test_result_ext_with_context_is_lazy() {
        let ok: Result<u8> = Ok(1);
        let out = ok.with_context(|| -> String { panic!("must not be called") });
        assert_eq!(out.unwrap(), 1);

        let err: Result<u8> = Err(ProviderError::not_found("x"));
        assert!(err.context("fetching").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unsupported_names_provider_and_operation() {
        let err = ProviderError::unsupported("stash", "team membership lookup");
        assert_eq!(
            err.to_string(),
            "stash does not support team membership lookup"
        );
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_short_error_message_first_line() {
        let err = ProviderError::api(500, "line one\nline two");
        assert_eq!(short_error_message(&err), "API error (500): line one");
    }
}
