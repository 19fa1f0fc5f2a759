//! Generic reconciliation and list framework.
//!
//! Every resource client is built from the same pieces:
//!
//! - [`validate`] - required-field checks on decoded server objects
//! - [`paginate`] - the drain-all page loop
//! - [`mapper`] - object <-> info conversion
//! - [`api`] - the capability traits backends implement
//! - [`engine`] - the create/update/no-op decision
//! - [`cancel`] - cooperative cancellation threaded through every call

pub mod api;
pub mod cancel;
pub mod engine;
pub mod mapper;
pub mod paginate;
pub mod validate;

pub use api::{CreateApi, DeleteApi, ListApi, ResourceApi, ResourceId, UpdateApi};
pub use cancel::CancelToken;
pub use engine::{ReconcileAction, ReconcileError, ReconcileStage, Reconciled, reconcile};
pub use mapper::{InfoMapper, applied, satisfies};
pub use paginate::{DEFAULT_PAGE_SIZE, ListOptions, Page, drain_all, drain_validated};
pub use validate::{Presence, Validate, Validation, Validator, validate_all, validated};

#[cfg(test)]
mod tests {
    //! Reconciler behaviour against an in-memory resource API.

    use std::collections::HashMap;
    use std::fmt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::platform::{ProviderError, RepositoryInfo, Result, Visibility};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Slug(&'static str);

    impl fmt::Display for Slug {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct FakeRepo {
        id: Option<u64>,
        slug: String,
        description: String,
        public: bool,
        created_at: &'static str,
    }

    impl Validate for FakeRepo {
        fn validate(&self) -> Validation {
            Validator::new("repository")
                .require("id", &self.id)
                .require("slug", &self.slug)
                .finish()
        }
    }

    impl InfoMapper for FakeRepo {
        type Info = RepositoryInfo;

        fn display_name(&self) -> String {
            self.slug.clone()
        }

        fn to_info(&self) -> RepositoryInfo {
            RepositoryInfo {
                description: Some(self.description.clone()),
                default_branch: None,
                visibility: Some(if self.public {
                    Visibility::Public
                } else {
                    Visibility::Private
                }),
            }
        }

        fn apply_info(&mut self, info: &RepositoryInfo) {
            if let Some(description) = &info.description {
                self.description = description.clone();
            }
            if let Some(visibility) = info.visibility {
                self.public = visibility == Visibility::Public;
            }
        }
    }

    enum FetchBehaviour {
        Store,
        Fail(fn() -> ProviderError),
    }

    struct FakeApi {
        store: Mutex<HashMap<String, FakeRepo>>,
        fetch: FetchBehaviour,
        fail_writes: bool,
        creates: AtomicUsize,
        updates: AtomicUsize,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                store: Mutex::new(HashMap::new()),
                fetch: FetchBehaviour::Store,
                fail_writes: false,
                creates: AtomicUsize::new(0),
                updates: AtomicUsize::new(0),
            }
        }

        fn with_repo(self, repo: FakeRepo) -> Self {
            self.store.lock().unwrap().insert(repo.slug.clone(), repo);
            self
        }

        fn writes(&self) -> (usize, usize) {
            (
                self.creates.load(Ordering::SeqCst),
                self.updates.load(Ordering::SeqCst),
            )
        }
    }

    fn repo(description: &str, public: bool) -> FakeRepo {
        FakeRepo {
            id: Some(7),
            slug: "infra".to_string(),
            description: description.to_string(),
            public,
            created_at: "2024-01-01T00:00:00Z",
        }
    }

    #[async_trait]
    impl ResourceApi for FakeApi {
        type Ref = Slug;
        type Info = RepositoryInfo;
        type Object = FakeRepo;

        fn kind(&self) -> &'static str {
            "repository"
        }

        async fn fetch_one(&self, _cancel: &CancelToken, r: &Slug) -> Result<FakeRepo> {
            match &self.fetch {
                FetchBehaviour::Fail(make) => Err(make()),
                FetchBehaviour::Store => self
                    .store
                    .lock()
                    .unwrap()
                    .get(r.0)
                    .cloned()
                    .ok_or_else(|| ProviderError::not_found(r.0)),
            }
        }
    }

    #[async_trait]
    impl CreateApi for FakeApi {
        fn new_object(&self, r: &Slug, info: &RepositoryInfo) -> Result<FakeRepo> {
            let mut object = FakeRepo {
                id: None,
                slug: r.0.to_string(),
                description: String::new(),
                public: false,
                created_at: "",
            };
            object.apply_info(info);
            Ok(object)
        }

        async fn create_one(
            &self,
            _cancel: &CancelToken,
            r: &Slug,
            object: &FakeRepo,
        ) -> Result<FakeRepo> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(ProviderError::api(500, "boom"));
            }
            let mut stored = object.clone();
            stored.id = Some(99);
            stored.created_at = "2025-06-01T00:00:00Z";
            self.store.lock().unwrap().insert(r.0.to_string(), stored.clone());
            Ok(stored)
        }
    }

    #[async_trait]
    impl UpdateApi for FakeApi {
        async fn update_one(
            &self,
            _cancel: &CancelToken,
            r: &Slug,
            object: &FakeRepo,
        ) -> Result<FakeRepo> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(ProviderError::api(409, "conflict"));
            }
            self.store.lock().unwrap().insert(r.0.to_string(), object.clone());
            Ok(object.clone())
        }
    }

    fn desired_description(text: &str) -> RepositoryInfo {
        RepositoryInfo {
            description: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn absent_resource_is_created_once() {
        let api = FakeApi::new();
        let out = reconcile(
            &api,
            &CancelToken::new(),
            &Slug("infra"),
            &desired_description("x"),
        )
        .await
        .unwrap();

        assert_eq!(out.action, ReconcileAction::Created);
        assert_eq!(out.object.id, Some(99));
        assert_eq!(api.writes(), (1, 0));
    }

    #[tokio::test]
    async fn transport_failure_performs_no_write() {
        let mut api = FakeApi::new().with_repo(repo("y", false));
        api.fetch = FetchBehaviour::Fail(|| ProviderError::transport("connection reset"));

        let err = reconcile(
            &api,
            &CancelToken::new(),
            &Slug("infra"),
            &desired_description("x"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage, ReconcileStage::Fetch);
        assert!(!err.action_taken);
        assert!(err.source.is_transport());
        assert_eq!(api.writes(), (0, 0));
    }

    #[tokio::test]
    async fn differing_description_updates_only_that_field() {
        let api = FakeApi::new().with_repo(repo("y", true));
        let out = reconcile(
            &api,
            &CancelToken::new(),
            &Slug("infra"),
            &desired_description("x"),
        )
        .await
        .unwrap();

        assert_eq!(out.action, ReconcileAction::Updated);
        assert!(out.action_taken());
        assert_eq!(out.object.description, "x");
        assert!(out.object.public);
        assert_eq!(out.object.created_at, "2024-01-01T00:00:00Z");
        assert_eq!(api.writes(), (0, 1));
    }

    #[tokio::test]
    async fn matching_visibility_is_a_no_op() {
        let api = FakeApi::new().with_repo(repo("y", false));
        let desired = RepositoryInfo {
            visibility: Some(Visibility::Private),
            ..Default::default()
        };
        let out = reconcile(&api, &CancelToken::new(), &Slug("infra"), &desired)
            .await
            .unwrap();

        assert_eq!(out.action, ReconcileAction::Unchanged);
        assert_eq!(api.writes(), (0, 0));
    }

    #[tokio::test]
    async fn second_reconcile_is_idempotent() {
        let api = FakeApi::new().with_repo(repo("y", false));
        let desired = desired_description("x");
        let cancel = CancelToken::new();

        let first = reconcile(&api, &cancel, &Slug("infra"), &desired)
            .await
            .unwrap();
        let second = reconcile(&api, &cancel, &Slug("infra"), &desired)
            .await
            .unwrap();

        assert!(first.action_taken());
        assert!(!second.action_taken());
    }

    #[tokio::test]
    async fn failed_update_still_reports_attempt() {
        let mut api = FakeApi::new().with_repo(repo("y", false));
        api.fail_writes = true;

        let err = reconcile(
            &api,
            &CancelToken::new(),
            &Slug("infra"),
            &desired_description("x"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage, ReconcileStage::Update);
        assert!(err.action_taken);
    }

    #[tokio::test]
    async fn malformed_fetch_is_not_treated_as_absent() {
        let mut broken = repo("y", false);
        broken.id = None;
        let api = FakeApi::new().with_repo(broken);

        let err = reconcile(
            &api,
            &CancelToken::new(),
            &Slug("infra"),
            &desired_description("x"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage, ReconcileStage::Fetch);
        assert!(err.source.is_validation_failed());
        assert_eq!(api.writes(), (0, 0));
    }

    #[tokio::test]
    async fn invalid_desired_state_is_rejected_before_fetch() {
        let api = FakeApi::new();
        let desired = RepositoryInfo {
            default_branch: Some("  ".to_string()),
            ..Default::default()
        };
        let err = reconcile(&api, &CancelToken::new(), &Slug("infra"), &desired)
            .await
            .unwrap_err();
        assert_eq!(err.stage, ReconcileStage::Validate);
        assert_eq!(api.writes(), (0, 0));
    }

    #[test]
    fn apply_then_to_info_reproduces_set_fields() {
        let start = repo("old", true);
        let desired = RepositoryInfo {
            description: Some("new".to_string()),
            visibility: Some(Visibility::Private),
            default_branch: None,
        };
        let merged = applied(&start, &desired);
        let info = merged.to_info();
        assert_eq!(info.description, desired.description);
        assert_eq!(info.visibility, desired.visibility);
        assert_eq!(merged.created_at, start.created_at);
        assert_eq!(merged.id, start.id);
    }
}
