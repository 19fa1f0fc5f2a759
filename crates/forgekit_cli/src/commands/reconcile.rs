//! `forgekit reconcile`: drive every manifest entry to its desired state.

use forgekit::platform::{DesiredInfo, GitProvider, short_error_message};
use forgekit::reconcile::{CreateApi, ReconcileError, ResourceApi, UpdateApi, satisfies};
use forgekit::retry::{RetryConfig, is_retryable, with_retry};
use forgekit::{CancelToken, ResourceClient};
use serde::Serialize;
use tabled::Tabled;

use crate::manifest::{Manifest, RepositoryEntry};

/// What happened to one resource.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct OutcomeRow {
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

impl OutcomeRow {
    fn new(resource: impl ToString, outcome: &str, detail: impl Into<String>) -> Self {
        Self {
            resource: resource.to_string(),
            outcome: outcome.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn is_failure(&self) -> bool {
        self.outcome.starts_with("failed")
    }
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub(crate) struct ReconcileOptions {
    pub dry_run: bool,
    pub retry: RetryConfig,
}

/// A write that was sent may have landed, so only rate limits are retried
/// after one; other retryable errors are retried only before any write.
fn should_retry(err: &ReconcileError) -> bool {
    if err.action_taken {
        err.source.is_rate_limited()
    } else {
        is_retryable(&err.source)
    }
}

async fn reconcile_one<A>(
    client: &ResourceClient<A>,
    cancel: &CancelToken,
    r: &A::Ref,
    desired: &A::Info,
    options: &ReconcileOptions,
) -> OutcomeRow
where
    A: CreateApi + UpdateApi,
{
    if options.dry_run {
        return preview_one(client, cancel, r, desired).await;
    }

    let label = format!("reconcile of {r}");
    let result = with_retry(
        options.retry.clone(),
        &label,
        || client.reconcile(cancel, r, desired),
        should_retry,
    )
    .await;

    match result {
        Ok(done) => OutcomeRow::new(r, &done.action.to_string(), ""),
        Err(e) if e.action_taken => {
            OutcomeRow::new(r, "failed (attempted)", short_error_message(&e.source))
        }
        Err(e) => OutcomeRow::new(r, "failed", short_error_message(&e.source)),
    }
}

/// Report what a reconcile would do, without writing.
async fn preview_one<A>(
    client: &ResourceClient<A>,
    cancel: &CancelToken,
    r: &A::Ref,
    desired: &A::Info,
) -> OutcomeRow
where
    A: CreateApi + UpdateApi,
{
    if let Err(e) = desired
        .validate_info()
        .and_then(|()| client.api().check_info(desired))
    {
        return OutcomeRow::new(r, "failed", short_error_message(&e));
    }
    match client.get_object(cancel, r).await {
        Ok(current) if satisfies(&current, desired) => OutcomeRow::new(r, "unchanged", ""),
        Ok(_) => OutcomeRow::new(r, "would update", ""),
        Err(e) if e.is_not_found() => OutcomeRow::new(r, "would create", ""),
        Err(e) => OutcomeRow::new(r, "failed", short_error_message(&e)),
    }
}

async fn reconcile_entry<P: GitProvider>(
    provider: &P,
    cancel: &CancelToken,
    entry: &RepositoryEntry,
    options: &ReconcileOptions,
    rows: &mut Vec<OutcomeRow>,
) {
    let r = match entry.repository_ref() {
        Ok(r) => r,
        Err(e) => {
            rows.push(OutcomeRow::new(&entry.name, "failed", e.to_string()));
            return;
        }
    };

    let repo_row =
        reconcile_one(&provider.repositories(), cancel, &r, &entry.desired(), options).await;
    let repo_failed = repo_row.is_failure();
    rows.push(repo_row);

    let deploy_keys = entry
        .deploy_keys
        .iter()
        .map(|key| r.deploy_key(key.name.as_str()).to_string());
    let teams = entry
        .team_access
        .iter()
        .map(|grant| r.team_access(grant.team.as_str()).to_string());
    if repo_failed {
        rows.extend(
            deploy_keys
                .chain(teams)
                .map(|name| OutcomeRow::new(name, "skipped", "repository not reconciled")),
        );
        return;
    }

    let keys = provider.deploy_keys();
    for key in &entry.deploy_keys {
        let key_ref = r.deploy_key(key.name.as_str());
        rows.push(reconcile_one(&keys, cancel, &key_ref, &key.desired(), options).await);
    }

    let access = provider.team_access();
    for grant in &entry.team_access {
        let grant_ref = r.team_access(grant.team.as_str());
        rows.push(reconcile_one(&access, cancel, &grant_ref, &grant.desired(), options).await);
    }
}

/// Reconcile every manifest entry in order.
///
/// Entries are independent: a failure is recorded and the run moves on. A
/// fired cancel token stops the run after the current entry.
pub(crate) async fn reconcile_manifest<P: GitProvider>(
    provider: &P,
    cancel: &CancelToken,
    manifest: &Manifest,
    options: &ReconcileOptions,
) -> Vec<OutcomeRow> {
    let mut rows = Vec::new();
    for entry in &manifest.repositories {
        if cancel.is_cancelled() {
            tracing::warn!("Cancelled, skipping remaining manifest entries");
            break;
        }
        reconcile_entry(provider, cancel, entry, options, &mut rows).await;
    }

    let failed = rows.iter().filter(|row| row.is_failure()).count();
    tracing::info!(resources = rows.len(), failed, "Reconcile finished");
    rows
}

#[cfg(test)]
mod tests {
    use forgekit::platform::ProviderError;
    use forgekit::reconcile::ReconcileStage;

    use super::*;

    fn err(action_taken: bool, source: ProviderError) -> ReconcileError {
        ReconcileError {
            resource: "repository acme/infra".to_string(),
            stage: if action_taken {
                ReconcileStage::Update
            } else {
                ReconcileStage::Fetch
            },
            action_taken,
            source,
        }
    }

    #[test]
    fn retries_before_any_write() {
        assert!(should_retry(&err(false, ProviderError::transport("reset"))));
        assert!(should_retry(&err(
            false,
            ProviderError::RateLimited { reset_at: None }
        )));
        assert!(!should_retry(&err(false, ProviderError::not_found("x"))));
    }

    #[test]
    fn only_rate_limits_retry_after_a_write() {
        assert!(should_retry(&err(
            true,
            ProviderError::RateLimited { reset_at: None }
        )));
        assert!(!should_retry(&err(true, ProviderError::transport("reset"))));
    }

    #[test]
    fn failure_outcomes() {
        assert!(OutcomeRow::new("r", "failed", "x").is_failure());
        assert!(OutcomeRow::new("r", "failed (attempted)", "x").is_failure());
        assert!(!OutcomeRow::new("r", "skipped", "").is_failure());
        assert!(!OutcomeRow::new("r", "updated", "").is_failure());
    }
}
