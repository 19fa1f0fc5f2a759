//! `Link` header pagination.
//!
//! GitHub pages most listings with `page`/`per_page`, but the provider-wide
//! listings (`/users`, `/organizations`) page with `since`. Both advertise the
//! next page in the `Link` header; octocrab parses the header and the cursor
//! is read out of the `rel="next"` URL.

use serde::de::DeserializeOwned;

use super::GitHubClient;
use crate::platform::{ProviderError, Result};
use crate::reconcile::{CancelToken, ListOptions, Page};
use crate::rest::query;

/// Paging state for a response whose `rel="next"` link is `next`.
///
/// A next link without a readable `param` cursor is an error: ending the
/// listing there would silently drop the remaining pages.
pub(crate) fn cursor_page(next: Option<&str>, param: &str) -> Result<Page> {
    let Some(url) = next else {
        return Ok(Page::last());
    };
    query_param(url, param).map(Page::next).ok_or_else(|| {
        ProviderError::api(200, format!("next page link carries no `{param}` cursor: {url}"))
    })
}

fn query_param(url: &str, param: &str) -> Option<u64> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == param)
        .and_then(|(_, value)| value.parse().ok())
}

/// Fetch one `page`/`per_page` page. Pages are numbered from 1.
pub(crate) async fn fetch_page<T>(
    client: &GitHubClient,
    cancel: &CancelToken,
    path: &str,
    options: ListOptions,
    extra: &[(&str, String)],
) -> Result<(Vec<T>, Page)>
where
    T: DeserializeOwned + Send + 'static,
{
    let mut params = extra.to_vec();
    params.push(("per_page", options.page_size.to_string()));
    params.push(("page", options.cursor_or(1).to_string()));
    client
        .get_page(cancel, &format!("{path}{}", query(&params)), "page")
        .await
}

/// Fetch one `since`/`per_page` page of a provider-wide listing.
pub(crate) async fn fetch_since<T>(
    client: &GitHubClient,
    cancel: &CancelToken,
    path: &str,
    options: ListOptions,
) -> Result<(Vec<T>, Page)>
where
    T: DeserializeOwned + Send + 'static,
{
    let mut params = vec![("per_page", options.page_size.to_string())];
    if let Some(since) = options.cursor {
        params.push(("since", since.to_string()));
    }
    client
        .get_page(cancel, &format!("{path}{}", query(&params)), "since")
        .await
}
