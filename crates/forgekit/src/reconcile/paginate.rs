//! Drain-all pagination.
//!
//! Providers page differently (page numbers, start offsets, link headers), but
//! every backend reduces a single page request to `(items, Page)`. The loop
//! here is shared by every list operation.

use std::future::Future;

use super::cancel::CancelToken;
use super::validate::{Validate, validate_all};
use crate::platform::{ProviderError, Result};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Options for one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Items per page.
    pub page_size: u32,
    /// Provider cursor (page number or start offset). `None` is the first page.
    pub cursor: Option<u64>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl ListOptions {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            cursor: None,
        }
    }

    /// The cursor, or `first` when requesting the first page.
    #[inline]
    pub fn cursor_or(&self, first: u64) -> u64 {
        self.cursor.unwrap_or(first)
    }
}

/// Where the next page starts, if there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    next: Option<u64>,
}

impl Page {
    /// No more pages.
    #[inline]
    pub fn last() -> Self {
        Self { next: None }
    }

    /// More pages, starting at `cursor`.
    #[inline]
    pub fn next(cursor: u64) -> Self {
        Self { next: Some(cursor) }
    }

    #[inline]
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    #[inline]
    pub fn next_cursor(&self) -> Option<u64> {
        self.next
    }
}

/// Fetch every page, in order, and return all items.
///
/// `fetch_page` performs exactly one request. The first error aborts the
/// drain and no partial results are returned. Items are neither reordered nor
/// deduplicated. The cancel token is checked before every page.
pub async fn drain_all<T, F, Fut>(
    options: ListOptions,
    cancel: &CancelToken,
    mut fetch_page: F,
) -> Result<Vec<T>>
where
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Page)>>,
{
    let mut all_items = Vec::new();
    let mut options = options;
    let mut pages = 0u32;

    loop {
        cancel.check()?;

        let (items, page) = fetch_page(options).await?;
        pages += 1;
        tracing::trace!(
            page = pages,
            count = items.len(),
            total_so_far = all_items.len() + items.len(),
            "Fetched page"
        );
        all_items.extend(items);

        match page.next_cursor() {
            Some(next) if Some(next) == options.cursor => {
                return Err(ProviderError::api(
                    0,
                    format!("pagination did not advance past cursor {next}"),
                ));
            }
            Some(next) => options.cursor = Some(next),
            None => break,
        }
    }

    Ok(all_items)
}

/// [`drain_all`], then validate every item.
///
/// A single malformed item fails the whole list.
pub async fn drain_validated<T, F, Fut>(
    options: ListOptions,
    cancel: &CancelToken,
    fetch_page: F,
) -> Result<Vec<T>>
where
    T: Validate,
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Page)>>,
{
    let items = drain_all(options, cancel, fetch_page).await?;
    validate_all(&items)?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    type Pages = Arc<Mutex<VecDeque<Result<(Vec<u32>, Page)>>>>;

    fn scripted(pages: Vec<Result<(Vec<u32>, Page)>>) -> (Pages, Arc<Mutex<Vec<ListOptions>>>) {
        (
            Arc::new(Mutex::new(pages.into_iter().collect())),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    async fn run(
        pages: Pages,
        seen: Arc<Mutex<Vec<ListOptions>>>,
        cancel: &CancelToken,
    ) -> Result<Vec<u32>> {
        drain_all(ListOptions::with_page_size(2), cancel, move |opts| {
            let pages = Arc::clone(&pages);
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(opts);
                pages
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(ProviderError::transport("no more scripted pages")))
            }
        })
        .await
    }

    #[tokio::test]
    async fn drains_pages_in_order() {
        let (pages, seen) = scripted(vec![
            Ok((vec![1, 2], Page::next(2))),
            Ok((vec![3], Page::last())),
        ]);
        let items = run(pages, Arc::clone(&seen), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].cursor, None);
        assert_eq!(seen[1].cursor, Some(2));
    }

    #[tokio::test]
    async fn second_page_failure_returns_no_items() {
        let (pages, seen) = scripted(vec![
            Ok((vec![1, 2], Page::next(2))),
            Err(ProviderError::transport("connection reset")),
        ]);
        let err = run(pages, seen, &CancelToken::new()).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn duplicates_across_pages_pass_through() {
        let (pages, seen) = scripted(vec![
            Ok((vec![1, 2], Page::next(2))),
            Ok((vec![2, 3], Page::last())),
        ]);
        let items = run(pages, seen, &CancelToken::new()).await.unwrap();
        assert_eq!(items, vec![1, 2, 2, 3]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_between_pages() {
        let cancel = CancelToken::new();
        let seen: Arc<Mutex<Vec<ListOptions>>> = Arc::new(Mutex::new(Vec::new()));
        let canceller = cancel.clone();
        let seen_capture = Arc::clone(&seen);

        let result = drain_all(ListOptions::default(), &cancel, move |opts| {
            let canceller = canceller.clone();
            let seen = Arc::clone(&seen_capture);
            async move {
                seen.lock().unwrap().push(opts);
                // Cancel while the first page is in flight.
                canceller.cancel();
                Ok((vec![1u32], Page::next(2)))
            }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Cancelled)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_advancing_cursor_is_an_error() {
        let (pages, seen) = scripted(vec![
            Ok((vec![1], Page::next(5))),
            Ok((vec![2], Page::next(5))),
        ]);
        let err = run(pages, seen, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[derive(Debug)]
    struct Named(Option<&'static str>);

    impl Validate for Named {
        fn validate(&self) -> crate::reconcile::Validation {
            crate::reconcile::Validator::new("named")
                .require("name", &self.0)
                .finish()
        }
    }

    #[tokio::test]
    async fn malformed_item_fails_the_whole_list() {
        let mut served = false;
        let result = drain_validated(ListOptions::default(), &CancelToken::new(), |_| {
            let first = !served;
            served = true;
            async move {
                if first {
                    Ok((vec![Named(Some("a")), Named(None)], Page::last()))
                } else {
                    Ok((Vec::new(), Page::last()))
                }
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_validation_failed());
    }
}
