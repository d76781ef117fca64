//! Accumulation of truncated listing responses.
//!
//! Listing calls answer in pages: items, an optional continuation marker,
//! and a truncation flag. [`collect_pages`] drives the fetch callback until
//! the service reports the final page, retrying each page under its own
//! attempt budget. A successful page resets the budget, so a transient
//! failure late in a long listing cannot be starved by earlier retries.

use futures::future::BoxFuture;
use tracing::debug;

use crate::classify::ErrorClassifier;
use crate::error::ShoalError;
use crate::retry::RetryPolicy;

/// One response page from a paginated listing call.
#[derive(Debug, Clone)]
pub struct Page<T, M> {
    /// Items carried by this page.
    pub items: Vec<T>,
    /// Marker addressing the page after this one.
    pub next_marker: Option<M>,
    /// Whether more pages follow.
    pub is_truncated: bool,
}

/// Fetch every page and return the concatenated items.
///
/// `fetch` receives the continuation marker of the page to load (`None` for
/// the first page) and must issue exactly one network attempt per call.
/// Pages already folded into the result are never re-fetched; only the page
/// in flight consumes attempt budget.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the
/// attempt budget for the current page is exhausted.
pub async fn collect_pages<'a, T, M>(
    retry: &dyn RetryPolicy,
    classifier: &dyn ErrorClassifier,
    mut fetch: impl FnMut(Option<M>) -> BoxFuture<'a, Result<Page<T, M>, ShoalError>>,
) -> Result<Vec<T>, ShoalError>
where
    M: Clone,
{
    let mut items = Vec::new();
    let mut marker: Option<M> = None;

    loop {
        // Fresh budget for every page: the previous page already succeeded.
        let mut budget = retry.begin();
        let page = loop {
            match fetch(marker.clone()).await {
                Ok(page) => break page,
                Err(err) if classifier.is_retryable(&err) && budget.try_consume() => {
                    debug!(error = %err, "retrying page fetch");
                }
                Err(err) => return Err(err),
            }
        };

        items.extend(page.items);
        if !page.is_truncated {
            return Ok(items);
        }
        marker = page.next_marker;
    }
}
