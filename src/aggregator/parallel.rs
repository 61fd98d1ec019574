//! Parallel fetch: every remaining page in flight at once (or up to a cap),
//! results restored to offset order before concatenation.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::planner::{concurrency_limit, plan};
use crate::query::PageQuery;
use crate::types::Document;

use super::{check_page, is_complete, query_first_page, query_page};

/// A fully materialized collection
pub(super) struct Collected {
    pub(super) documents: Vec<Document>,
    pub(super) total: u64,
    pub(super) pages: usize,
}

/// Fetch a whole collection by requesting all remaining pages concurrently
///
/// Documents come back in ascending offset order regardless of which
/// response arrived first. With `fetch.max_concurrent_pages` unset every
/// remaining page is requested at once.
///
/// # Errors
///
/// The first failing page fails the whole fetch; outstanding requests are
/// dropped and no partial collection is returned.
pub async fn fetch_all_parallel<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Document>> {
    Ok(collect(query, fetch, cancel).await?.documents)
}

pub(super) async fn collect<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    cancel: &CancellationToken,
) -> Result<Collected> {
    let first = query_first_page(query, fetch, cancel).await?;
    if is_complete(&first) {
        return Ok(Collected {
            total: first.total,
            documents: first.documents,
            pages: 1,
        });
    }
    let total = first.total;
    let mut documents = first.documents;

    let remaining = plan(total, fetch.page_size)?;
    let pending = remaining.len();
    let concurrency = concurrency_limit(fetch.max_concurrent_pages, pending);
    tracing::debug!(pages = pending, concurrency, "fetching remaining pages");

    // Slot i holds the documents of remaining[i]; responses fill them in completion order.
    let mut slots: Vec<Option<Vec<Document>>> = vec![None; pending];

    let mut responses = stream::iter(remaining.into_iter().enumerate())
        .map(|(index, page)| async move {
            let result = query_page(query, page, cancel).await?;
            Ok::<_, Error>((index, page, result))
        })
        .buffer_unordered(concurrency);

    while let Some(response) = responses.next().await {
        let (index, page, result) = match response {
            Ok(received) => received,
            Err(e) => {
                tracing::debug!(error = %e, "page failed, dropping outstanding requests");
                return Err(e);
            }
        };
        check_page(total, page, &result);
        slots[index] = Some(result.documents);
    }

    for page_documents in slots.into_iter().flatten() {
        documents.extend(page_documents);
    }

    Ok(Collected {
        documents,
        total,
        pages: pending + 1,
    })
}
