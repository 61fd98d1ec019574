//! Fetching a whole collection (decomposed into focused submodules)
//!
//! Both strategies start the same way: request the first page on its own to
//! learn the collection's total, then plan the remaining pages.
//!
//! - [`fetch_all_parallel`] requests the remaining pages concurrently and
//!   returns the materialized collection.
//! - [`fetch_all_sequential`] requests them one at a time and streams each page
//!   into a [`DocumentSink`] as it arrives.
//!
//! For the same collection both produce the same documents in the same order.
//! [`fetch_into`] picks a strategy from [`FetchConfig::mode`] and always ends
//! with a finished (or aborted) sink.

mod parallel;
mod sequential;


pub use parallel::fetch_all_parallel;
pub use sequential::fetch_all_sequential;

use crate::config::{Config, FetchConfig, FetchMode};
use crate::error::{Error, Result};
use crate::planner::{check_concurrency, first_page};
use crate::query::PageQuery;
use crate::sink::{DocumentSink, open_sink};
use crate::transport::HttpPageQuery;
use crate::types::{Document, FetchSummary, PageDescriptor, PageResult};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Run one page query, giving up as soon as `cancel` fires
pub(crate) async fn query_page<Q: PageQuery + ?Sized>(
    query: &Q,
    page: PageDescriptor,
    cancel: &CancellationToken,
) -> Result<PageResult> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!(offset = page.offset, "page query cancelled");
            Err(Error::Cancelled)
        }
        result = query.query(page) => result,
    }
}

/// Validate the fetch settings and request the first page
///
/// No request is made when the settings are invalid.
pub(crate) async fn query_first_page<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    cancel: &CancellationToken,
) -> Result<PageResult> {
    let first = first_page(fetch.page_size)?;
    check_concurrency(fetch.max_concurrent_pages)?;

    let result = query_page(query, first, cancel).await?;
    check_page(result.total, first, &result);
    tracing::info!(
        total = result.total,
        first_page = result.documents.len(),
        "total records"
    );
    Ok(result)
}

/// Whether the first page already holds the whole collection
pub(crate) fn is_complete(first: &PageResult) -> bool {
    first.total == 0 || first.documents.len() as u64 >= first.total
}

/// Log pages that disagree with the first page's view of the collection
///
/// Later totals are not authoritative; a mismatch means the collection
/// changed while it was being paged through.
pub(crate) fn check_page(total: u64, page: PageDescriptor, result: &PageResult) {
    if result.total != total {
        tracing::warn!(
            offset = page.offset,
            expected_total = total,
            reported_total = result.total,
            "collection size changed during fetch"
        );
    }
    if is_short(total, page, result) {
        tracing::warn!(
            offset = page.offset,
            limit = page.limit,
            documents = result.documents.len(),
            "page returned fewer documents than requested, output will have a gap"
        );
    }
    if result.documents.len() as u64 > page.limit {
        tracing::warn!(
            offset = page.offset,
            limit = page.limit,
            documents = result.documents.len(),
            "page returned more documents than requested"
        );
    }
}

/// Whether a page that is not the last one came back with fewer documents than requested
///
/// Happens when the service caps the page size below the requested limit.
pub(crate) fn is_short(total: u64, page: PageDescriptor, result: &PageResult) -> bool {
    page.end() < total && (result.documents.len() as u64) < page.limit
}

/// Fetch a collection into `sink` using the configured mode
///
/// The sink is finished on success and aborted on failure. In parallel mode
/// nothing reaches the sink unless every page succeeded.
pub async fn fetch_into<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    sink: &mut dyn DocumentSink,
    cancel: &CancellationToken,
) -> Result<FetchSummary> {
    let started = Instant::now();
    tracing::info!(mode = %fetch.mode, page_size = fetch.page_size, "start fetching");

    let (total, records, pages) = match fetch.mode {
        FetchMode::Parallel => {
            let collected = match parallel::collect(query, fetch, cancel).await {
                Ok(collected) => collected,
                Err(e) => {
                    abort_sink(sink).await;
                    return Err(e);
                }
            };
            let records = collected.documents.len();
            if let Err(e) = write_collection(sink, &collected.documents).await {
                abort_sink(sink).await;
                return Err(e);
            }
            (collected.total, records, collected.pages)
        }
        FetchMode::Sequential => {
            let streamed = sequential::stream(query, fetch, sink, cancel).await?;
            (streamed.total, streamed.records, streamed.pages)
        }
    };

    let summary = FetchSummary {
        mode: fetch.mode,
        total,
        records,
        pages,
        elapsed: started.elapsed(),
    };
    if summary.records as u64 != summary.total {
        tracing::warn!(
            records = summary.records,
            total = summary.total,
            "record count differs from the collection total"
        );
    }
    tracing::info!(
        mode = %summary.mode,
        records = summary.records,
        pages = summary.pages,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "fetch complete"
    );
    Ok(summary)
}

/// Fetch a collection with `query` into the output configured in `config`
pub async fn fetch_collection<Q: PageQuery + ?Sized>(
    query: &Q,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<FetchSummary> {
    let mut sink = open_sink(&config.output);
    fetch_into(query, &config.fetch, sink.as_mut(), cancel).await
}

/// Validate `config`, then fetch its collection from the remote service over HTTP
pub async fn fetch_remote(config: &Config, cancel: &CancellationToken) -> Result<FetchSummary> {
    config.validate()?;
    let query = HttpPageQuery::new(&config.service)?;
    tracing::debug!(url = %query.search_url(), collection = %config.service.collection, "querying service");
    fetch_collection(&query, config, cancel).await
}

/// Write a materialized collection in one step
async fn write_collection(sink: &mut dyn DocumentSink, documents: &[Document]) -> Result<()> {
    sink.write_page(documents).await?;
    sink.finish().await
}

/// Abort a sink after a failure, keeping the original error as the one reported
pub(crate) async fn abort_sink(sink: &mut dyn DocumentSink) {
    if let Err(e) = sink.abort().await {
        tracing::warn!(error = %e, "failed to clean up output after error");
    }
}
