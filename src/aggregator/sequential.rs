//! Sequential fetch: one request in flight, each page streamed into the sink
//! before the next one is requested.

use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::Result;
use crate::planner::plan;
use crate::query::PageQuery;
use crate::sink::DocumentSink;

use super::{abort_sink, check_page, is_complete, query_first_page, query_page};

/// Outcome of a streamed fetch
pub(super) struct Streamed {
    pub(super) records: usize,
    pub(super) total: u64,
    pub(super) pages: usize,
}

/// Fetch a whole collection page by page, streaming documents into `sink`
///
/// Only one page is held in memory at a time. Returns the number of documents
/// written. The sink is finished after the last page.
///
/// # Errors
///
/// A failing page aborts the fetch and the sink. Whatever was already written
/// stays in the sink, so a plain file is left as a truncated, invalid JSON
/// array; stage the output (see [`crate::sink::FileSink::atomic`]) when that
/// is not acceptable.
pub async fn fetch_all_sequential<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    sink: &mut dyn DocumentSink,
    cancel: &CancellationToken,
) -> Result<usize> {
    Ok(stream(query, fetch, sink, cancel).await?.records)
}

pub(super) async fn stream<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    sink: &mut dyn DocumentSink,
    cancel: &CancellationToken,
) -> Result<Streamed> {
    match stream_pages(query, fetch, sink, cancel).await {
        Ok(streamed) => Ok(streamed),
        Err(e) => {
            tracing::warn!(
                error = %e,
                records = sink.records_written(),
                "sequential fetch aborted"
            );
            abort_sink(sink).await;
            Err(e)
        }
    }
}

async fn stream_pages<Q: PageQuery + ?Sized>(
    query: &Q,
    fetch: &FetchConfig,
    sink: &mut dyn DocumentSink,
    cancel: &CancellationToken,
) -> Result<Streamed> {
    let first = query_first_page(query, fetch, cancel).await?;
    let total = first.total;
    let mut records = first.documents.len();

    sink.write_page(&first.documents).await?;
    if is_complete(&first) {
        sink.finish().await?;
        return Ok(Streamed {
            records,
            total,
            pages: 1,
        });
    }
    drop(first);

    let remaining = plan(total, fetch.page_size)?;
    let pages = remaining.len() + 1;

    for page in remaining {
        let result = query_page(query, page, cancel).await?;
        check_page(total, page, &result);

        sink.write_page(&result.documents).await?;
        records += result.documents.len();
        tracing::debug!(offset = page.offset, records, total, "page written");
    }

    sink.finish().await?;
    Ok(Streamed {
        records,
        total,
        pages,
    })
}
