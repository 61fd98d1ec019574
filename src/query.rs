//! The page query seam
//!
//! Aggregators only ever talk to a [`PageQuery`]. The HTTP implementation
//! lives in [`crate::transport`]; tests and embedders can plug in anything
//! else, including plain async closures through [`query_fn`].

use crate::error::Result;
use crate::types::{PageDescriptor, PageResult};
use async_trait::async_trait;
use std::future::Future;

/// Fetches one page of a collection
///
/// Implementations must be safe to call concurrently: the parallel
/// aggregator keeps many calls in flight on the same `&self`.
///
/// # Examples
///
/// ```
/// use collection_fetch::query::{PageQuery, query_fn};
/// use collection_fetch::types::{PageDescriptor, PageResult};
///
/// # #[tokio::main]
/// # async fn main() -> collection_fetch::Result<()> {
/// let query = query_fn(|page: PageDescriptor| async move {
///     Ok(PageResult {
///         documents: vec![serde_json::json!({ "id": page.offset })],
///         total: 1,
///     })
/// });
///
/// let first = query.query(PageDescriptor { limit: 10, offset: 0 }).await?;
/// assert_eq!(first.total, 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait PageQuery: Send + Sync {
    /// Fetch `page.limit` documents starting at `page.offset`
    ///
    /// # Errors
    ///
    /// Any failure is terminal for the fetch that issued the query; it is
    /// returned to the caller unchanged and never retried.
    async fn query(&self, page: PageDescriptor) -> Result<PageResult>;
}

#[async_trait]
impl<Q: PageQuery + ?Sized> PageQuery for &Q {
    async fn query(&self, page: PageDescriptor) -> Result<PageResult> {
        (**self).query(page).await
    }
}

#[async_trait]
impl<Q: PageQuery + ?Sized> PageQuery for std::sync::Arc<Q> {
    async fn query(&self, page: PageDescriptor) -> Result<PageResult> {
        (**self).query(page).await
    }
}

/// [`PageQuery`] backed by an async closure
#[derive(Clone)]
pub struct QueryFn<F> {
    f: F,
}

/// Wrap an async closure `Fn(PageDescriptor) -> Future<Output = Result<PageResult>>`
pub fn query_fn<F, Fut>(f: F) -> QueryFn<F>
where
    F: Fn(PageDescriptor) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageResult>> + Send,
{
    QueryFn { f }
}

#[async_trait]
impl<F, Fut> PageQuery for QueryFn<F>
where
    F: Fn(PageDescriptor) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageResult>> + Send,
{
    async fn query(&self, page: PageDescriptor) -> Result<PageResult> {
        (self.f)(page).await
    }
}
