//! Page boundary planning
//!
//! The first page is always requested at offset 0 on its own, because its
//! response is what reveals the collection's total. [`plan`] then covers the
//! rest: descriptors at `page_size, 2 * page_size, ...` below `total`. Together
//! they tile `[0, total)` without gaps or overlaps.

use crate::error::{PlanningError, Result};
use crate::types::PageDescriptor;

/// Descriptor of the first page, validating the page size
///
/// Called before any request is made so a bad page size never reaches the network.
pub fn first_page(page_size: u64) -> Result<PageDescriptor> {
    if page_size == 0 {
        return Err(PlanningError::InvalidPageSize { page_size }.into());
    }
    Ok(PageDescriptor {
        limit: page_size,
        offset: 0,
    })
}

/// Descriptors for every page after the first, in ascending offset order
///
/// Returns an empty list when `total <= page_size`.
///
/// # Examples
///
/// ```
/// use collection_fetch::planner::plan;
///
/// let pages = plan(5, 2).unwrap();
/// let offsets: Vec<u64> = pages.iter().map(|p| p.offset).collect();
/// assert_eq!(offsets, vec![2, 4]);
/// ```
pub fn plan(total: u64, page_size: u64) -> Result<Vec<PageDescriptor>> {
    first_page(page_size)?;

    let pages = (1..total.div_ceil(page_size))
        .map(|index| PageDescriptor {
            limit: page_size,
            offset: index * page_size,
        })
        .collect();

    Ok(pages)
}

/// Reject a concurrency cap that would never let a request through
pub fn check_concurrency(max_concurrent_pages: Option<usize>) -> Result<()> {
    match max_concurrent_pages {
        Some(0) => Err(PlanningError::InvalidConcurrency { limit: 0 }.into()),
        _ => Ok(()),
    }
}

/// Effective number of simultaneous requests for `pending` pages
///
/// `None` means every pending page is requested at once.
pub(crate) fn concurrency_limit(max_concurrent_pages: Option<usize>, pending: usize) -> usize {
    max_concurrent_pages.unwrap_or(pending).min(pending).max(1)
}
