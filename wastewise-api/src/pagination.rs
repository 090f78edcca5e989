//! Pagination utilities for article listings

use serde::Serialize;

/// Default page size for the public article list
pub const DEFAULT_PAGE_SIZE: i64 = 12;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub page_size: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Wire form: `{current, pages, total, hasNext, hasPrev}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Sanitize the requested page and size
///
/// `page` below 1 becomes 1 and `page_size` is clamped to
/// `1..=MAX_PAGE_SIZE`. The page is not clamped to the last page: asking
/// past the end yields an empty slice. The offset saturates at `i64::MAX`.
///
/// # Examples
/// ```
/// use wastewise_api::pagination::calculate_pagination;
///
/// let p = calculate_pagination(30, 2, 12);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 12);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let page = requested_page.max(1);
    let total_pages = (total_results.max(0) + page_size - 1) / page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        offset: (page - 1).saturating_mul(page_size),
    }
}

impl Pagination {
    pub fn info(&self, total: i64) -> PageInfo {
        PageInfo {
            current: self.page,
            pages: self.total_pages,
            total,
            has_next: self.page < self.total_pages,
            has_prev: self.page > 1,
        }
    }
}
