//! Paging over projected, ordered rows.

use serde::{Deserialize, Serialize};

/// Current page used when only a page size is given.
///
/// Pages are 1-based; page `0` is accepted and treated as the first page
/// (see [`PageRequest::offset`]).
pub const DEFAULT_CURRENT_PAGE: u64 = 0;

/// Request parameters for a paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-based; `0` clamps to the first page).
    #[serde(default = "default_page")]
    pub page: u64,
    /// Number of rows per page. `0` yields an empty page.
    pub page_size: u64,
}

impl PageRequest {
    /// Create a new page request. No clamping happens here; see `offset`.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    /// A request for `page_size` rows on the default current page.
    pub fn first(page_size: u64) -> Self {
        Self::new(DEFAULT_CURRENT_PAGE, page_size)
    }

    /// Number of rows to skip: `(page - 1) * page_size`.
    ///
    /// Page `0` saturates to an offset of zero, so it returns the same rows
    /// as page `1` instead of a negative skip.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Number of rows to take.
    pub fn limit(&self) -> u64 {
        self.page_size
    }

    /// The effective 1-based page number after clamping.
    pub fn effective_page(&self) -> u64 {
        self.page.max(1)
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Current page number (1-based).
    pub page: u64,
    /// Number of items per page.
    pub page_size: u64,
    /// Total number of items across all pages.
    pub total_items: u64,
    /// Total number of pages.
    pub total_pages: u64,
    /// Whether there is a next page.
    pub has_next: bool,
    /// Whether there is a previous page.
    pub has_previous: bool,
}

impl<T> PageResponse<T> {
    /// Create a new paginated response.
    pub fn new(items: Vec<T>, page: u64, page_size: u64, total_items: u64) -> Self {
        let total_pages = if total_items == 0 || page_size == 0 {
            1
        } else {
            total_items.div_ceil(page_size)
        };
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

fn default_page() -> u64 {
    DEFAULT_CURRENT_PAGE
}
