//! Query options and the compiled query handed to a persistence context.

use serde::{Deserialize, Serialize};

use super::filter::Filter;
use super::pagination::PageRequest;
use super::projection::Projection;
use super::sorting::SortField;
use crate::error::AppError;
use crate::result::AppResult;

/// Optional parts of a repository `get`: filter, ordering and paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Predicate applied to the entity set before projection.
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Ordering applied to the projected rows. Store order when empty.
    #[serde(default)]
    pub order_by: Vec<SortField>,
    /// Paging applied after ordering.
    #[serde(default)]
    pub page: Option<PageRequest>,
}

impl QueryOptions {
    /// No filter, no ordering, no paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the entity set.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a sort key.
    pub fn order_by(mut self, sort: SortField) -> Self {
        self.order_by.push(sort);
        self
    }

    /// Page with `page_size` rows on `current_page` (1-based).
    pub fn page(mut self, page_size: u64, current_page: u64) -> Self {
        self.page = Some(PageRequest::new(current_page, page_size));
        self
    }

    /// Page with `page_size` rows on the default current page.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page = Some(PageRequest::first(page_size));
        self
    }
}

/// A fully specified query over one entity set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Predicate on entity columns.
    pub filter: Option<Filter>,
    /// Row shape.
    pub projection: Projection,
    /// Ordering on projected columns.
    pub order_by: Vec<SortField>,
    /// Paging.
    pub page: Option<PageRequest>,
}

impl QuerySpec {
    /// Combine a projection with query options.
    pub fn new(projection: Projection, options: QueryOptions) -> Self {
        Self {
            filter: options.filter,
            projection,
            order_by: options.order_by,
            page: options.page,
        }
    }

    /// Reject empty projections and orderings on columns the projection
    /// does not expose.
    pub fn validate(&self) -> AppResult<()> {
        if self.projection.selected().is_some_and(<[_]>::is_empty) {
            return Err(AppError::validation("Projection selects no columns"));
        }
        for sort in &self.order_by {
            if !self.projection.exposes(&sort.field) {
                return Err(AppError::validation(format!(
                    "Cannot order by '{}': column is not part of the projection",
                    sort.field
                )));
            }
        }
        Ok(())
    }
}
