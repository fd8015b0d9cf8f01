//! Query value types shared by every persistence context.

pub mod filter;
pub mod pagination;
pub mod projection;
pub mod query;
pub mod sorting;
pub mod value;

pub use filter::{Filter, FilterField, FilterOp};
pub use pagination::{DEFAULT_CURRENT_PAGE, PageRequest, PageResponse};
pub use projection::{ProjectedColumn, Projection};
pub use query::{QueryOptions, QuerySpec};
pub use sorting::{SortDirection, SortField};
pub use value::SqlValue;
