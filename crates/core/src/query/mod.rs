//! List query shapes and the pure operations that evaluate them in memory.

mod operations;
mod types;

pub use operations::{paginate, select, sort_records};
pub use types::{ListQuery, ListResult, Pagination, Sort, SortDirection};
