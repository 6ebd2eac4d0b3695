//! Secondary search index seam.

mod error;
mod traits;

pub use error::{Result, SearchError};
pub use traits::SearchIndex;
