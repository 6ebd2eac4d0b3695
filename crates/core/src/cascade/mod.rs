//! Parent/child relationships and the bookkeeping of cascaded work.

mod graph;
mod report;
mod types;

pub use graph::{edges_for, find_cycles};
pub use report::{CascadeOutcome, CascadeReport};
pub use types::{CascadeAction, CascadeEdge, CascadeTrigger};
