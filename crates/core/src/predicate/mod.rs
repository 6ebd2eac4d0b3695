//! Query predicates.
//!
//! Callers describe filters with [`FilterExpr`]; [`compile`] validates them
//! against an entity's fields and merges them with the route predicate into a
//! normalized [`Predicate`] tree that storage backends translate natively.

mod ast;
mod compile;
mod error;
mod eval;
mod filter;

pub use ast::{CompareOp, Comparison, Predicate};
pub use compile::{active_scope, compile, compile_filter, normalize};
pub use error::PredicateError;
pub use eval::compare_values;
pub use filter::{FilterCondition, FilterExpr};
