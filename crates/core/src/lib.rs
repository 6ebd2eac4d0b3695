//! Functional core of the entityflow command pipeline.
//!
//! Pure types, traits and functions shared by every backend: records and
//! schemas, predicate compilation, query shapes, the storage/cache/search/event
//! seams, cascade planning and the command vocabulary.

pub mod cache;
pub mod cascade;
pub mod events;
pub mod pipeline;
pub mod predicate;
pub mod query;
pub mod record;
pub mod search;
pub mod storage;
