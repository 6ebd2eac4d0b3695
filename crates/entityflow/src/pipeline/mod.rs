//! Entity command pipeline.
//!
//! Every entity shares one lifecycle; per-entity behavior is configuration
//! ([`EntityDefinition`]) rather than a type per entity and verb.

mod command;
mod definition;
mod jobs;
mod scope;
mod service;


pub use definition::{
    default_data_clause, DataClauseHook, EntityDefinition, EntityDefinitionBuilder, EntityHooks,
    EntityRegistry, ExtraWritesHook, PlannedWrite, RouteQueryHook, ValidateHook, WriteContext,
};
pub use service::{Pipeline, PipelineBuilder, ReindexError};

pub(crate) use scope::Scope;
