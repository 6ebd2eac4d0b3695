use std::fmt;

use crate::record::EntityType;

pub const QUERY_PREFIX: &str = "query";

/// Kind of cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Get,
    List,
}

impl QueryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the cache key for a read result.
///
/// The generation segment changes on every invalidation, so results written
/// under an older generation are never read again.
pub fn query_key(entity: &EntityType, generation: u64, kind: QueryKind, fingerprint: &str) -> String {
    format!("{QUERY_PREFIX}:{entity}:g{generation}:{kind}:{fingerprint}")
}

/// Returns the pattern matching every cached read of an entity type.
pub fn entity_pattern(entity: &EntityType) -> String {
    format!("{QUERY_PREFIX}:{entity}:*")
}

/// Returns the counter key holding an entity type's cache generation.
///
/// Lives outside [`entity_pattern`] so invalidation never resets it.
pub fn generation_key(entity: &EntityType) -> String {
    format!("querygen:{entity}")
}

/// Returns the set key tracking every cached key of an entity type.
///
/// Lets backends without cheap key scans delete by entity type.
pub fn tracking_key(entity: &EntityType) -> String {
    format!("querykeys:{entity}")
}

/// Extracts the entity type from a query cache key.
///
/// ```
/// use entityflow_core::cache::extract_entity_from_key;
///
/// assert_eq!(extract_entity_from_key("query:store:g3:get:{}"), Some("store"));
/// assert_eq!(extract_entity_from_key("querygen:store"), None);
/// ```
pub fn extract_entity_from_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(QUERY_PREFIX)?.strip_prefix(':')?;
    let (entity, _) = rest.split_once(':')?;
    (!entity.is_empty()).then_some(entity)
}

/// Extracts the entity type from a pattern, if it is not a wildcard.
///
/// ```
/// use entityflow_core::cache::extract_entity_from_pattern;
///
/// assert_eq!(extract_entity_from_pattern("query:store:*"), Some("store"));
/// assert_eq!(extract_entity_from_pattern("query:*:g1:*"), None);
/// ```
pub fn extract_entity_from_pattern(pattern: &str) -> Option<&str> {
    extract_entity_from_key(pattern).filter(|entity| !entity.contains('*'))
}
