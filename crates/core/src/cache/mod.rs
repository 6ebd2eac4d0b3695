mod error;
mod keys;
mod patterns;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    entity_pattern, extract_entity_from_key, extract_entity_from_pattern, generation_key,
    query_key, tracking_key, QueryKind, QUERY_PREFIX,
};
pub use patterns::pattern_matches;
pub use serialization::{decode, encode, parse_counter};
pub use traits::Cache;
