//! Domain events emitted after committed writes.

mod error;
mod traits;
mod types;

pub use error::{EventError, Result};
pub use traits::EventBus;
pub use types::{event_topic, DomainEvent};
