//! Search index backends.

mod memory;

pub use memory::MemorySearchIndex;
