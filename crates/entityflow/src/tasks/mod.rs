//! Bounded background task queue for post-commit work.
//!
//! Jobs are retried with exponential backoff and a per-attempt timeout. A job
//! that exhausts its attempts becomes a `DependencyError` handed to the
//! injected `Reporter`; nothing is dropped silently.

mod queue;
mod retry;

pub use queue::{Job, JobContext, TaskQueue};
pub use retry::{run_with_retry, PostCommitMode, RetryPolicy};
