use super::DependencyError;

/// Sink for post-commit failures.
///
/// Injected into the pipeline so tests can collect failures instead of
/// scraping logs.
pub trait Reporter: Send + Sync {
    fn report(&self, error: &DependencyError);
}
