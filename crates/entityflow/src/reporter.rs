//! Reporters for swallowed post-commit failures.

use std::sync::Mutex;

use entityflow_core::pipeline::{DependencyError, Reporter};

/// Logs every dependency failure at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, error: &DependencyError) {
        tracing::warn!(
            step = %error.step,
            entity_type = %error.entity_type,
            entity_id = %error.entity_id,
            verb = %error.operation,
            error = %error.cause,
            "Post-commit step failed"
        );
    }
}

/// Keeps dependency failures in memory for inspection or manual retry.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    errors: Mutex<Vec<DependencyError>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn errors(&self) -> Vec<DependencyError> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }

    /// Removes and returns everything reported so far.
    pub fn take(&self) -> Vec<DependencyError> {
        self.errors
            .lock()
            .map(|mut errors| std::mem::take(&mut *errors))
            .unwrap_or_default()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, error: &DependencyError) {
        TracingReporter.report(error);
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use entityflow_core::pipeline::{Step, Verb};
    use entityflow_core::record::{EntityId, EntityType};

    use super::*;

    fn failure(id: &str) -> DependencyError {
        DependencyError::new(
            Step::Reindex,
            EntityType::new("store"),
            EntityId::new(id),
            Verb::Update,
            "index offline",
        )
    }

    #[test]
    fn test_collecting_reporter_keeps_errors() {
        let reporter = CollectingReporter::new();
        reporter.report(&failure("s1"));
        reporter.report(&failure("s2"));

        let errors = reporter.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].entity_id, EntityId::new("s2"));
    }

    #[test]
    fn test_take_drains() {
        let reporter = CollectingReporter::new();
        reporter.report(&failure("s1"));

        assert_eq!(reporter.take().len(), 1);
        assert!(reporter.errors().is_empty());
    }
}
