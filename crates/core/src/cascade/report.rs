use crate::pipeline::DependencyError;
use crate::record::{EntityId, EntityType};

/// Overall result of one cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    Completed,
    CompletedWithErrors,
}

/// What a cascade did to each dependent child.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CascadeReport {
    pub succeeded: Vec<(EntityType, EntityId)>,
    /// Children already handled earlier in the same cascade tree.
    pub skipped: Vec<(EntityType, EntityId)>,
    pub failures: Vec<DependencyError>,
}

impl CascadeReport {
    pub fn outcome(&self) -> CascadeOutcome {
        if self.failures.is_empty() {
            CascadeOutcome::Completed
        } else {
            CascadeOutcome::CompletedWithErrors
        }
    }

    /// Number of children the cascade attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }
}
