use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use entityflow_core::record::{EntityId, EntityType};

use crate::tasks::PostCommitMode;

type Visited = HashSet<(EntityType, EntityId)>;

/// State shared by a top-level command and everything it triggers.
///
/// Carries the post-commit mode and the set of records the cascade tree has
/// already reached, so cyclic edges terminate.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    mode: PostCommitMode,
    visited: Arc<Mutex<Visited>>,
}

impl Scope {
    pub(crate) fn root(mode: PostCommitMode) -> Self {
        Self {
            mode,
            visited: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Scope for work that already runs off the caller's path.
    pub(crate) fn nested(&self) -> Self {
        Self {
            mode: PostCommitMode::Inline,
            visited: Arc::clone(&self.visited),
        }
    }

    pub(crate) fn mode(&self) -> PostCommitMode {
        self.mode
    }

    /// Marks a record as reached. Returns false if it was reached before.
    pub(crate) fn visit(&self, entity: &EntityType, id: &EntityId) -> bool {
        let key = (entity.clone(), id.clone());
        self.with_visited(|visited| visited.insert(key))
    }

    /// Marks a record as reached until the returned claim is dropped
    /// unsettled. Returns `None` if it was reached before.
    pub(crate) fn claim(&self, entity: &EntityType, id: &EntityId) -> Option<VisitClaim> {
        self.visit(entity, id).then(|| VisitClaim {
            scope: self.clone(),
            key: Some((entity.clone(), id.clone())),
        })
    }

    fn forget(&self, key: &(EntityType, EntityId)) {
        self.with_visited(|visited| visited.remove(key));
    }

    fn with_visited<T>(&self, f: impl FnOnce(&mut Visited) -> T) -> T {
        match self.visited.lock() {
            Ok(mut visited) => f(&mut *visited),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }
}

/// A visit mark that is released again unless the work it guards finishes.
///
/// Dropping an unsettled claim (an early return, a cancelled attempt) makes
/// the record reachable for the next attempt.
#[derive(Debug)]
pub(crate) struct VisitClaim {
    scope: Scope,
    key: Option<(EntityType, EntityId)>,
}

impl VisitClaim {
    pub(crate) fn settle(mut self) {
        self.key = None;
    }
}

impl Drop for VisitClaim {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.scope.forget(&key);
        }
    }
}
