use crate::pipeline::Verb;
use crate::record::{DataClause, EntityType};

/// Parent mutation that fires an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadeTrigger {
    OnDelete,
    OnUpdate,
}

impl CascadeTrigger {
    /// Trigger fired by a committed verb, if any.
    pub const fn for_verb(verb: Verb) -> Option<Self> {
        match verb {
            Verb::Delete => Some(Self::OnDelete),
            Verb::Update => Some(Self::OnUpdate),
            Verb::Create | Verb::Get | Verb::List => None,
        }
    }
}

/// What happens to each dependent child.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeAction {
    SoftDelete,
    Update(DataClause),
}

impl CascadeAction {
    /// Verb the child command runs with.
    pub const fn verb(&self) -> Verb {
        match self {
            Self::SoftDelete => Verb::Delete,
            Self::Update(_) => Verb::Update,
        }
    }
}

/// Declares that `child.foreign_key` references `parent.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeEdge {
    pub parent: EntityType,
    pub child: EntityType,
    pub foreign_key: String,
    pub trigger: CascadeTrigger,
    pub action: CascadeAction,
}

impl CascadeEdge {
    /// Soft-deletes active children when the parent is deleted.
    pub fn soft_delete(
        parent: impl Into<EntityType>,
        child: impl Into<EntityType>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            foreign_key: foreign_key.into(),
            trigger: CascadeTrigger::OnDelete,
            action: CascadeAction::SoftDelete,
        }
    }

    /// Applies `clause` to active children when the parent hits `trigger`.
    pub fn update(
        parent: impl Into<EntityType>,
        child: impl Into<EntityType>,
        foreign_key: impl Into<String>,
        trigger: CascadeTrigger,
        clause: DataClause,
    ) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            foreign_key: foreign_key.into(),
            trigger,
            action: CascadeAction::Update(clause),
        }
    }
}
