//! Many-to-many affiliation sets between organizations and people

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{EntityKind, OrganizationId, PersonId};

/// The side of the association whose set is being changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AffiliationOwner {
    /// An organization owning a set of people
    Organization(OrganizationId),
    /// A person owning a set of organizations
    Person(PersonId),
}

impl AffiliationOwner {
    pub fn id(self) -> i64 {
        match self {
            Self::Organization(id) | Self::Person(id) => id,
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Self::Organization(_) => EntityKind::Organization,
            Self::Person(_) => EntityKind::Person,
        }
    }

    /// Collection the owned ids point into
    pub fn related_kind(self) -> EntityKind {
        match self {
            Self::Organization(_) => EntityKind::Person,
            Self::Person(_) => EntityKind::Organization,
        }
    }

    /// Orient an (owner, related) pair as (organization_id, person_id)
    pub fn pair(self, related: i64) -> (OrganizationId, PersonId) {
        match self {
            Self::Organization(id) => (id, related),
            Self::Person(id) => (related, id),
        }
    }
}

/// How a requested id set combines with the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Add missing pairs, keep everything else
    Attach,
    /// Make the set exactly the requested ids
    Replace,
    /// Remove requested pairs that are present
    Detach,
}

impl SyncMode {
    /// Whether the requested ids must reference existing rows
    pub fn adds_pairs(self) -> bool {
        matches!(self, Self::Attach | Self::Replace)
    }
}

/// Pairs to insert and delete, expressed as related ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub attached: BTreeSet<i64>,
    pub detached: BTreeSet<i64>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

/// Compute the changes that take `current` to the state `mode` asks for
pub fn plan(current: &BTreeSet<i64>, requested: &BTreeSet<i64>, mode: SyncMode) -> SyncOutcome {
    match mode {
        SyncMode::Attach => SyncOutcome {
            attached: requested.difference(current).copied().collect(),
            detached: BTreeSet::new(),
        },
        SyncMode::Replace => SyncOutcome {
            attached: requested.difference(current).copied().collect(),
            detached: current.difference(requested).copied().collect(),
        },
        SyncMode::Detach => SyncOutcome {
            attached: BTreeSet::new(),
            detached: requested.intersection(current).copied().collect(),
        },
    }
}

/// Apply an outcome to a set in place
pub fn apply(current: &mut BTreeSet<i64>, outcome: &SyncOutcome) {
    for id in &outcome.detached {
        current.remove(id);
    }
    current.extend(outcome.attached.iter().copied());
}
