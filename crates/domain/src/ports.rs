//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and the persistence
//! layer. Adapters implement them to connect to a real store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::affiliation::{AffiliationOwner, SyncMode, SyncOutcome};
use crate::model::{
    EntityKind, Organization, OrganizationDraft, OrganizationId, Person, PersonDraft,
    PersonFilter, PersonId,
};
use crate::query::{Page, ResolvedQuery};

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lock contention or a similar condition that may succeed on retry
    #[error("Transient conflict: {0}")]
    Conflict(String),
    #[error("Duplicate value for {field}")]
    UniqueViolation { field: String },
    #[error("Referenced rows do not exist: {ids:?}")]
    MissingReference { ids: Vec<i64> },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether the failed transaction may be attempted again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Port answering "is this slug already taken?"
#[async_trait]
pub trait SlugIndex: Send + Sync {
    /// Check whether an organization other than `exclude` already uses `slug`
    async fn slug_exists(
        &self,
        slug: &str,
        exclude: Option<OrganizationId>,
    ) -> Result<bool, StoreError>;
}

/// Port for persisting organizations, people and their affiliations
///
/// Every mutating method is a single transaction: it either applies fully
/// or not at all.
#[async_trait]
pub trait DirectoryStore: SlugIndex {
    async fn insert_organization(
        &self,
        draft: &OrganizationDraft,
        now: OffsetDateTime,
    ) -> Result<Organization, StoreError>;

    async fn update_organization(
        &self,
        id: OrganizationId,
        draft: &OrganizationDraft,
        now: OffsetDateTime,
    ) -> Result<Organization, StoreError>;

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, StoreError>;

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, StoreError>;

    /// Delete an organization and its affiliation rows; returns false if absent
    async fn delete_organization(&self, id: OrganizationId) -> Result<bool, StoreError>;

    async fn list_organizations(
        &self,
        query: &ResolvedQuery,
    ) -> Result<Page<Organization>, StoreError>;

    /// Insert a person and attach `companies` in the same transaction
    async fn insert_person(
        &self,
        draft: &PersonDraft,
        companies: &BTreeSet<OrganizationId>,
        now: OffsetDateTime,
    ) -> Result<Person, StoreError>;

    /// Update a person; when `companies` is given the affiliation set is
    /// replaced in the same transaction
    async fn update_person(
        &self,
        id: PersonId,
        draft: &PersonDraft,
        companies: Option<&BTreeSet<OrganizationId>>,
        now: OffsetDateTime,
    ) -> Result<Person, StoreError>;

    async fn get_person(&self, id: PersonId) -> Result<Option<Person>, StoreError>;

    /// Delete a person and its affiliation rows; returns false if absent
    async fn delete_person(&self, id: PersonId) -> Result<bool, StoreError>;

    async fn list_people(
        &self,
        query: &ResolvedQuery,
        filter: &PersonFilter,
    ) -> Result<Page<Person>, StoreError>;

    /// Check whether a person other than `exclude` already uses `email`
    async fn email_exists(
        &self,
        email: &str,
        exclude: Option<PersonId>,
    ) -> Result<bool, StoreError>;

    /// Return the subset of `ids` that has no row in the `kind` collection
    async fn missing_ids(
        &self,
        kind: EntityKind,
        ids: &BTreeSet<i64>,
    ) -> Result<BTreeSet<i64>, StoreError>;

    /// Apply an attach / replace / detach to the owner's affiliation set
    async fn sync_affiliations(
        &self,
        owner: AffiliationOwner,
        ids: &BTreeSet<i64>,
        mode: SyncMode,
    ) -> Result<SyncOutcome, StoreError>;

    /// People affiliated with an organization, ordered by id
    async fn organization_members(
        &self,
        id: OrganizationId,
    ) -> Result<Vec<Person>, StoreError>;

    /// Organizations a person is affiliated with, ordered by id
    async fn person_organizations(&self, id: PersonId) -> Result<Vec<Organization>, StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
