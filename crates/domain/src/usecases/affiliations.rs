//! Attach / replace / detach use case for organization-person affiliations

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::affiliation::{AffiliationOwner, SyncMode, SyncOutcome};
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::EntityKind;
use crate::ports::{DirectoryStore, StoreError};
use crate::retry::RetryPolicy;
use crate::rules;

/// Applies affiliation changes inside a retried store transaction
#[derive(Clone)]
pub struct AffiliationSync {
    store: Arc<dyn DirectoryStore>,
    retry: RetryPolicy,
}

impl AffiliationSync {
    pub fn new(store: Arc<dyn DirectoryStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Add `(owner, id)` for every id not already present
    pub async fn attach(&self, owner: AffiliationOwner, ids: &[i64]) -> DirectoryResult<SyncOutcome> {
        self.sync(owner, ids, SyncMode::Attach).await
    }

    /// Make the owner's set exactly `ids`
    pub async fn replace(&self, owner: AffiliationOwner, ids: &[i64]) -> DirectoryResult<SyncOutcome> {
        self.sync(owner, ids, SyncMode::Replace).await
    }

    /// Remove `(owner, id)` for every id that is present
    pub async fn detach(&self, owner: AffiliationOwner, ids: &[i64]) -> DirectoryResult<SyncOutcome> {
        self.sync(owner, ids, SyncMode::Detach).await
    }

    async fn sync(
        &self,
        owner: AffiliationOwner,
        ids: &[i64],
        mode: SyncMode,
    ) -> DirectoryResult<SyncOutcome> {
        let field = reference_field(owner);
        let operation = operation_name(mode);

        let ids: BTreeSet<i64> = if mode.adds_pairs() {
            rules::id_set(field, ids)?
        } else {
            ids.iter().copied().collect()
        };

        self.ensure_owner(owner).await?;
        if mode.adds_pairs() {
            ensure_references(self.store.as_ref(), owner.related_kind(), &ids, field).await?;
        }

        let store = &self.store;
        let ids = &ids;
        let outcome = self
            .retry
            .run(operation, move || async move {
                store.sync_affiliations(owner, ids, mode).await
            })
            .await
            .map_err(|e| DirectoryError::from_store(e, operation, field))?;

        tracing::info!(
            owner = ?owner,
            mode = ?mode,
            attached = outcome.attached.len(),
            detached = outcome.detached.len(),
            "Affiliations synchronized"
        );

        Ok(outcome)
    }

    async fn ensure_owner(&self, owner: AffiliationOwner) -> DirectoryResult<()> {
        let exists = match owner {
            AffiliationOwner::Organization(id) => {
                self.store.get_organization(id).await.map(|o| o.is_some())
            }
            AffiliationOwner::Person(id) => self.store.get_person(id).await.map(|p| p.is_some()),
        }
        .map_err(|e| DirectoryError::from_store(e, "load_affiliation_owner", "id"))?;

        if exists {
            Ok(())
        } else {
            Err(DirectoryError::not_found(owner.kind(), owner.id()))
        }
    }
}

/// Fail with a validation error naming `field` when any id has no row
pub(crate) async fn ensure_references(
    store: &dyn DirectoryStore,
    kind: EntityKind,
    ids: &BTreeSet<i64>,
    field: &str,
) -> DirectoryResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let missing = store
        .missing_ids(kind, ids)
        .await
        .map_err(|e| DirectoryError::from_store(e, "check_references", field))?;

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DirectoryError::from_store(
            StoreError::MissingReference {
                ids: missing.into_iter().collect(),
            },
            "check_references",
            field,
        ))
    }
}

fn reference_field(owner: AffiliationOwner) -> &'static str {
    match owner {
        AffiliationOwner::Organization(_) => "people",
        AffiliationOwner::Person(_) => "companies",
    }
}

fn operation_name(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Attach => "attach_affiliations",
        SyncMode::Replace => "replace_affiliations",
        SyncMode::Detach => "detach_affiliations",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::testing::FakeStore;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn fixture() -> (Arc<FakeStore>, AffiliationSync) {
        let store = Arc::new(FakeStore::default());
        for id in 1..=4 {
            store.seed_person(id, &format!("p{id}@example.com"));
        }
        store.organizations.lock().unwrap().insert(
            10,
            crate::model::Organization {
                id: 10,
                name: "Acme".to_string(),
                slug: "acme".to_string(),
                tax_id: "5260250021".to_string(),
                address: "1 Main St".to_string(),
                city: "Warsaw".to_string(),
                zip: "00-001".to_string(),
                created_at: time::OffsetDateTime::UNIX_EPOCH,
                updated_at: time::OffsetDateTime::UNIX_EPOCH,
            },
        );
        let sync = AffiliationSync::new(store.clone(), RetryPolicy::new(5, Duration::ZERO));
        (store, sync)
    }

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    const ACME: AffiliationOwner = AffiliationOwner::Organization(10);

    #[tokio::test]
    async fn test_attach_twice_accumulates() {
        let (store, sync) = fixture();
        sync.attach(ACME, &[1, 2]).await.unwrap();
        let outcome = sync.attach(ACME, &[2, 3]).await.unwrap();

        assert_eq!(outcome.attached, set(&[3]));
        assert_eq!(store.members_of(10), set(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_replace_twice_keeps_last_set() {
        let (store, sync) = fixture();
        sync.replace(ACME, &[1, 2]).await.unwrap();
        sync.replace(ACME, &[3]).await.unwrap();

        assert_eq!(store.members_of(10), set(&[3]));
    }

    #[tokio::test]
    async fn test_detach_never_attached_is_noop() {
        let (store, sync) = fixture();
        sync.attach(ACME, &[1]).await.unwrap();
        let outcome = sync.detach(ACME, &[4]).await.unwrap();

        assert!(outcome.is_noop());
        assert_eq!(store.members_of(10), set(&[1]));
    }

    #[tokio::test]
    async fn test_attach_unknown_person_is_rejected_without_effect() {
        let (store, sync) = fixture();
        let err = sync.attach(ACME, &[1, 99]).await.unwrap_err();

        assert_eq!(err.status(), 422);
        assert_eq!(err.to_string(), "people: unknown ids: 99");
        assert!(store.members_of(10).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_owner_is_not_found() {
        let (_store, sync) = fixture();
        let err = sync
            .attach(AffiliationOwner::Organization(77), &[1])
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_transient_conflicts_are_retried() {
        let (store, sync) = fixture();
        store.conflicts.store(3, Ordering::SeqCst);

        sync.attach(ACME, &[1, 2]).await.unwrap();

        assert_eq!(store.writes.load(Ordering::SeqCst), 4);
        assert_eq!(store.members_of(10), set(&[1, 2]));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_transient_error() {
        let (store, sync) = fixture();
        store.conflicts.store(5, Ordering::SeqCst);

        let err = sync.attach(ACME, &[1]).await.unwrap_err();

        assert!(matches!(err, DirectoryError::TransientStorage));
        assert_eq!(err.status(), 500);
        assert!(store.members_of(10).is_empty());
    }

    #[tokio::test]
    async fn test_person_side_attach() {
        let (store, sync) = fixture();
        sync.attach(AffiliationOwner::Person(2), &[10])
            .await
            .unwrap();
        assert_eq!(store.members_of(10), set(&[2]));
    }
}
