//! In-memory directory store for testing and throwaway sessions

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use bizdir_domain::affiliation;
use bizdir_domain::{
    AffiliationOwner, DirectoryStore, EntityKind, Organization, OrganizationDraft,
    OrganizationId, Page, Person, PersonDraft, PersonFilter, PersonId, ResolvedQuery, SlugIndex,
    SortDirection, StoreError, SyncMode, SyncOutcome,
};
use time::OffsetDateTime;

#[derive(Default)]
struct Tables {
    organizations: BTreeMap<OrganizationId, Organization>,
    people: BTreeMap<PersonId, Person>,
    /// (organization_id, person_id)
    affiliations: BTreeSet<(OrganizationId, PersonId)>,
    next_organization_id: i64,
    next_person_id: i64,
}

impl Tables {
    fn contains(&self, kind: EntityKind, id: i64) -> bool {
        match kind {
            EntityKind::Organization => self.organizations.contains_key(&id),
            EntityKind::Person => self.people.contains_key(&id),
        }
    }

    fn missing(&self, kind: EntityKind, ids: &BTreeSet<i64>) -> BTreeSet<i64> {
        ids.iter()
            .copied()
            .filter(|id| !self.contains(kind, *id))
            .collect()
    }

    fn related(&self, owner: AffiliationOwner) -> BTreeSet<i64> {
        self.affiliations
            .iter()
            .filter_map(|&(organization_id, person_id)| match owner {
                AffiliationOwner::Organization(id) if id == organization_id => Some(person_id),
                AffiliationOwner::Person(id) if id == person_id => Some(organization_id),
                _ => None,
            })
            .collect()
    }

    /// Validate and apply in one step so a failure leaves nothing behind
    fn sync(
        &mut self,
        owner: AffiliationOwner,
        ids: &BTreeSet<i64>,
        mode: SyncMode,
    ) -> Result<SyncOutcome, StoreError> {
        if mode.adds_pairs() {
            let missing = self.missing(owner.related_kind(), ids);
            if !missing.is_empty() {
                return Err(StoreError::MissingReference {
                    ids: missing.into_iter().collect(),
                });
            }
        }

        let outcome = affiliation::plan(&self.related(owner), ids, mode);
        for related in &outcome.detached {
            self.affiliations.remove(&owner.pair(*related));
        }
        for related in &outcome.attached {
            self.affiliations.insert(owner.pair(*related));
        }
        Ok(outcome)
    }

    fn slug_taken(&self, slug: &str, exclude: Option<OrganizationId>) -> bool {
        self.organizations
            .values()
            .any(|o| o.slug == slug && Some(o.id) != exclude)
    }

    fn email_taken(&self, email: &str, exclude: Option<PersonId>) -> bool {
        self.people
            .values()
            .any(|p| p.email == email && Some(p.id) != exclude)
    }
}

fn compare_organizations(a: &Organization, b: &Organization, field: &str) -> Ordering {
    match field {
        "name" => a.name.cmp(&b.name),
        "slug" => a.slug.cmp(&b.slug),
        "tax_id" => a.tax_id.cmp(&b.tax_id),
        "address" => a.address.cmp(&b.address),
        "city" => a.city.cmp(&b.city),
        "zip" => a.zip.cmp(&b.zip),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.id.cmp(&b.id),
    }
}

fn compare_people(a: &Person, b: &Person, field: &str) -> Ordering {
    match field {
        "first_name" => a.first_name.cmp(&b.first_name),
        "last_name" => a.last_name.cmp(&b.last_name),
        "email" => a.email.cmp(&b.email),
        "phone" => a.phone.cmp(&b.phone),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.id.cmp(&b.id),
    }
}

/// Sort by the requested field with ascending id as tie-breaker, then cut
/// out the requested page
fn paginate<T: Clone>(
    mut rows: Vec<T>,
    query: &ResolvedQuery,
    compare: impl Fn(&T, &T, &str) -> Ordering,
    id: impl Fn(&T) -> i64,
) -> Page<T> {
    rows.sort_by(|a, b| {
        let primary = compare(a, b, &query.order_by);
        let primary = match query.order_dir {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| id(a).cmp(&id(b)))
    });

    let total = rows.len() as u64;
    let data = if query.is_unbounded() {
        rows
    } else {
        rows.into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.take as usize)
            .collect()
    };
    Page::new(data, total, query)
}

/// In-memory directory store implementation
///
/// A single lock guards every table, so each method is atomic.
pub struct InMemoryDirectoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Default for InMemoryDirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlugIndex for InMemoryDirectoryStore {
    async fn slug_exists(
        &self,
        slug: &str,
        exclude: Option<OrganizationId>,
    ) -> Result<bool, StoreError> {
        Ok(self.read()?.slug_taken(slug, exclude))
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn insert_organization(
        &self,
        draft: &OrganizationDraft,
        now: OffsetDateTime,
    ) -> Result<Organization, StoreError> {
        let mut tables = self.write()?;
        if tables.slug_taken(&draft.slug, None) {
            return Err(StoreError::UniqueViolation {
                field: "slug".to_string(),
            });
        }

        tables.next_organization_id += 1;
        let org = Organization {
            id: tables.next_organization_id,
            name: draft.name.clone(),
            slug: draft.slug.clone(),
            tax_id: draft.tax_id.clone(),
            address: draft.address.clone(),
            city: draft.city.clone(),
            zip: draft.zip.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.organizations.insert(org.id, org.clone());
        Ok(org)
    }

    async fn update_organization(
        &self,
        id: OrganizationId,
        draft: &OrganizationDraft,
        now: OffsetDateTime,
    ) -> Result<Organization, StoreError> {
        let mut tables = self.write()?;
        if tables.slug_taken(&draft.slug, Some(id)) {
            return Err(StoreError::UniqueViolation {
                field: "slug".to_string(),
            });
        }

        let org = tables
            .organizations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        org.name = draft.name.clone();
        org.slug = draft.slug.clone();
        org.tax_id = draft.tax_id.clone();
        org.address = draft.address.clone();
        org.city = draft.city.clone();
        org.zip = draft.zip.clone();
        org.updated_at = now;
        Ok(org.clone())
    }

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, StoreError> {
        Ok(self.read()?.organizations.get(&id).cloned())
    }

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, StoreError> {
        Ok(self
            .read()?
            .organizations
            .values()
            .find(|o| o.slug == slug)
            .cloned())
    }

    async fn delete_organization(&self, id: OrganizationId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        tables.affiliations.retain(|&(organization_id, _)| organization_id != id);
        Ok(tables.organizations.remove(&id).is_some())
    }

    async fn list_organizations(
        &self,
        query: &ResolvedQuery,
    ) -> Result<Page<Organization>, StoreError> {
        let rows: Vec<Organization> = self.read()?.organizations.values().cloned().collect();
        Ok(paginate(rows, query, compare_organizations, |o| o.id))
    }

    async fn insert_person(
        &self,
        draft: &PersonDraft,
        companies: &BTreeSet<OrganizationId>,
        now: OffsetDateTime,
    ) -> Result<Person, StoreError> {
        let mut tables = self.write()?;
        if tables.email_taken(&draft.email, None) {
            return Err(StoreError::UniqueViolation {
                field: "email".to_string(),
            });
        }
        let missing = tables.missing(EntityKind::Organization, companies);
        if !missing.is_empty() {
            return Err(StoreError::MissingReference {
                ids: missing.into_iter().collect(),
            });
        }

        tables.next_person_id += 1;
        let person = Person {
            id: tables.next_person_id,
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.people.insert(person.id, person.clone());
        tables.sync(AffiliationOwner::Person(person.id), companies, SyncMode::Attach)?;
        Ok(person)
    }

    async fn update_person(
        &self,
        id: PersonId,
        draft: &PersonDraft,
        companies: Option<&BTreeSet<OrganizationId>>,
        now: OffsetDateTime,
    ) -> Result<Person, StoreError> {
        let mut tables = self.write()?;
        if !tables.people.contains_key(&id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if tables.email_taken(&draft.email, Some(id)) {
            return Err(StoreError::UniqueViolation {
                field: "email".to_string(),
            });
        }
        if let Some(companies) = companies {
            tables.sync(AffiliationOwner::Person(id), companies, SyncMode::Replace)?;
        }

        let person = tables
            .people
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        person.first_name = draft.first_name.clone();
        person.last_name = draft.last_name.clone();
        person.email = draft.email.clone();
        person.phone = draft.phone.clone();
        person.updated_at = now;
        Ok(person.clone())
    }

    async fn get_person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        Ok(self.read()?.people.get(&id).cloned())
    }

    async fn delete_person(&self, id: PersonId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        tables.affiliations.retain(|&(_, person_id)| person_id != id);
        Ok(tables.people.remove(&id).is_some())
    }

    async fn list_people(
        &self,
        query: &ResolvedQuery,
        filter: &PersonFilter,
    ) -> Result<Page<Person>, StoreError> {
        let tables = self.read()?;
        let rows: Vec<Person> = match &filter.companies {
            Some(companies) => {
                let members: BTreeSet<PersonId> = tables
                    .affiliations
                    .iter()
                    .filter(|(organization_id, _)| companies.contains(organization_id))
                    .map(|&(_, person_id)| person_id)
                    .collect();
                members
                    .iter()
                    .filter_map(|id| tables.people.get(id).cloned())
                    .collect()
            }
            None => tables.people.values().cloned().collect(),
        };
        Ok(paginate(rows, query, compare_people, |p| p.id))
    }

    async fn email_exists(
        &self,
        email: &str,
        exclude: Option<PersonId>,
    ) -> Result<bool, StoreError> {
        Ok(self.read()?.email_taken(email, exclude))
    }

    async fn missing_ids(
        &self,
        kind: EntityKind,
        ids: &BTreeSet<i64>,
    ) -> Result<BTreeSet<i64>, StoreError> {
        Ok(self.read()?.missing(kind, ids))
    }

    async fn sync_affiliations(
        &self,
        owner: AffiliationOwner,
        ids: &BTreeSet<i64>,
        mode: SyncMode,
    ) -> Result<SyncOutcome, StoreError> {
        let mut tables = self.write()?;
        if !tables.contains(owner.kind(), owner.id()) {
            return Err(StoreError::NotFound(owner.id().to_string()));
        }
        tables.sync(owner, ids, mode)
    }

    async fn organization_members(
        &self,
        id: OrganizationId,
    ) -> Result<Vec<Person>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .related(AffiliationOwner::Organization(id))
            .iter()
            .filter_map(|person_id| tables.people.get(person_id).cloned())
            .collect())
    }

    async fn person_organizations(&self, id: PersonId) -> Result<Vec<Organization>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .related(AffiliationOwner::Person(id))
            .iter()
            .filter_map(|organization_id| tables.organizations.get(organization_id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizdir_domain::{
        DirectoryConfig, FixedClock, ListParams, NewOrganization, OrganizationKey,
        OrganizationService,
    };
    use std::sync::Arc;

    fn org_draft(name: &str, slug: &str, city: &str) -> OrganizationDraft {
        OrganizationDraft {
            name: name.to_string(),
            slug: slug.to_string(),
            tax_id: "5260250021".to_string(),
            address: "ul. Prosta 1".to_string(),
            city: city.to_string(),
            zip: "00-001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sort_ties_break_on_id() {
        let store = InMemoryDirectoryStore::new();
        for (name, city) in [("A", "Kraków"), ("B", "Gdańsk"), ("C", "Kraków"), ("D", "Gdańsk")] {
            store
                .insert_organization(&org_draft(name, &name.to_lowercase(), city), OffsetDateTime::UNIX_EPOCH)
                .await
                .unwrap();
        }

        let page = store
            .list_organizations(&ResolvedQuery {
                take: 10,
                order_by: "city".to_string(),
                order_dir: SortDirection::Desc,
                page: 1,
            })
            .await
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "B", "D"]);
    }

    #[tokio::test]
    async fn test_take_zero_returns_everything() {
        let store = InMemoryDirectoryStore::new();
        for n in 0..12 {
            store
                .insert_organization(&org_draft(&format!("Org {n}"), &format!("org-{n}"), "Łódź"), OffsetDateTime::UNIX_EPOCH)
                .await
                .unwrap();
        }

        let page = store
            .list_organizations(&ResolvedQuery {
                take: 0,
                order_by: "id".to_string(),
                order_dir: SortDirection::Asc,
                page: 1,
            })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 12);
        assert_eq!(page.last_page, 1);
    }

    #[tokio::test]
    async fn test_sync_checks_owner_and_references() {
        let store = InMemoryDirectoryStore::new();
        let org = store
            .insert_organization(&org_draft("Acme", "acme", "Poznań"), OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        let err = store
            .sync_affiliations(AffiliationOwner::Person(5), &BTreeSet::from([org.id]), SyncMode::Attach)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store
            .sync_affiliations(AffiliationOwner::Organization(org.id), &BTreeSet::from([3]), SyncMode::Attach)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference { .. }));
    }

    #[tokio::test]
    async fn test_service_over_memory_store() {
        let store = Arc::new(InMemoryDirectoryStore::new());
        let clock = Arc::new(FixedClock(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()));
        let service = OrganizationService::new(store, clock, DirectoryConfig::default());

        let input = NewOrganization {
            name: "Acme".to_string(),
            tax_id: "1111111111".to_string(),
            address: "ul. Długa 5".to_string(),
            city: "Gdańsk".to_string(),
            zip: "80-001".to_string(),
        };
        service.create(input.clone()).await.unwrap();
        let second = service.create(input).await.unwrap();
        assert_eq!(second.slug, "acme-1700000000");

        let shown = service
            .show(&OrganizationKey::parse("acme-1700000000"))
            .await
            .unwrap();
        assert_eq!(shown.id, second.id);

        let page = service.list(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }
}
