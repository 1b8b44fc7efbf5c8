//! Person use cases

use std::sync::Arc;

use crate::affiliation::{AffiliationOwner, SyncOutcome};
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::{
    EntityKind, NewPerson, Organization, OrganizationId, Person, PersonChanges, PersonDraft,
    PersonFilter, PersonId,
};
use crate::ports::{Clock, DirectoryStore, StoreError};
use crate::query::{self, ListParams, Page, PERSON_SORT_FIELDS};
use crate::rules::{self, MAX_PHONE_LEN, MAX_TEXT_LEN};

use super::affiliations::ensure_references;
use super::{AffiliationSync, DirectoryConfig};

fn validate(
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: Option<&str>,
) -> DirectoryResult<PersonDraft> {
    Ok(PersonDraft {
        first_name: rules::required_text("first_name", first_name, MAX_TEXT_LEN)?,
        last_name: rules::required_text("last_name", last_name, MAX_TEXT_LEN)?,
        email: rules::email("email", email)?,
        phone: rules::optional_text("phone", phone, MAX_PHONE_LEN)?,
    })
}

/// Person operations over a [`DirectoryStore`]
pub struct PersonService {
    store: Arc<dyn DirectoryStore>,
    clock: Arc<dyn Clock>,
    config: DirectoryConfig,
    affiliations: AffiliationSync,
}

impl PersonService {
    pub fn new(store: Arc<dyn DirectoryStore>, clock: Arc<dyn Clock>, config: DirectoryConfig) -> Self {
        let affiliations = AffiliationSync::new(store.clone(), config.retry);
        Self {
            store,
            clock,
            config,
            affiliations,
        }
    }

    /// List people, optionally only those affiliated with any of
    /// `filter.companies`
    pub async fn list(
        &self,
        params: &ListParams,
        filter: &PersonFilter,
    ) -> DirectoryResult<Page<Person>> {
        let query = query::resolve(params, &self.config.listing, PERSON_SORT_FIELDS)?;

        let filter = match &filter.companies {
            Some(companies) => {
                let ids = rules::id_set("companies", companies)?;
                ensure_references(self.store.as_ref(), EntityKind::Organization, &ids, "companies")
                    .await?;
                PersonFilter {
                    companies: Some(ids.into_iter().collect()),
                }
            }
            None => PersonFilter::default(),
        };

        self.store
            .list_people(&query, &filter)
            .await
            .map_err(|e| DirectoryError::from_store(e, "list_people", "companies"))
    }

    pub async fn get(&self, id: PersonId) -> DirectoryResult<Person> {
        self.store
            .get_person(id)
            .await
            .map_err(|e| DirectoryError::from_store(e, "get_person", "id"))?
            .ok_or_else(|| DirectoryError::not_found(EntityKind::Person, id))
    }

    /// Create a person and affiliate them with `input.companies` in the same
    /// transaction
    pub async fn create(&self, input: NewPerson) -> DirectoryResult<Person> {
        let draft = validate(
            &input.first_name,
            &input.last_name,
            &input.email,
            input.phone.as_deref(),
        )?;
        let companies = rules::id_set("companies", &input.companies)?;

        self.ensure_email_free(&draft.email, None).await?;
        ensure_references(
            self.store.as_ref(),
            EntityKind::Organization,
            &companies,
            "companies",
        )
        .await?;

        let store = self.store.as_ref();
        let now = self.clock.now();
        let draft = &draft;
        let companies = &companies;
        let person = self
            .config
            .retry
            .run("create_person", move || async move {
                store.insert_person(draft, companies, now).await
            })
            .await
            .map_err(|e| DirectoryError::from_store(e, "create_person", "companies"))?;

        tracing::info!(id = person.id, companies = companies.len(), "Person created");
        Ok(person)
    }

    /// Apply a partial update. A non-empty `companies` list replaces the
    /// person's affiliations; absent or empty leaves them alone.
    pub async fn update(&self, id: PersonId, changes: PersonChanges) -> DirectoryResult<Person> {
        let current = self.get(id).await?;

        let companies = match changes.companies.as_deref() {
            Some(ids) if !ids.is_empty() => Some(rules::id_set("companies", ids)?),
            _ => None,
        };
        let untouched = changes.first_name.is_none()
            && changes.last_name.is_none()
            && changes.email.is_none()
            && changes.phone.is_none()
            && companies.is_none();
        if untouched {
            return Ok(current);
        }

        let draft = validate(
            changes.first_name.as_deref().unwrap_or(&current.first_name),
            changes.last_name.as_deref().unwrap_or(&current.last_name),
            changes.email.as_deref().unwrap_or(&current.email),
            match &changes.phone {
                Some(phone) => Some(phone.as_str()),
                None => current.phone.as_deref(),
            },
        )?;

        if draft.email != current.email {
            self.ensure_email_free(&draft.email, Some(id)).await?;
        }
        if let Some(companies) = &companies {
            ensure_references(
                self.store.as_ref(),
                EntityKind::Organization,
                companies,
                "companies",
            )
            .await?;
        }

        let store = self.store.as_ref();
        let now = self.clock.now();
        let draft = &draft;
        let companies = companies.as_ref();
        let person = self
            .config
            .retry
            .run("update_person", move || async move {
                store.update_person(id, draft, companies, now).await
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => DirectoryError::not_found(EntityKind::Person, id),
                e => DirectoryError::from_store(e, "update_person", "companies"),
            })?;

        tracing::info!(id, "Person updated");
        Ok(person)
    }

    pub async fn delete(&self, id: PersonId) -> DirectoryResult<()> {
        let store = self.store.as_ref();
        let deleted = self
            .config
            .retry
            .run("delete_person", move || async move { store.delete_person(id).await })
            .await
            .map_err(|e| DirectoryError::from_store(e, "delete_person", "id"))?;

        if !deleted {
            return Err(DirectoryError::not_found(EntityKind::Person, id));
        }
        tracing::info!(id, "Person deleted");
        Ok(())
    }

    /// Organizations the person belongs to
    pub async fn companies(&self, id: PersonId) -> DirectoryResult<Vec<Organization>> {
        self.get(id).await?;
        self.store
            .person_organizations(id)
            .await
            .map_err(|e| DirectoryError::from_store(e, "person_organizations", "companies"))
    }

    pub async fn attach_companies(
        &self,
        id: PersonId,
        companies: &[OrganizationId],
    ) -> DirectoryResult<Vec<Organization>> {
        self.affiliations
            .attach(AffiliationOwner::Person(id), companies)
            .await?;
        self.companies(id).await
    }

    pub async fn detach_companies(
        &self,
        id: PersonId,
        companies: &[OrganizationId],
    ) -> DirectoryResult<SyncOutcome> {
        self.affiliations
            .detach(AffiliationOwner::Person(id), companies)
            .await
    }

    async fn ensure_email_free(&self, email: &str, exclude: Option<PersonId>) -> DirectoryResult<()> {
        let taken = self
            .store
            .email_exists(email, exclude)
            .await
            .map_err(|e| DirectoryError::from_store(e, "email_exists", "email"))?;
        if taken {
            return Err(DirectoryError::validation("email", "has already been taken"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::retry::RetryPolicy;
    use crate::usecases::testing::FakeStore;
    use std::collections::BTreeSet;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn company_ids(companies: &[Organization]) -> BTreeSet<OrganizationId> {
        companies.iter().map(|c| c.id).collect()
    }

    fn service() -> (Arc<FakeStore>, PersonService) {
        let store = Arc::new(FakeStore::default());
        {
            let mut orgs = store.organizations.lock().unwrap();
            for id in [1, 2] {
                orgs.insert(
                    id,
                    Organization {
                        id,
                        name: format!("Org {id}"),
                        slug: format!("org-{id}"),
                        tax_id: "5260250021".to_string(),
                        address: "ul. Prosta 1".to_string(),
                        city: "Warszawa".to_string(),
                        zip: "00-001".to_string(),
                        created_at: OffsetDateTime::UNIX_EPOCH,
                        updated_at: OffsetDateTime::UNIX_EPOCH,
                    },
                );
            }
        }
        let clock = Arc::new(FixedClock(OffsetDateTime::UNIX_EPOCH));
        let config = DirectoryConfig {
            retry: RetryPolicy::new(3, Duration::ZERO),
            ..DirectoryConfig::default()
        };
        (store.clone(), PersonService::new(store, clock, config))
    }

    fn jan(companies: Vec<i64>) -> NewPerson {
        NewPerson {
            first_name: "Jan".to_string(),
            last_name: "Kowalski".to_string(),
            email: "jan@example.com".to_string(),
            phone: Some("+48 600 700 800".to_string()),
            companies,
        }
    }

    #[tokio::test]
    async fn test_create_attaches_companies() {
        let (store, svc) = service();
        let person = svc.create(jan(vec![2, 1, 2])).await.unwrap();

        let companies = svc.companies(person.id).await.unwrap();
        assert_eq!(company_ids(&companies), BTreeSet::from([1, 2]));
        assert_eq!(store.members_of(1), BTreeSet::from([person.id]));
    }

    #[tokio::test]
    async fn test_create_with_unknown_company_writes_nothing() {
        let (store, svc) = service();
        let err = svc.create(jan(vec![1, 9])).await.unwrap_err();

        assert_eq!(err.to_string(), "companies: unknown ids: 9");
        assert!(store.people.lock().unwrap().is_empty());
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_validation_error() {
        let (_store, svc) = service();
        svc.create(jan(vec![])).await.unwrap();

        let err = svc.create(jan(vec![])).await.unwrap_err();
        assert_eq!(err.to_string(), "email: has already been taken");
    }

    #[tokio::test]
    async fn test_update_may_keep_own_email() {
        let (_store, svc) = service();
        let person = svc.create(jan(vec![])).await.unwrap();

        let updated = svc
            .update(
                person.id,
                PersonChanges {
                    email: Some("jan@example.com".to_string()),
                    last_name: Some("Nowak".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.last_name, "Nowak");
    }

    #[tokio::test]
    async fn test_update_rejects_email_of_someone_else() {
        let (store, svc) = service();
        store.seed_person(50, "anna@example.com");
        let person = svc.create(jan(vec![])).await.unwrap();

        let err = svc
            .update(
                person.id,
                PersonChanges {
                    email: Some("anna@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), 422);
    }

    #[tokio::test]
    async fn test_update_companies_replace_only_when_non_empty() {
        let (store, svc) = service();
        let person = svc.create(jan(vec![1])).await.unwrap();

        svc.update(
            person.id,
            PersonChanges {
                companies: Some(vec![]),
                phone: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(store.members_of(1), BTreeSet::from([person.id]));

        let updated = svc
            .update(
                person.id,
                PersonChanges {
                    companies: Some(vec![2]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.phone.is_none());
        assert!(store.members_of(1).is_empty());
        assert_eq!(store.members_of(2), BTreeSet::from([person.id]));
    }

    #[tokio::test]
    async fn test_list_filters_by_company() {
        let (_store, svc) = service();
        let first = svc.create(jan(vec![1])).await.unwrap();
        svc.create(NewPerson {
            first_name: "Anna".to_string(),
            last_name: "Nowak".to_string(),
            email: "anna@example.com".to_string(),
            phone: None,
            companies: vec![2],
        })
        .await
        .unwrap();

        let page = svc
            .list(
                &ListParams::default(),
                &PersonFilter {
                    companies: Some(vec![1]),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, first.id);

        let err = svc
            .list(
                &ListParams::default(),
                &PersonFilter {
                    companies: Some(vec![7]),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), 422);
    }

    #[tokio::test]
    async fn test_attach_and_detach_companies() {
        let (store, svc) = service();
        let person = svc.create(jan(vec![])).await.unwrap();

        let companies = svc.attach_companies(person.id, &[1, 2]).await.unwrap();
        assert_eq!(companies.len(), 2);

        let outcome = svc.detach_companies(person.id, &[2, 5]).await.unwrap();
        assert_eq!(outcome.detached, BTreeSet::from([2]));
        assert_eq!(store.members_of(2), BTreeSet::new());
    }

    #[tokio::test]
    async fn test_delete_person() {
        let (store, svc) = service();
        let person = svc.create(jan(vec![1])).await.unwrap();

        svc.delete(person.id).await.unwrap();

        assert!(store.members_of(1).is_empty());
        assert_eq!(svc.delete(person.id).await.unwrap_err().status(), 404);
    }
}
