//! Organization use cases: listing, lookup, create/update with slug
//! maintenance, deletion and membership management

use std::sync::Arc;

use crate::affiliation::{AffiliationOwner, SyncOutcome};
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::{
    EntityKind, NewOrganization, Organization, OrganizationChanges, OrganizationDraft,
    OrganizationId, OrganizationKey, Person,
};
use crate::ports::{Clock, DirectoryStore, StoreError};
use crate::query::{self, ListParams, Page, ORGANIZATION_SORT_FIELDS};
use crate::rules::{self, MAX_TEXT_LEN};
use crate::slug::SlugGenerator;

use super::{AffiliationSync, DirectoryConfig};

/// Validated organization columns minus the slug
#[derive(Debug, Clone)]
struct OrganizationFields {
    name: String,
    tax_id: String,
    address: String,
    city: String,
    zip: String,
}

impl OrganizationFields {
    fn validate(input: &NewOrganization) -> DirectoryResult<Self> {
        Ok(Self {
            name: rules::required_text("name", &input.name, MAX_TEXT_LEN)?,
            tax_id: rules::tax_id("tax_id", &input.tax_id)?,
            address: rules::required_text("address", &input.address, MAX_TEXT_LEN)?,
            city: rules::required_text("city", &input.city, MAX_TEXT_LEN)?,
            zip: rules::required_text("zip", &input.zip, MAX_TEXT_LEN)?,
        })
    }

    /// Overlay `changes` on `current`, validating every resulting field
    fn merge(current: &Organization, changes: &OrganizationChanges) -> DirectoryResult<Self> {
        let pick = |change: &Option<String>, current: &str| {
            change.clone().unwrap_or_else(|| current.to_string())
        };
        Self::validate(&NewOrganization {
            name: pick(&changes.name, &current.name),
            tax_id: pick(&changes.tax_id, &current.tax_id),
            address: pick(&changes.address, &current.address),
            city: pick(&changes.city, &current.city),
            zip: pick(&changes.zip, &current.zip),
        })
    }

    fn draft(&self, slug: String) -> OrganizationDraft {
        OrganizationDraft {
            name: self.name.clone(),
            slug,
            tax_id: self.tax_id.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            zip: self.zip.clone(),
        }
    }
}

/// Organization operations over a [`DirectoryStore`]
pub struct OrganizationService {
    store: Arc<dyn DirectoryStore>,
    clock: Arc<dyn Clock>,
    config: DirectoryConfig,
    affiliations: AffiliationSync,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn DirectoryStore>, clock: Arc<dyn Clock>, config: DirectoryConfig) -> Self {
        let affiliations = AffiliationSync::new(store.clone(), config.retry);
        Self {
            store,
            clock,
            config,
            affiliations,
        }
    }

    pub async fn list(&self, params: &ListParams) -> DirectoryResult<Page<Organization>> {
        let query = query::resolve(params, &self.config.listing, ORGANIZATION_SORT_FIELDS)?;
        self.store
            .list_organizations(&query)
            .await
            .map_err(|e| DirectoryError::from_store(e, "list_organizations", "id"))
    }

    /// Look an organization up by id or slug.
    ///
    /// A numeric key that matches no id is retried as a slug, since a name
    /// made only of digits produces an all-digit slug.
    pub async fn show(&self, key: &OrganizationKey) -> DirectoryResult<Organization> {
        let found = match key {
            OrganizationKey::Id(id) => match self.find(*id).await? {
                Some(org) => Some(org),
                None => self.find_by_slug(&id.to_string()).await?,
            },
            OrganizationKey::Slug(slug) => self.find_by_slug(slug).await?,
        };

        found.ok_or_else(|| {
            let key = match key {
                OrganizationKey::Id(id) => id.to_string(),
                OrganizationKey::Slug(slug) => slug.clone(),
            };
            DirectoryError::not_found(EntityKind::Organization, key)
        })
    }

    pub async fn get(&self, id: OrganizationId) -> DirectoryResult<Organization> {
        self.find(id)
            .await?
            .ok_or_else(|| DirectoryError::not_found(EntityKind::Organization, id))
    }

    pub async fn create(&self, input: NewOrganization) -> DirectoryResult<Organization> {
        let fields = OrganizationFields::validate(&input)?;
        let org = self.save(None, &fields, None).await?;
        tracing::info!(id = org.id, slug = %org.slug, "Organization created");
        Ok(org)
    }

    /// Apply a partial update. The slug is regenerated only when the name
    /// actually changes.
    pub async fn update(
        &self,
        id: OrganizationId,
        changes: OrganizationChanges,
    ) -> DirectoryResult<Organization> {
        let current = self.get(id).await?;
        if changes.is_empty() {
            return Ok(current);
        }

        let fields = OrganizationFields::merge(&current, &changes)?;
        let keep_slug = (fields.name == current.name).then_some(current.slug.as_str());
        let org = self.save(Some(id), &fields, keep_slug).await?;
        tracing::info!(id = org.id, slug = %org.slug, "Organization updated");
        Ok(org)
    }

    /// Delete an organization; its affiliations go with it
    pub async fn delete(&self, id: OrganizationId) -> DirectoryResult<()> {
        let store = self.store.as_ref();
        let deleted = self
            .config
            .retry
            .run("delete_organization", move || async move {
                store.delete_organization(id).await
            })
            .await
            .map_err(|e| DirectoryError::from_store(e, "delete_organization", "id"))?;

        if !deleted {
            return Err(DirectoryError::not_found(EntityKind::Organization, id));
        }
        tracing::info!(id, "Organization deleted");
        Ok(())
    }

    pub async fn members(&self, id: OrganizationId) -> DirectoryResult<Vec<Person>> {
        self.get(id).await?;
        self.store
            .organization_members(id)
            .await
            .map_err(|e| DirectoryError::from_store(e, "organization_members", "people"))
    }

    /// Affiliate people with the organization, keeping existing members
    pub async fn attach_people(
        &self,
        id: OrganizationId,
        people: &[i64],
    ) -> DirectoryResult<Vec<Person>> {
        self.affiliations
            .attach(AffiliationOwner::Organization(id), people)
            .await?;
        self.members(id).await
    }

    /// Make the organization's members exactly `people`
    pub async fn replace_people(
        &self,
        id: OrganizationId,
        people: &[i64],
    ) -> DirectoryResult<Vec<Person>> {
        self.affiliations
            .replace(AffiliationOwner::Organization(id), people)
            .await?;
        self.members(id).await
    }

    pub async fn detach_people(
        &self,
        id: OrganizationId,
        people: &[i64],
    ) -> DirectoryResult<SyncOutcome> {
        self.affiliations
            .detach(AffiliationOwner::Organization(id), people)
            .await
    }

    async fn find(&self, id: OrganizationId) -> DirectoryResult<Option<Organization>> {
        self.store
            .get_organization(id)
            .await
            .map_err(|e| DirectoryError::from_store(e, "get_organization", "id"))
    }

    async fn find_by_slug(&self, slug: &str) -> DirectoryResult<Option<Organization>> {
        self.store
            .find_organization_by_slug(slug)
            .await
            .map_err(|e| DirectoryError::from_store(e, "find_organization_by_slug", "slug"))
    }

    /// Insert (`id` is `None`) or update inside the retry budget.
    ///
    /// With `keep_slug` unset a slug is derived from the name. If a racing
    /// writer claims it between the check and the write, the slug is derived
    /// once more before the violation is reported.
    async fn save(
        &self,
        id: Option<OrganizationId>,
        fields: &OrganizationFields,
        keep_slug: Option<&str>,
    ) -> DirectoryResult<Organization> {
        let operation = if id.is_some() {
            "update_organization"
        } else {
            "create_organization"
        };
        let store = self.store.as_ref();
        let clock = self.clock.as_ref();

        self.config
            .retry
            .run(operation, move || async move {
                let mut regenerated = false;
                loop {
                    let slug = match keep_slug {
                        Some(slug) => slug.to_string(),
                        None => {
                            SlugGenerator::new(store, clock)
                                .generate(&fields.name, id)
                                .await?
                        }
                    };
                    let draft = fields.draft(slug);
                    let now = clock.now();
                    let result = match id {
                        Some(id) => store.update_organization(id, &draft, now).await,
                        None => store.insert_organization(&draft, now).await,
                    };

                    match result {
                        Err(StoreError::UniqueViolation { field })
                            if field == "slug" && keep_slug.is_none() && !regenerated =>
                        {
                            tracing::debug!(slug = %draft.slug, "Slug claimed concurrently, regenerating");
                            regenerated = true;
                        }
                        other => return other,
                    }
                }
            })
            .await
            .map_err(|e| match (e, id) {
                (StoreError::NotFound(_), Some(id)) => {
                    DirectoryError::not_found(EntityKind::Organization, id)
                }
                (e, _) => DirectoryError::from_store(e, operation, "id"),
            })
    }
}
