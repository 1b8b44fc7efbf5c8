//! Domain models and value objects

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// System-assigned organization identifier
pub type OrganizationId = i64;

/// System-assigned person identifier
pub type PersonId = i64;

/// A business listed in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Unique, URL-safe identifier derived from `name`
    pub slug: String,
    /// 10-digit checksummed tax identifier
    pub tax_id: String,
    pub address: String,
    pub city: String,
    /// Postal code
    pub zip: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A person who can be affiliated with any number of organizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    /// Globally unique
    pub email: String,
    pub phone: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Input for creating an organization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub city: String,
    pub zip: String,
}

/// Partial update of an organization; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

impl OrganizationChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tax_id.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.zip.is_none()
    }
}

/// Input for creating a person
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Organizations to affiliate the new person with
    #[serde(default)]
    pub companies: Vec<OrganizationId>,
}

/// Partial update of a person
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Full replacement set of organizations. Absent or empty keeps the
    /// current affiliations.
    pub companies: Option<Vec<OrganizationId>>,
}

/// Validated organization columns, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationDraft {
    pub name: String,
    pub slug: String,
    pub tax_id: String,
    pub address: String,
    pub city: String,
    pub zip: String,
}

/// Validated person columns, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Entity collections known to the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Person,
}

impl EntityKind {
    /// Table backing this collection
    pub fn table(self) -> &'static str {
        match self {
            Self::Organization => "organizations",
            Self::Person => "people",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Person => "Person",
        }
    }
}

/// Lookup key accepted by "show organization"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationKey {
    Id(OrganizationId),
    Slug(String),
}

impl OrganizationKey {
    /// Interpret a path segment: all-digit values are ids, anything else a slug
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<OrganizationId>() {
            Ok(id) if !raw.starts_with(['+', '-']) => Self::Id(id),
            _ => Self::Slug(raw.to_string()),
        }
    }
}

/// Filter for listing people
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonFilter {
    /// Only people affiliated with at least one of these organizations
    pub companies: Option<Vec<OrganizationId>>,
}
