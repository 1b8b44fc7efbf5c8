//! bizdir domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Application use cases / business logic
//! - `tax_id`: Tax identifier checksum validation and generation
//! - `slug`: Unique, URL-safe organization slugs
//! - `query`: Pagination and sorting of collection listings
//! - `affiliation`: Set arithmetic for organization/person relationships
//! - `retry`: Bounded retry of transactional writes

pub mod affiliation;
pub mod error;
pub mod model;
pub mod ports;
pub mod query;
pub mod retry;
pub mod rules;
pub mod slug;
pub mod tax_id;
pub mod usecases;

pub use affiliation::{AffiliationOwner, SyncMode, SyncOutcome};
pub use error::{DirectoryError, DirectoryResult};
pub use model::*;
pub use ports::*;
pub use query::{ListDefaults, ListParams, Page, ResolvedQuery, SortDirection};
pub use retry::RetryPolicy;
pub use usecases::{AffiliationSync, DirectoryConfig, OrganizationService, PersonService};
