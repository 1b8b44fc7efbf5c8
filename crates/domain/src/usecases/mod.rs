//! Application use cases / business logic

pub mod affiliations;
pub mod organizations;
pub mod people;

pub use affiliations::AffiliationSync;
pub use organizations::OrganizationService;
pub use people::PersonService;

use crate::query::ListDefaults;
use crate::retry::RetryPolicy;

/// Settings shared by the directory use cases
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// Fallbacks for absent listing parameters
    pub listing: ListDefaults,
    /// Attempt budget for write transactions
    pub retry: RetryPolicy,
}
