//! Pagination and ordering of collection queries

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Sortable organization columns
pub const ORGANIZATION_SORT_FIELDS: &[&str] = &[
    "id",
    "name",
    "slug",
    "tax_id",
    "address",
    "city",
    "zip",
    "created_at",
    "updated_at",
];

/// Sortable person columns
pub const PERSON_SORT_FIELDS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(DirectoryError::validation(
                "order_dir",
                format!("must be one of asc, desc (got '{other}')"),
            )),
        }
    }
}

/// Raw listing parameters as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page size; `Some(0)` asks for the whole collection
    pub take: Option<u32>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    /// 1-based page number
    pub page: Option<u32>,
}

/// Configured fallbacks for absent parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDefaults {
    pub take: u32,
    pub order_by: String,
    pub order_dir: SortDirection,
}

impl Default for ListDefaults {
    fn default() -> Self {
        Self {
            take: 10,
            order_by: "id".to_string(),
            order_dir: SortDirection::Asc,
        }
    }
}

/// A bounded, validated query shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    /// Page size; 0 means unbounded
    pub take: u32,
    /// Always one of the allowed fields, safe to splice into SQL
    pub order_by: String,
    pub order_dir: SortDirection,
    pub page: u32,
}

impl ResolvedQuery {
    pub fn is_unbounded(&self) -> bool {
        self.take == 0
    }

    /// Rows to skip before the requested page
    pub fn offset(&self) -> u64 {
        if self.is_unbounded() {
            0
        } else {
            u64::from(self.page.saturating_sub(1)) * u64::from(self.take)
        }
    }
}

/// Resolve caller parameters against defaults and the allowed sort fields
pub fn resolve(
    params: &ListParams,
    defaults: &ListDefaults,
    allowed_order_fields: &[&str],
) -> Result<ResolvedQuery, DirectoryError> {
    let take = params.take.unwrap_or(defaults.take);

    let order_by = params
        .order_by
        .as_deref()
        .map(str::trim)
        .unwrap_or(defaults.order_by.as_str());
    if !allowed_order_fields.contains(&order_by) {
        return Err(DirectoryError::validation(
            "order_by",
            format!(
                "must be one of {} (got '{order_by}')",
                allowed_order_fields.join(", ")
            ),
        ));
    }

    let order_dir = match params.order_dir.as_deref() {
        Some(raw) => raw.trim().parse()?,
        None => defaults.order_dir,
    };

    let page = match params.page {
        Some(0) => {
            return Err(DirectoryError::validation("page", "must be at least 1"));
        }
        Some(page) if take > 0 => page,
        _ => 1,
    };

    Ok(ResolvedQuery {
        take,
        order_by: order_by.to_string(),
        order_dir,
        page,
    })
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Rows in the whole (filtered) collection
    pub total: u64,
    pub page: u32,
    pub per_page: u64,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, query: &ResolvedQuery) -> Self {
        if query.is_unbounded() {
            return Self {
                data,
                total,
                page: 1,
                per_page: total,
                last_page: 1,
            };
        }

        let per_page = u64::from(query.take);
        let last_page = total.div_ceil(per_page).max(1);
        Self {
            data,
            total,
            page: query.page,
            per_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}
