//! SQLite directory store implementation

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bizdir_domain::affiliation;
use bizdir_domain::{
    AffiliationOwner, DirectoryStore, EntityKind, Organization, OrganizationDraft,
    OrganizationId, Page, Person, PersonDraft, PersonFilter, PersonId, ResolvedQuery, SlugIndex,
    StoreError, SyncMode, SyncOutcome,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::SqlitePool;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const ORGANIZATION_COLUMNS: &str =
    "id, name, slug, tax_id, address, city, zip, created_at, updated_at";
const PERSON_COLUMNS: &str = "id, first_name, last_name, email, phone, created_at, updated_at";

type OrganizationRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);
type PersonRow = (i64, String, String, String, Option<String>, String, String);

/// Row counts reported by `doctor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub organizations: i64,
    pub people: i64,
    pub affiliations: i64,
}

/// SQLite-backed directory store
pub struct SqliteDirectoryStore {
    pool: SqlitePool,
}

impl SqliteDirectoryStore {
    /// Open (creating if needed) the database at `db_path` and apply the schema
    pub async fn new(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::debug!(path = %db_path.display(), "SQLite directory store opened");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(map_sqlx_error)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                tax_id TEXT NOT NULL,
                address TEXT NOT NULL,
                city TEXT NOT NULL,
                zip TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS people (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS affiliations (
                organization_id INTEGER NOT NULL
                    REFERENCES organizations(id) ON DELETE CASCADE,
                person_id INTEGER NOT NULL
                    REFERENCES people(id) ON DELETE CASCADE,
                PRIMARY KEY (organization_id, person_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // Lookups from the person side
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_affiliations_person
            ON affiliations(person_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    /// Count rows in every table; doubles as a connectivity check
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (organizations, people, affiliations): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM organizations),
                (SELECT COUNT(*) FROM people),
                (SELECT COUNT(*) FROM affiliations)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(StoreStats {
            organizations,
            people,
            affiliations,
        })
    }
}

/// Classify a driver error into the store taxonomy
fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            // "UNIQUE constraint failed: organizations.slug"
            let field = db
                .message()
                .rsplit('.')
                .next()
                .unwrap_or("value")
                .trim()
                .to_string();
            return StoreError::UniqueViolation { field };
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingReference { ids: Vec::new() };
        }
        // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes
        let primary = db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| code & 0xff);
        if matches!(primary, Some(5 | 6)) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    if matches!(e, sqlx::Error::PoolTimedOut) {
        return StoreError::Conflict(e.to_string());
    }
    StoreError::Database(e.to_string())
}

fn format_time(at: OffsetDateTime) -> Result<String, StoreError> {
    at.format(&Rfc3339)
        .map_err(|e| StoreError::Database(format!("Invalid timestamp: {}", e)))
}

fn parse_time(raw: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| StoreError::Database(format!("Corrupt timestamp '{}': {}", raw, e)))
}

fn organization_from_row(row: OrganizationRow) -> Result<Organization, StoreError> {
    let (id, name, slug, tax_id, address, city, zip, created_at, updated_at) = row;
    Ok(Organization {
        id,
        name,
        slug,
        tax_id,
        address,
        city,
        zip,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn person_from_row(row: PersonRow) -> Result<Person, StoreError> {
    let (id, first_name, last_name, email, phone, created_at, updated_at) = row;
    Ok(Person {
        id,
        first_name,
        last_name,
        email,
        phone,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

/// `ORDER BY` / `LIMIT` tail for a resolved query. `order_by` has been
/// checked against an allow-list, so splicing it is safe.
fn order_and_page(query: &ResolvedQuery) -> String {
    let mut sql = format!(" ORDER BY {} {}", query.order_by, query.order_dir.as_sql());
    if query.order_by != "id" {
        sql.push_str(", id ASC");
    }
    if !query.is_unbounded() {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", query.take, query.offset()));
    }
    sql
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Columns of the affiliation table as (owner side, related side)
fn affiliation_columns(owner: AffiliationOwner) -> (&'static str, &'static str) {
    match owner {
        AffiliationOwner::Organization(_) => ("organization_id", "person_id"),
        AffiliationOwner::Person(_) => ("person_id", "organization_id"),
    }
}

async fn missing_in(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    ids: &BTreeSet<i64>,
) -> Result<BTreeSet<i64>, StoreError> {
    if ids.is_empty() {
        return Ok(BTreeSet::new());
    }

    let sql = format!(
        "SELECT id FROM {} WHERE id IN ({})",
        kind.table(),
        placeholders(ids.len())
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let found: BTreeSet<i64> = query
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .collect();

    Ok(ids.difference(&found).copied().collect())
}

async fn related_ids(
    conn: &mut SqliteConnection,
    owner: AffiliationOwner,
) -> Result<BTreeSet<i64>, StoreError> {
    let (owner_column, related_column) = affiliation_columns(owner);
    let sql = format!("SELECT {related_column} FROM affiliations WHERE {owner_column} = ?");
    let ids = sqlx::query_scalar::<_, i64>(&sql)
        .bind(owner.id())
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(ids.into_iter().collect())
}

/// Plan and apply an affiliation change on an open transaction
async fn apply_sync(
    conn: &mut SqliteConnection,
    owner: AffiliationOwner,
    ids: &BTreeSet<i64>,
    mode: SyncMode,
) -> Result<SyncOutcome, StoreError> {
    if mode.adds_pairs() {
        let missing = missing_in(conn, owner.related_kind(), ids).await?;
        if !missing.is_empty() {
            return Err(StoreError::MissingReference {
                ids: missing.into_iter().collect(),
            });
        }
    }

    let current = related_ids(conn, owner).await?;
    let outcome = affiliation::plan(&current, ids, mode);

    for related in &outcome.detached {
        let (organization_id, person_id) = owner.pair(*related);
        sqlx::query("DELETE FROM affiliations WHERE organization_id = ? AND person_id = ?")
            .bind(organization_id)
            .bind(person_id)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
    }
    for related in &outcome.attached {
        let (organization_id, person_id) = owner.pair(*related);
        sqlx::query("INSERT INTO affiliations (organization_id, person_id) VALUES (?, ?)")
            .bind(organization_id)
            .bind(person_id)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
    }

    Ok(outcome)
}

async fn fetch_organization(
    conn: &mut SqliteConnection,
    id: OrganizationId,
) -> Result<Option<Organization>, StoreError> {
    let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = ?");
    let row: Option<OrganizationRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    row.map(organization_from_row).transpose()
}

async fn fetch_person(
    conn: &mut SqliteConnection,
    id: PersonId,
) -> Result<Option<Person>, StoreError> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?");
    let row: Option<PersonRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    row.map(person_from_row).transpose()
}

#[async_trait]
impl SlugIndex for SqliteDirectoryStore {
    async fn slug_exists(
        &self,
        slug: &str,
        exclude: Option<OrganizationId>,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE slug = ? AND (? IS NULL OR id <> ?))",
        )
        .bind(slug)
        .bind(exclude)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl DirectoryStore for SqliteDirectoryStore {
    async fn insert_organization(
        &self,
        draft: &OrganizationDraft,
        now: OffsetDateTime,
    ) -> Result<Organization, StoreError> {
        let now_str = format_time(now)?;

        let result = sqlx::query(
            r#"
            INSERT INTO organizations
            (name, slug, tax_id, address, city, zip, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.tax_id)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(&draft.zip)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Organization {
            id: result.last_insert_rowid(),
            name: draft.name.clone(),
            slug: draft.slug.clone(),
            tax_id: draft.tax_id.clone(),
            address: draft.address.clone(),
            city: draft.city.clone(),
            zip: draft.zip.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_organization(
        &self,
        id: OrganizationId,
        draft: &OrganizationDraft,
        now: OffsetDateTime,
    ) -> Result<Organization, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = ?, slug = ?, tax_id = ?, address = ?, city = ?, zip = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.tax_id)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(&draft.zip)
        .bind(format_time(now)?)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let org = fetch_organization(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(org)
    }

    async fn get_organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        fetch_organization(&mut conn, id).await
    }

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, StoreError> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE slug = ?");
        let row: Option<OrganizationRow> = sqlx::query_as(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(organization_from_row).transpose()
    }

    async fn delete_organization(&self, id: OrganizationId) -> Result<bool, StoreError> {
        // affiliations go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_organizations(
        &self,
        query: &ResolvedQuery,
    ) -> Result<Page<Organization>, StoreError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations{}",
            order_and_page(query)
        );
        let rows: Vec<OrganizationRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let data = rows
            .into_iter()
            .map(organization_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, total.max(0) as u64, query))
    }

    async fn insert_person(
        &self,
        draft: &PersonDraft,
        companies: &BTreeSet<OrganizationId>,
        now: OffsetDateTime,
    ) -> Result<Person, StoreError> {
        let now_str = format_time(now)?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            INSERT INTO people (first_name, last_name, email, phone, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let id = result.last_insert_rowid();

        apply_sync(&mut tx, AffiliationOwner::Person(id), companies, SyncMode::Attach).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Person {
            id,
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_person(
        &self,
        id: PersonId,
        draft: &PersonDraft,
        companies: Option<&BTreeSet<OrganizationId>>,
        now: OffsetDateTime,
    ) -> Result<Person, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE people
            SET first_name = ?, last_name = ?, email = ?, phone = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(format_time(now)?)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        if let Some(companies) = companies {
            apply_sync(&mut tx, AffiliationOwner::Person(id), companies, SyncMode::Replace).await?;
        }

        let person = fetch_person(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(person)
    }

    async fn get_person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        fetch_person(&mut conn, id).await
    }

    async fn delete_person(&self, id: PersonId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM people WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_people(
        &self,
        query: &ResolvedQuery,
        filter: &PersonFilter,
    ) -> Result<Page<Person>, StoreError> {
        let (condition, ids): (String, &[i64]) = match &filter.companies {
            Some(companies) => (
                format!(
                    " WHERE id IN (SELECT person_id FROM affiliations WHERE organization_id IN ({}))",
                    placeholders(companies.len())
                ),
                companies.as_slice(),
            ),
            None => (String::new(), &[]),
        };

        let count_sql = format!("SELECT COUNT(*) FROM people{condition}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for id in ids {
            count = count.bind(id);
        }
        let total = count.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM people{condition}{}",
            order_and_page(query)
        );
        let mut rows = sqlx::query_as::<_, PersonRow>(&sql);
        for id in ids {
            rows = rows.bind(id);
        }
        let data = rows
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(person_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(data, total.max(0) as u64, query))
    }

    async fn email_exists(
        &self,
        email: &str,
        exclude: Option<PersonId>,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM people WHERE email = ? AND (? IS NULL OR id <> ?))",
        )
        .bind(email)
        .bind(exclude)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn missing_ids(
        &self,
        kind: EntityKind,
        ids: &BTreeSet<i64>,
    ) -> Result<BTreeSet<i64>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        missing_in(&mut conn, kind, ids).await
    }

    async fn sync_affiliations(
        &self,
        owner: AffiliationOwner,
        ids: &BTreeSet<i64>,
        mode: SyncMode,
    ) -> Result<SyncOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let owner_missing = missing_in(&mut tx, owner.kind(), &BTreeSet::from([owner.id()])).await?;
        if !owner_missing.is_empty() {
            return Err(StoreError::NotFound(owner.id().to_string()));
        }

        let outcome = apply_sync(&mut tx, owner, ids, mode).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::debug!(
            owner = ?owner,
            attached = outcome.attached.len(),
            detached = outcome.detached.len(),
            "Affiliation transaction committed"
        );
        Ok(outcome)
    }

    async fn organization_members(
        &self,
        id: OrganizationId,
    ) -> Result<Vec<Person>, StoreError> {
        let rows: Vec<PersonRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.first_name, p.last_name, p.email, p.phone, p.created_at, p.updated_at
            FROM people p
            JOIN affiliations a ON a.person_id = p.id
            WHERE a.organization_id = ?
            ORDER BY p.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(person_from_row).collect()
    }

    async fn person_organizations(&self, id: PersonId) -> Result<Vec<Organization>, StoreError> {
        let rows: Vec<OrganizationRow> = sqlx::query_as(
            r#"
            SELECT o.id, o.name, o.slug, o.tax_id, o.address, o.city, o.zip,
                   o.created_at, o.updated_at
            FROM organizations o
            JOIN affiliations a ON a.organization_id = o.id
            WHERE a.person_id = ?
            ORDER BY o.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(organization_from_row).collect()
    }
}
