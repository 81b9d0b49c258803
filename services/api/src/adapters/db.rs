//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapters: the concrete implementations
//! of the `CatalogStore` and `UserStore` ports from the `core` crate. They
//! handle all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use study_shelf_core::domain::{
    CatalogFilter, CatalogItem, CatalogPatch, CatalogSummary, Category, CategoryTrend, DateRange,
    DownloadEntry, NewCatalogItem, Price, TopicTrend, UserRecord, UserStats,
};
use study_shelf_core::ports::{CatalogStore, PortError, PortResult, UserStore};
use uuid::Uuid;

const MATERIAL_COLUMNS: &str = "id, title, topics, category, description, keywords, price, \
     content_ref, file_name, file_size_bytes, mime_type, downloads, purchases, revenue, created_at";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(sqlx::FromRow)]
struct MaterialRecord {
    id: Uuid,
    title: String,
    topics: Vec<String>,
    category: String,
    description: Option<String>,
    keywords: Vec<String>,
    price: String,
    content_ref: Uuid,
    file_name: String,
    file_size_bytes: i64,
    mime_type: String,
    downloads: i64,
    purchases: i64,
    revenue: f64,
    created_at: DateTime<Utc>,
}

impl MaterialRecord {
    fn to_domain(self) -> PortResult<CatalogItem> {
        let category: Category = self
            .category
            .parse()
            .map_err(|e| PortError::Unexpected(format!("Stored category is invalid: {e}")))?;
        let price = Price::parse(&self.price)
            .map_err(|e| PortError::Unexpected(format!("Stored price is invalid: {e}")))?;
        Ok(CatalogItem {
            id: self.id,
            title: self.title,
            topics: self.topics,
            category,
            description: self.description,
            keywords: self.keywords,
            price,
            content_ref: self.content_ref,
            file_name: self.file_name,
            file_size_bytes: self.file_size_bytes,
            mime_type: self.mime_type,
            downloads: self.downloads,
            purchases: self.purchases,
            revenue: self.revenue,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    external_id: i64,
    name: String,
    level: Option<String>,
    last_active_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn to_domain(self, download_history: Vec<DownloadEntry>) -> UserRecord {
        UserRecord {
            id: self.id,
            external_id: self.external_id,
            name: self.name,
            level: self.level,
            last_active_at: self.last_active_at,
            created_at: self.created_at,
            download_history,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    content_id: Uuid,
    title: String,
    category: String,
    price: String,
    downloaded_at: DateTime<Utc>,
}

impl HistoryRow {
    fn to_domain(self) -> PortResult<DownloadEntry> {
        let category: Category = self
            .category
            .parse()
            .map_err(|e| PortError::Unexpected(format!("Stored category is invalid: {e}")))?;
        let price = Price::parse(&self.price)
            .map_err(|e| PortError::Unexpected(format!("Stored price is invalid: {e}")))?;
        Ok(DownloadEntry {
            content_id: self.content_id,
            title: self.title,
            category,
            price,
            downloaded_at: self.downloaded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    total_materials: i64,
    free_materials: i64,
    total_downloads: i64,
    total_purchases: i64,
    total_revenue: f64,
}

#[derive(sqlx::FromRow)]
struct TopicTrendRow {
    topic: String,
    materials: i64,
    downloads: i64,
}

#[derive(sqlx::FromRow)]
struct CategoryTrendRow {
    category: String,
    materials: i64,
    downloads: i64,
    revenue: f64,
}

#[derive(sqlx::FromRow)]
struct UserStatsRow {
    total_users: i64,
    active_last_week: i64,
    total_downloads: i64,
}

//=========================================================================================
// Catalog adapter
//=========================================================================================

/// A database adapter that implements the `CatalogStore` port.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Creates a new `PgCatalogStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn records_to_domain(records: Vec<MaterialRecord>) -> PortResult<Vec<CatalogItem>> {
        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert(&self, item: NewCatalogItem) -> PortResult<CatalogItem> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "INSERT INTO materials \
             (id, title, topics, category, description, keywords, price, content_ref, \
              file_name, file_size_bytes, mime_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&item.title)
        .bind(&item.topics)
        .bind(item.category.label())
        .bind(&item.description)
        .bind(&item.keywords)
        .bind(item.price.to_string())
        .bind(item.content_ref)
        .bind(&item.file_name)
        .bind(item.file_size_bytes)
        .bind(&item.mime_type)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn find_by_id(&self, id: Uuid) -> PortResult<CatalogItem> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || format!("Material {} not found", id)))?;
        record.to_domain()
    }

    async fn list(&self, filter: CatalogFilter) -> PortResult<Vec<CatalogItem>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE 1=1"));
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.label());
        }
        if let Some(topic) = &filter.topic {
            qb.push(" AND EXISTS (SELECT 1 FROM unnest(topics) AS t(v) WHERE v ILIKE ")
                .push_bind(format!("%{topic}%"))
                .push(")");
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR COALESCE(description, '') ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR EXISTS (SELECT 1 FROM unnest(keywords) AS k(v) WHERE v ILIKE ")
                .push_bind(pattern)
                .push("))");
        }
        qb.push(" ORDER BY created_at DESC");

        let records = qb
            .build_query_as::<MaterialRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Self::records_to_domain(records)
    }

    async fn list_recent(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> PortResult<Vec<CatalogItem>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE 1=1"));
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category.label());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let records = qb
            .build_query_as::<MaterialRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Self::records_to_domain(records)
    }

    async fn find_matching(
        &self,
        tokens: &[String],
        category: Option<Category>,
        loose: bool,
    ) -> PortResult<Vec<CatalogItem>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE ("));
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            // Tokens are lower-cased alphanumeric words or known keyword
            // phrases, so they are safe inside both pattern kinds.
            if loose {
                let pattern = format!("%{token}%");
                qb.push("(title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR category ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR COALESCE(description, '') ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR EXISTS (SELECT 1 FROM unnest(topics) AS t(v) WHERE v ILIKE ")
                    .push_bind(pattern.clone())
                    .push(") OR EXISTS (SELECT 1 FROM unnest(keywords) AS k(v) WHERE v ILIKE ")
                    .push_bind(pattern)
                    .push("))");
            } else {
                let pattern = format!(r"\m{token}\M");
                qb.push("(title ~* ")
                    .push_bind(pattern.clone())
                    .push(" OR category ~* ")
                    .push_bind(pattern.clone())
                    .push(" OR COALESCE(description, '') ~* ")
                    .push_bind(pattern.clone())
                    .push(" OR EXISTS (SELECT 1 FROM unnest(topics) AS t(v) WHERE v ~* ")
                    .push_bind(pattern.clone())
                    .push(") OR EXISTS (SELECT 1 FROM unnest(keywords) AS k(v) WHERE v ~* ")
                    .push_bind(pattern)
                    .push("))");
            }
        }
        qb.push(")");
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category.label());
        }
        // Natural insertion order, so equal relevance scores stay stable.
        qb.push(" ORDER BY created_at ASC, id ASC");

        let records = qb
            .build_query_as::<MaterialRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Self::records_to_domain(records)
    }

    async fn update(&self, id: Uuid, patch: CatalogPatch) -> PortResult<CatalogItem> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "UPDATE materials SET \
               title = COALESCE($2, title), \
               topics = COALESCE($3, topics), \
               category = COALESCE($4, category), \
               description = COALESCE($5, description), \
               keywords = COALESCE($6, keywords), \
               price = COALESCE($7, price) \
             WHERE id = $1 \
             RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.topics)
        .bind(patch.category.map(|c| c.label().to_string()))
        .bind(patch.description)
        .bind(patch.keywords)
        .bind(patch.price.map(|p| p.to_string()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || format!("Material {} not found", id)))?;
        record.to_domain()
    }

    async fn delete(&self, id: Uuid) -> PortResult<CatalogItem> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "DELETE FROM materials WHERE id = $1 RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Material {} not found", id)))?;
        record.to_domain()
    }

    async fn increment_download(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE materials SET downloads = downloads + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Material {} not found", id)));
        }
        Ok(())
    }

    async fn record_purchase(&self, id: Uuid, amount: f64) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE materials SET purchases = purchases + 1, revenue = revenue + $2 WHERE id = $1",
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Material {} not found", id)));
        }
        Ok(())
    }

    async fn analytics_summary(&self) -> PortResult<CatalogSummary> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT COUNT(*)::BIGINT AS total_materials, \
                    (COUNT(*) FILTER (WHERE price ILIKE 'free'))::BIGINT AS free_materials, \
                    COALESCE(SUM(downloads), 0)::BIGINT AS total_downloads, \
                    COALESCE(SUM(purchases), 0)::BIGINT AS total_purchases, \
                    COALESCE(SUM(revenue), 0)::DOUBLE PRECISION AS total_revenue \
             FROM materials",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(CatalogSummary {
            total_materials: row.total_materials,
            free_materials: row.free_materials,
            paid_materials: row.total_materials - row.free_materials,
            total_downloads: row.total_downloads,
            total_purchases: row.total_purchases,
            total_revenue: row.total_revenue,
        })
    }

    async fn topic_trends(&self, range: DateRange) -> PortResult<Vec<TopicTrend>> {
        let rows = sqlx::query_as::<_, TopicTrendRow>(
            "SELECT t.topic AS topic, COUNT(*)::BIGINT AS materials, \
                    COALESCE(SUM(m.downloads), 0)::BIGINT AS downloads \
             FROM materials m CROSS JOIN LATERAL unnest(m.topics) AS t(topic) \
             WHERE ($1::TIMESTAMPTZ IS NULL OR m.created_at >= $1) \
               AND ($2::TIMESTAMPTZ IS NULL OR m.created_at <= $2) \
             GROUP BY t.topic \
             ORDER BY downloads DESC, materials DESC, t.topic ASC",
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|r| TopicTrend {
                topic: r.topic,
                materials: r.materials,
                downloads: r.downloads,
            })
            .collect())
    }

    async fn category_trends(&self, range: DateRange) -> PortResult<Vec<CategoryTrend>> {
        let rows = sqlx::query_as::<_, CategoryTrendRow>(
            "SELECT category, COUNT(*)::BIGINT AS materials, \
                    COALESCE(SUM(downloads), 0)::BIGINT AS downloads, \
                    COALESCE(SUM(revenue), 0)::DOUBLE PRECISION AS revenue \
             FROM materials \
             WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1) \
               AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2) \
             GROUP BY category \
             ORDER BY downloads DESC, materials DESC",
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        rows.into_iter()
            .map(|r| {
                let category: Category = r
                    .category
                    .parse()
                    .map_err(|e| PortError::Unexpected(format!("Stored category is invalid: {e}")))?;
                Ok(CategoryTrend {
                    category,
                    materials: r.materials,
                    downloads: r.downloads,
                    revenue: r.revenue,
                })
            })
            .collect()
    }
}

//=========================================================================================
// User adapter
//=========================================================================================

/// A database adapter that implements the `UserStore` port.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new `PgUserStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_or_create(&self, external_id: i64, name: &str) -> PortResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, external_id, name) VALUES ($1, $2, $3) \
             ON CONFLICT (external_id) \
             DO UPDATE SET last_active_at = now(), name = EXCLUDED.name \
             RETURNING id, external_id, name, level, last_active_at, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(external_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.to_domain(Vec::new()))
    }

    async fn find_by_id(&self, id: Uuid) -> PortResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, name, level, last_active_at, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || format!("User {} not found", id)))?;

        let history_rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT content_id, title, category, price, downloaded_at \
             FROM download_history WHERE user_id = $1 ORDER BY downloaded_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let history: PortResult<Vec<DownloadEntry>> =
            history_rows.into_iter().map(|r| r.to_domain()).collect();
        Ok(row.to_domain(history?))
    }

    async fn list(&self) -> PortResult<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, name, level, last_active_at, created_at \
             FROM users ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(|r| r.to_domain(Vec::new())).collect())
    }

    async fn append_download(&self, external_id: i64, entry: DownloadEntry) -> PortResult<()> {
        let user_id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE external_id = $1")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or(e, || format!("User {} not found", external_id)))?;

        sqlx::query(
            "INSERT INTO download_history \
             (id, user_id, content_id, title, category, price, downloaded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(entry.content_id)
        .bind(&entry.title)
        .bind(entry.category.label())
        .bind(entry.price.to_string())
        .bind(entry.downloaded_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn stats_summary(&self) -> PortResult<UserStats> {
        let row = sqlx::query_as::<_, UserStatsRow>(
            "SELECT (SELECT COUNT(*) FROM users)::BIGINT AS total_users, \
                    (SELECT COUNT(*) FROM users \
                      WHERE last_active_at >= now() - INTERVAL '7 days')::BIGINT AS active_last_week, \
                    (SELECT COUNT(*) FROM download_history)::BIGINT AS total_downloads",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(UserStats {
            total_users: row.total_users,
            active_last_week: row.active_last_week,
            total_downloads: row.total_downloads,
        })
    }
}
