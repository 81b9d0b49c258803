//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the admin REST API consumed by the
//! dashboard, and the master definition for the OpenAPI specification.
//! Every endpoint answers with the `{ success, message, data }` envelope;
//! failures use 400 (validation), 404 (not found), and 500 (internal)
//! uniformly.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_shelf_core::domain::{
    CatalogFilter, CatalogItem, CatalogPatch, Category, DateRange, DownloadEntry, NewCatalogItem,
    Price, UserRecord,
};
use study_shelf_core::ports::PortError;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_material_handler,
        list_materials_handler,
        get_material_handler,
        analytics_summary_handler,
        list_users_handler,
    ),
    components(
        schemas(MaterialDto, UserDto, DownloadEntryDto, CatalogSummaryDto, UpdateMaterialBody)
    ),
    tags(
        (name = "StudyShelf Admin API", description = "Catalog, analytics and user administration for the dashboard.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Response Envelope
//=========================================================================================

/// The uniform JSON envelope every endpoint answers with.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// The failure half of a handler result.
pub type ApiFailure = (StatusCode, Json<Envelope<()>>);

fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

fn success_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data: Some(data),
    })
}

fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(Envelope {
            success: false,
            message: Some(message.into()),
            data: None,
        }),
    )
}

/// Maps the core error taxonomy onto the three admin status codes.
fn port_failure(e: PortError) -> ApiFailure {
    match e {
        PortError::Validation(m) => failure(StatusCode::BAD_REQUEST, m),
        PortError::NotFound(m) => failure(StatusCode::NOT_FOUND, m),
        PortError::TooLarge { .. } => failure(StatusCode::BAD_REQUEST, e.to_string()),
        PortError::Unavailable(m) | PortError::Unexpected(m) => {
            error!("Admin request failed: {}", m);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A catalog item as the dashboard sees it.
#[derive(Serialize, ToSchema)]
pub struct MaterialDto {
    pub id: Uuid,
    pub title: String,
    pub topics: Vec<String>,
    pub category: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub price: String,
    pub content_ref: Uuid,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub mime_type: String,
    pub downloads: i64,
    pub purchases: i64,
    pub revenue: f64,
    pub created_at: DateTime<Utc>,
}

impl From<CatalogItem> for MaterialDto {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            topics: item.topics,
            category: item.category.label().to_string(),
            description: item.description,
            keywords: item.keywords,
            price: item.price.to_string(),
            content_ref: item.content_ref,
            file_name: item.file_name,
            file_size_bytes: item.file_size_bytes,
            mime_type: item.mime_type,
            downloads: item.downloads,
            purchases: item.purchases,
            revenue: item.revenue,
            created_at: item.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DownloadEntryDto {
    pub content_id: Uuid,
    pub title: String,
    pub category: String,
    pub price: String,
    pub downloaded_at: DateTime<Utc>,
}

impl From<DownloadEntry> for DownloadEntryDto {
    fn from(entry: DownloadEntry) -> Self {
        Self {
            content_id: entry.content_id,
            title: entry.title,
            category: entry.category.label().to_string(),
            price: entry.price.to_string(),
            downloaded_at: entry.downloaded_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub level: Option<String>,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub download_history: Vec<DownloadEntryDto>,
}

impl From<UserRecord> for UserDto {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            external_id: user.external_id,
            name: user.name,
            level: user.level,
            last_active_at: user.last_active_at,
            created_at: user.created_at,
            download_history: user
                .download_history
                .into_iter()
                .map(DownloadEntryDto::from)
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CatalogSummaryDto {
    pub total_materials: i64,
    pub free_materials: i64,
    pub paid_materials: i64,
    pub total_downloads: i64,
    pub total_purchases: i64,
    pub total_revenue: f64,
}

#[derive(Serialize)]
pub struct TopicTrendDto {
    pub topic: String,
    pub materials: i64,
    pub downloads: i64,
}

#[derive(Serialize)]
pub struct CategoryTrendDto {
    pub category: String,
    pub materials: i64,
    pub downloads: i64,
    pub revenue: f64,
}

#[derive(Serialize)]
pub struct UserStatsDto {
    pub total_users: i64,
    pub active_last_week: i64,
    pub total_downloads: i64,
}

#[derive(Deserialize)]
pub struct MaterialsQuery {
    pub topic: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct TrendQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Administrative edit body. Absent fields are left unchanged.
#[derive(Deserialize, ToSchema)]
pub struct UpdateMaterialBody {
    pub title: Option<String>,
    pub topics: Option<Vec<String>>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub price: Option<String>,
}

//=========================================================================================
// Shared helpers
//=========================================================================================

fn parse_category(raw: &str) -> Result<Category, ApiFailure> {
    raw.parse::<Category>().map_err(|_| {
        let valid: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
        failure(
            StatusCode::BAD_REQUEST,
            format!("Invalid category '{}'. Valid categories: {}", raw, valid.join(", ")),
        )
    })
}

fn parse_price(raw: &str) -> Result<Price, ApiFailure> {
    Price::parse(raw).map_err(|_| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Invalid price '{}'. Use \"Free\" or a non-negative decimal.", raw),
        )
    })
}

fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(naive) = naive {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(format!(
        "'{raw}' is not an RFC 3339 timestamp or YYYY-MM-DD date"
    ))
}

fn parse_range(query: &TrendQuery) -> Result<DateRange, ApiFailure> {
    let from = match &query.from {
        Some(raw) => Some(parse_bound(raw, false).map_err(|m| failure(StatusCode::BAD_REQUEST, m))?),
        None => None,
    };
    let to = match &query.to {
        Some(raw) => Some(parse_bound(raw, true).map_err(|m| failure(StatusCode::BAD_REQUEST, m))?),
        None => None,
    };
    Ok(DateRange { from, to })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize)]
pub struct HealthDto {
    pub status: &'static str,
}

pub async fn health_handler() -> Json<Envelope<HealthDto>> {
    success(HealthDto { status: "ok" })
}

//=========================================================================================
// Materials: upload and CRUD
//=========================================================================================

/// Upload a new study material.
///
/// Accepts a multipart/form-data request with a `file` part and metadata
/// parts (`title`, `category`, `price`, `topics`, `keywords`, `description`).
/// The file bytes are written to the content store first; the catalog record
/// then references the returned content id.
#[utoipa::path(
    post,
    path = "/materials/upload",
    request_body(content_type = "multipart/form-data", description = "The document plus its metadata."),
    responses(
        (status = 201, description = "Material created successfully", body = MaterialDto),
        (status = 400, description = "Bad request (missing file or invalid metadata)"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_material_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiFailure> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut title: Option<String> = None;
    let mut category_raw: Option<String> = None;
    let mut price_raw: Option<String> = None;
    let mut topics: Vec<String> = Vec::new();
    let mut keywords: Vec<String> = Vec::new();
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("untitled.bin").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    failure(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some((name, mime, data));
            }
            "title" => title = Some(read_text_field(field).await?),
            "category" => category_raw = Some(read_text_field(field).await?),
            "price" => price_raw = Some(read_text_field(field).await?),
            "topics" => topics = split_list(&read_text_field(field).await?),
            "keywords" => keywords = split_list(&read_text_field(field).await?),
            "description" => {
                let text = read_text_field(field).await?;
                if !text.trim().is_empty() {
                    description = Some(text);
                }
            }
            _ => {}
        }
    }

    let (file_name, mime_type, data) = file.ok_or_else(|| {
        failure(
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file",
        )
    })?;
    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "title is required"))?;
    let category = parse_category(
        category_raw
            .as_deref()
            .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "category is required"))?,
    )?;
    let price = parse_price(
        price_raw
            .as_deref()
            .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "price is required"))?,
    )?;
    if topics.is_empty() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "topics must contain at least one entry",
        ));
    }

    // Content first, record second, so the record never references bytes
    // that were not stored.
    let stored = app_state
        .content
        .put(&file_name, &mime_type, data)
        .await
        .map_err(port_failure)?;

    let new_item = NewCatalogItem {
        title: title.trim().to_string(),
        topics,
        category,
        description,
        keywords,
        price,
        content_ref: stored.id,
        file_name: stored.file_name,
        file_size_bytes: stored.size_bytes,
        mime_type: stored.mime_type,
    };

    match app_state.catalog.insert(new_item).await {
        Ok(item) => Ok((
            StatusCode::CREATED,
            success_with_message("Material uploaded", MaterialDto::from(item)),
        )),
        Err(e) => {
            // Don't leave the freshly stored bytes orphaned.
            if let Err(cleanup) = app_state.content.delete(stored.id).await {
                warn!("Failed to clean up content {} after insert failure: {:?}", stored.id, cleanup);
            }
            Err(port_failure(e))
        }
    }
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiFailure> {
    field.text().await.map_err(|e| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart field: {}", e),
        )
    })
}

/// List materials, optionally filtered by topic, category, or search text.
#[utoipa::path(
    get,
    path = "/materials",
    responses(
        (status = 200, description = "Materials listed", body = [MaterialDto]),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list_materials_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<MaterialsQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(parse_category(raw)?),
        None => None,
    };
    let filter = CatalogFilter {
        topic: query.topic,
        category,
        search: query.search,
    };
    let items = app_state.catalog.list(filter).await.map_err(port_failure)?;
    let dtos: Vec<MaterialDto> = items.into_iter().map(MaterialDto::from).collect();
    Ok(success(dtos))
}

/// Fetch one material by id.
#[utoipa::path(
    get,
    path = "/materials/{id}",
    responses(
        (status = 200, description = "Material found", body = MaterialDto),
        (status = 404, description = "No material with this id")
    )
)]
pub async fn get_material_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let item = app_state.catalog.find_by_id(id).await.map_err(port_failure)?;
    Ok(success(MaterialDto::from(item)))
}

pub async fn update_material_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMaterialBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(failure(StatusCode::BAD_REQUEST, "title must not be empty"));
        }
    }
    if let Some(topics) = &body.topics {
        if topics.iter().all(|t| t.trim().is_empty()) {
            return Err(failure(
                StatusCode::BAD_REQUEST,
                "topics must contain at least one entry",
            ));
        }
    }
    let category = match body.category.as_deref() {
        Some(raw) => Some(parse_category(raw)?),
        None => None,
    };
    let price = match body.price.as_deref() {
        Some(raw) => Some(parse_price(raw)?),
        None => None,
    };

    let patch = CatalogPatch {
        title: body.title,
        topics: body.topics,
        category,
        description: body.description,
        keywords: body.keywords,
        price,
    };
    let item = app_state
        .catalog
        .update(id, patch)
        .await
        .map_err(port_failure)?;
    Ok(success_with_message("Material updated", MaterialDto::from(item)))
}

pub async fn delete_material_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let item = app_state.catalog.find_by_id(id).await.map_err(port_failure)?;

    // Binary content goes first: if the record delete then fails, a retry
    // finds the content already gone and neither side is orphaned.
    match app_state.content.delete(item.content_ref).await {
        Ok(()) | Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(port_failure(e)),
    }
    let deleted = app_state.catalog.delete(id).await.map_err(port_failure)?;
    Ok(success_with_message(
        "Material deleted",
        MaterialDto::from(deleted),
    ))
}

pub async fn increment_download_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    app_state
        .catalog
        .increment_download(id)
        .await
        .map_err(port_failure)?;
    let item = app_state.catalog.find_by_id(id).await.map_err(port_failure)?;
    Ok(success_with_message(
        "Download recorded",
        MaterialDto::from(item),
    ))
}

pub async fn increment_purchase_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let item = app_state.catalog.find_by_id(id).await.map_err(port_failure)?;
    let amount = item.price.amount().unwrap_or(0.0);
    app_state
        .catalog
        .record_purchase(id, amount)
        .await
        .map_err(port_failure)?;
    let item = app_state.catalog.find_by_id(id).await.map_err(port_failure)?;
    Ok(success_with_message(
        "Purchase recorded",
        MaterialDto::from(item),
    ))
}

//=========================================================================================
// Materials: analytics
//=========================================================================================

/// Catalog-wide totals for the dashboard landing page.
#[utoipa::path(
    get,
    path = "/materials/analytics/summary",
    responses(
        (status = 200, description = "Catalog summary", body = CatalogSummaryDto)
    )
)]
pub async fn analytics_summary_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiFailure> {
    let summary = app_state
        .catalog
        .analytics_summary()
        .await
        .map_err(port_failure)?;
    Ok(success(CatalogSummaryDto {
        total_materials: summary.total_materials,
        free_materials: summary.free_materials,
        paid_materials: summary.paid_materials,
        total_downloads: summary.total_downloads,
        total_purchases: summary.total_purchases,
        total_revenue: summary.total_revenue,
    }))
}

pub async fn topic_trends_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<TrendQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    let range = parse_range(&query)?;
    let trends = app_state
        .catalog
        .topic_trends(range)
        .await
        .map_err(port_failure)?;
    let dtos: Vec<TopicTrendDto> = trends
        .into_iter()
        .map(|t| TopicTrendDto {
            topic: t.topic,
            materials: t.materials,
            downloads: t.downloads,
        })
        .collect();
    Ok(success(dtos))
}

pub async fn category_trends_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<TrendQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    let range = parse_range(&query)?;
    let trends = app_state
        .catalog
        .category_trends(range)
        .await
        .map_err(port_failure)?;
    let dtos: Vec<CategoryTrendDto> = trends
        .into_iter()
        .map(|t| CategoryTrendDto {
            category: t.category.label().to_string(),
            materials: t.materials,
            downloads: t.downloads,
            revenue: t.revenue,
        })
        .collect();
    Ok(success(dtos))
}

//=========================================================================================
// Users
//=========================================================================================

/// List all registered chat users.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users listed", body = [UserDto])
    )
)]
pub async fn list_users_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiFailure> {
    let users = app_state.users.list().await.map_err(port_failure)?;
    let dtos: Vec<UserDto> = users.into_iter().map(UserDto::from).collect();
    Ok(success(dtos))
}

pub async fn get_user_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let user = app_state.users.find_by_id(id).await.map_err(port_failure)?;
    Ok(success(UserDto::from(user)))
}

pub async fn user_stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiFailure> {
    let stats = app_state.users.stats_summary().await.map_err(port_failure)?;
    Ok(success(UserStatsDto {
        total_users: stats.total_users,
        active_last_week: stats.active_last_week,
        total_downloads: stats.total_downloads,
    }))
}

pub async fn export_users_csv_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiFailure> {
    let users = app_state.users.list().await.map_err(port_failure)?;

    let mut csv = String::from("id,external_id,name,level,created_at,last_active_at\n");
    for user in users {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            user.id,
            user.external_id,
            csv_escape(&user.name),
            csv_escape(user.level.as_deref().unwrap_or("")),
            user.created_at.to_rfc3339(),
            user.last_active_at.to_rfc3339(),
        ));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"users.csv\"",
            ),
        ],
        csv,
    ))
}

/// Quotes a CSV field when it contains a delimiter, quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escape_quotes_only_when_needed() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn trend_bounds_accept_dates_and_timestamps() {
        let start = parse_bound("2026-01-15", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-01-15T00:00:00+00:00");
        let end = parse_bound("2026-01-15", true).unwrap();
        assert_eq!(end.to_rfc3339(), "2026-01-15T23:59:59+00:00");
        assert!(parse_bound("2026-01-15T10:30:00Z", false).is_ok());
        assert!(parse_bound("yesterday", false).is_err());
    }

    #[test]
    fn list_splitting_trims_and_drops_empties() {
        assert_eq!(
            split_list("cardiac, pharmacology , ,meds"),
            vec!["cardiac", "pharmacology", "meds"]
        );
        assert!(split_list("  ").is_empty());
    }
}
