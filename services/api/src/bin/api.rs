//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{OpenAiCompletionAdapter, PgCatalogStore, PgContentStore, PgUserStore},
    config::Config,
    error::ApiError,
    web::{
        chat_ws_handler,
        require_admin_token,
        rest::{self, ApiDoc},
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_shelf_core::ports::TextGeneration;
use study_shelf_core::search::ScoreWeights;
use study_shelf_core::session::SessionStore;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    if let Some(url) = &config.webhook_url {
        info!("Chat webhook callback configured at {}", url);
    }

    // --- 2. Connect to Database (or run degraded) ---
    let app = match config.database_url.clone() {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            let catalog = Arc::new(PgCatalogStore::new(db_pool.clone()));
            info!("Running database migrations...");
            catalog
                .run_migrations()
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            info!("Database migrations complete.");

            // --- 3. Initialize Service Adapters ---
            let users = Arc::new(PgUserStore::new(db_pool.clone()));
            let content = Arc::new(PgContentStore::new(db_pool.clone()));

            let textgen: Option<Arc<dyn TextGeneration>> = match config.openai_api_key.as_ref() {
                Some(key) => {
                    let openai_config = OpenAIConfig::new().with_api_key(key);
                    let client = Client::with_config(openai_config);
                    Some(Arc::new(OpenAiCompletionAdapter::new(
                        client,
                        config.completion_model.clone(),
                    )))
                }
                None => {
                    warn!("OPENAI_API_KEY not set; free-form replies use templates only.");
                    None
                }
            };

            if config.admin_token.is_none() {
                warn!("ADMIN_TOKEN not set; the admin API accepts unauthenticated requests.");
            }

            // --- 4. Build the Shared AppState ---
            let app_state = Arc::new(AppState {
                catalog,
                users,
                content,
                textgen,
                sessions: Arc::new(SessionStore::new()),
                weights: ScoreWeights::default(),
                config: config.clone(),
            });

            build_router(app_state, &config)
        }
        None => {
            warn!("DATABASE_URL not set; catalog, user and chat subsystems are disabled.");
            Router::new().route("/health", get(rest::health_handler))
        }
    };

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wires the admin REST surface, the chat transport, CORS, and the Swagger UI.
fn build_router(app_state: Arc<AppState>, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static("x-admin-token"),
        ]);

    // Dashboard routes, behind the admin-token check.
    let admin_routes = Router::new()
        .route("/materials/upload", post(rest::upload_material_handler))
        .route("/materials", get(rest::list_materials_handler))
        .route(
            "/materials/analytics/summary",
            get(rest::analytics_summary_handler),
        )
        .route(
            "/materials/analytics/topic-trends",
            get(rest::topic_trends_handler),
        )
        .route(
            "/materials/analytics/category-trends",
            get(rest::category_trends_handler),
        )
        .route(
            "/materials/{id}",
            get(rest::get_material_handler)
                .put(rest::update_material_handler)
                .delete(rest::delete_material_handler),
        )
        .route(
            "/materials/{id}/increment-download",
            patch(rest::increment_download_handler),
        )
        .route(
            "/materials/{id}/increment-purchase",
            patch(rest::increment_purchase_handler),
        )
        .route("/users", get(rest::list_users_handler))
        .route("/users/stats/summary", get(rest::user_stats_handler))
        .route("/users/export/csv", get(rest::export_users_csv_handler))
        .route("/users/{id}", get(rest::get_user_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin_token,
        ));

    let mut open_routes = Router::new().route("/health", get(rest::health_handler));
    if config.chat_token.is_some() {
        open_routes = open_routes.route("/chat/ws", get(chat_ws_handler));
    } else {
        warn!("CHAT_TOKEN not set; the chat channel is disabled.");
    }

    let api_router = Router::new()
        .merge(open_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
