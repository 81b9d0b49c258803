//! services/api/src/web/middleware.rs
//!
//! Admin-token middleware for protecting the dashboard routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Middleware that validates the `x-admin-token` header against the
/// configured admin token.
///
/// When no token is configured the check is skipped entirely (the startup
/// log warns about the open surface). Otherwise a missing or wrong token
/// returns 401 Unauthorized.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if provided != expected {
        error!("Admin request rejected: wrong x-admin-token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
