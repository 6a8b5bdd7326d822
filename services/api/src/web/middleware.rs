//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Middleware that consults the session synchronizer's snapshot and extracts
/// the user_id.
///
/// If a session is held, inserts the user_id into request extensions for
/// handlers to use. If the context is anonymous, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let snapshot = state.auth.snapshot();

    let user_id = snapshot
        .user()
        .map(|u| u.id)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
