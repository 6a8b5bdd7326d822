//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout. All of them
//! delegate to the session synchronizer, which owns the local auth state; the
//! remote collaborator's error messages are passed through verbatim.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use dermaglow_core::domain::SignUpInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

/// The redirect target for the OAuth flow.
#[derive(Serialize, ToSchema)]
pub struct OAuthRedirectResponse {
    pub url: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
///
/// Registration does not sign the user in; the client calls /auth/login
/// afterwards (or waits for email confirmation, depending on project settings).
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Registration rejected by the auth backend"),
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let info = if req.full_name.is_some() || req.username.is_some() {
        Some(SignUpInfo {
            full_name: req.full_name,
            username: req.username,
        })
    } else {
        None
    };

    state
        .auth
        .sign_up(&req.email, &req.password, info)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(StatusCode::CREATED)
}

/// POST /auth/login - Sign in with email and password
///
/// On success the synchronizer's state is updated through the notification
/// stream; this handler only reports whether the credential exchange worked.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in"),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .auth
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    Ok(StatusCode::OK)
}

/// POST /auth/google - Start the Google OAuth flow
///
/// Returns the authorize URL the client should navigate to. The session, if
/// the redirect completes, arrives through the auth-state stream.
#[utoipa::path(
    post,
    path = "/auth/google",
    responses(
        (status = 200, description = "Authorize URL built", body = OAuthRedirectResponse),
        (status = 502, description = "OAuth flow could not be started"),
    )
)]
pub async fn google_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let url = state
        .auth
        .sign_in_with_google()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(Json(OAuthRedirectResponse { url }))
}

/// POST /auth/logout - Sign out
///
/// Always succeeds: local state is cleared before the remote call, and a
/// remote failure is logged rather than surfaced.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Signed out"),
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.auth.sign_out().await;
    StatusCode::OK
}

/// POST /auth/reset-password - Send a password-reset email
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Reset email requested"),
        (status = 400, description = "Request rejected by the auth backend"),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .auth
        .reset_password(&req.email)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(StatusCode::OK)
}

/// PUT /auth/password - Change the current user's password
///
/// Protected: the middleware has already established a session, which the
/// backend call is made under.
#[utoipa::path(
    put,
    path = "/auth/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Backend rejected the change"),
    )
)]
pub async fn update_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .auth
        .update_password(&req.password)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(StatusCode::OK)
}

/// POST /auth/resend-verification - Re-send the signup confirmation email
#[utoipa::path(
    post,
    path = "/auth/resend-verification",
    responses(
        (status = 200, description = "Confirmation email requested"),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Backend rejected the request"),
    )
)]
pub async fn resend_verification_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .auth
        .resend_email_verification()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(StatusCode::OK)
}
