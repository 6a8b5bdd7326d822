//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use dermaglow_core::domain::{
    AvatarUpload, IngredientAnalysis, ProfileUpdate, RoutineComplexity, RoutineRequest,
    RoutineResponse, RoutineStep, UserProfile,
};
use dermaglow_core::workflow::{SkipReason, Submission};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::google_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::reset_password_handler,
        crate::web::auth::update_password_handler,
        crate::web::auth::resend_verification_handler,
        me_handler,
        update_profile_handler,
        upload_avatar_handler,
        refresh_assessment_handler,
        analyze_ingredient_handler,
        generate_routine_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::ResetPasswordRequest,
            crate::web::auth::UpdatePasswordRequest,
            crate::web::auth::OAuthRedirectResponse,
            MeResponse,
            ProfilePayload,
            UpdateProfileRequest,
            AvatarResponse,
            AssessmentStatusResponse,
            AnalyzeIngredientRequest,
            IngredientAnalysisPayload,
            GenerateRoutineRequest,
            RoutineStepPayload,
            RoutinePayload,
        )
    ),
    tags(
        (name = "DermaGlow API", description = "Auth, profile, and AI skincare-advice endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The authenticated user's view of the synchronizer state.
#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    user_id: Uuid,
    email: String,
    profile: Option<ProfilePayload>,
    has_completed_assessment: bool,
    loading: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ProfilePayload {
    id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    username: Option<String>,
    avatar_url: Option<String>,
}

impl From<UserProfile> for ProfilePayload {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            username: profile.username,
            avatar_url: profile.avatar_url,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AvatarResponse {
    avatar_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct AssessmentStatusResponse {
    has_completed_assessment: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AnalyzeIngredientRequest {
    pub ingredient: String,
}

/// The structured report for one ingredient.
#[derive(Serialize, ToSchema)]
pub struct IngredientAnalysisPayload {
    rating: u8,
    rating_badge: &'static str,
    category: String,
    benefits: String,
    how_to_use: String,
    mechanism_of_action: String,
    safety_usage_limit: String,
    side_effects: String,
    suitable_skin_types: String,
    professional_summary: String,
}

impl From<IngredientAnalysis> for IngredientAnalysisPayload {
    fn from(analysis: IngredientAnalysis) -> Self {
        Self {
            rating_badge: analysis.rating_badge(),
            professional_summary: analysis.professional_summary(),
            rating: analysis.rating,
            category: analysis.category,
            benefits: analysis.benefits,
            how_to_use: analysis.how_to_use,
            mechanism_of_action: analysis.mechanism_of_action,
            safety_usage_limit: analysis.safety_usage_limit,
            side_effects: analysis.side_effects,
            suitable_skin_types: analysis.suitable_skin_types,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateRoutineRequest {
    pub skin_type: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    /// One of "2-step", "3-4-step", "more-than-4-step".
    pub complexity: String,
}

#[derive(Serialize, ToSchema)]
pub struct RoutineStepPayload {
    step: u32,
    product_type: String,
    product_name: String,
    instructions: String,
    benefits: String,
    timing: String,
    optional: bool,
}

impl From<RoutineStep> for RoutineStepPayload {
    fn from(step: RoutineStep) -> Self {
        Self {
            step: step.step,
            product_type: step.product_type,
            product_name: step.product_name,
            instructions: step.instructions,
            benefits: step.benefits,
            timing: step.timing,
            optional: step.optional,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RoutinePayload {
    morning_routine: Vec<RoutineStepPayload>,
    evening_routine: Vec<RoutineStepPayload>,
    general_tips: String,
    frequency_notes: String,
    weekly_schedule: String,
    product_recommendations: String,
}

impl From<RoutineResponse> for RoutinePayload {
    fn from(routine: RoutineResponse) -> Self {
        Self {
            morning_routine: routine.morning_routine.into_iter().map(Into::into).collect(),
            evening_routine: routine.evening_routine.into_iter().map(Into::into).collect(),
            general_tips: routine.general_tips,
            frequency_notes: routine.frequency_notes,
            weekly_schedule: routine.weekly_schedule,
            product_recommendations: routine.product_recommendations,
        }
    }
}

/// Maps a workflow submission outcome to an HTTP result: missing input is a
/// 400, a duplicate trigger while one is pending is a 409, and a collaborator
/// failure is a 502 carrying the message verbatim.
fn submission_to_response<T, P: From<T> + Serialize>(
    submission: Submission<T>,
    missing_input_message: &str,
) -> Result<Json<P>, (StatusCode, String)> {
    match submission {
        Submission::Completed(value) => Ok(Json(P::from(value))),
        Submission::Failed(message) => Err((StatusCode::BAD_GATEWAY, message)),
        Submission::NotSubmitted(SkipReason::MissingInput) => Err((
            StatusCode::BAD_REQUEST,
            missing_input_message.to_string(),
        )),
        Submission::NotSubmitted(SkipReason::InFlight) => Err((
            StatusCode::CONFLICT,
            "A request is already in progress".to_string(),
        )),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get the current user and profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current synchronizer state", body = MeResponse),
        (status = 401, description = "Not signed in"),
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let snapshot = state.auth.snapshot();
    let user = snapshot
        .user()
        .ok_or((StatusCode::UNAUTHORIZED, "No user logged in".to_string()))?;

    Ok(Json(MeResponse {
        user_id: user.id,
        email: user.email.clone(),
        profile: snapshot.profile.clone().map(Into::into),
        has_completed_assessment: snapshot.has_completed_assessment,
        loading: snapshot.loading,
    }))
}

/// Apply a partial profile update.
///
/// Returns the canonical updated profile as stored by the backend; the
/// synchronizer never merges patches locally.
#[utoipa::path(
    patch,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfilePayload),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Backend rejected the update"),
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .auth
        .update_profile(ProfileUpdate {
            full_name: req.full_name,
            username: req.username,
            avatar_url: req.avatar_url,
        })
        .await
        .map_err(auth_error_to_response)?;

    Ok(Json(ProfilePayload::from(profile)))
}

/// Upload a new avatar image.
///
/// Accepts a multipart/form-data request with a single file part. The full
/// profile is reloaded afterwards, so a subsequent GET /me reflects the new URL.
#[utoipa::path(
    post,
    path = "/profile/avatar",
    request_body(content_type = "multipart/form-data", description = "The image to upload."),
    responses(
        (status = 200, description = "Avatar stored", body = AvatarResponse),
        (status = 400, description = "Multipart form did not include a file"),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Backend rejected the upload"),
    )
)]
pub async fn upload_avatar_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let upload = if let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let file_name = field.file_name().unwrap_or("avatar.png").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        AvatarUpload {
            file_name,
            content_type,
            bytes,
        }
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let avatar_url = state
        .auth
        .upload_avatar(upload)
        .await
        .map_err(auth_error_to_response)?;

    Ok(Json(AvatarResponse { avatar_url }))
}

/// Recompute the has-completed-assessment flag.
#[utoipa::path(
    post,
    path = "/assessment/refresh",
    responses(
        (status = 200, description = "Recomputed flag", body = AssessmentStatusResponse),
        (status = 401, description = "Not signed in"),
    )
)]
pub async fn refresh_assessment_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.auth.refresh_assessment_status().await;
    Json(AssessmentStatusResponse {
        has_completed_assessment: state.auth.snapshot().has_completed_assessment,
    })
}

/// Analyze a single skincare ingredient.
#[utoipa::path(
    post,
    path = "/ingredients/analyze",
    request_body = AnalyzeIngredientRequest,
    responses(
        (status = 200, description = "Analysis report", body = IngredientAnalysisPayload),
        (status = 400, description = "Ingredient name was empty"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "An analysis is already in progress"),
        (status = 502, description = "The analysis collaborator failed"),
    )
)]
pub async fn analyze_ingredient_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user_id): Extension<Uuid>,
    Json(req): Json<AnalyzeIngredientRequest>,
) -> Result<Json<IngredientAnalysisPayload>, (StatusCode, String)> {
    let submission = state.ingredient_checker.analyze(&req.ingredient).await;
    submission_to_response(submission, "An ingredient name is required")
}

/// Generate a personalized skincare routine.
#[utoipa::path(
    post,
    path = "/routines/generate",
    request_body = GenerateRoutineRequest,
    responses(
        (status = 200, description = "Generated routine", body = RoutinePayload),
        (status = 400, description = "Skin type or concerns were missing"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "A generation is already in progress"),
        (status = 502, description = "The generation collaborator failed"),
    )
)]
pub async fn generate_routine_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user_id): Extension<Uuid>,
    Json(req): Json<GenerateRoutineRequest>,
) -> Result<Json<RoutinePayload>, (StatusCode, String)> {
    let complexity = RoutineComplexity::parse(&req.complexity).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a recognized routine complexity", req.complexity),
        )
    })?;

    let request = RoutineRequest {
        skin_type: req.skin_type,
        concerns: req.concerns,
        complexity,
    };

    let submission = state.routine_generator.generate(&request).await;
    submission_to_response(submission, "A skin type and at least one concern are required")
}

/// Maps synchronizer errors onto HTTP: an anonymous context is a 401, a
/// collaborator failure is a 502 carrying the message verbatim.
fn auth_error_to_response(
    err: dermaglow_core::context::AuthContextError,
) -> (StatusCode, String) {
    use dermaglow_core::context::AuthContextError;
    match err {
        AuthContextError::NotAuthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthContextError::Remote(message) => (StatusCode::BAD_GATEWAY, message),
    }
}
