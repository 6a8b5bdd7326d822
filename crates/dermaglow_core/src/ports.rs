//! crates/dermaglow_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted auth backend and AI APIs behind them.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{
    AuthChange, AvatarUpload, IngredientAnalysis, ProfileUpdate, RoutineRequest,
    RoutineResponse, Session, SignUpInfo, SkinAssessment, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, vendor APIs).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The hosted auth backend: credentials, session issuance, profile storage,
/// and avatar upload. Implementations also own the auth-state notification
/// stream that the session synchronizer consumes.
#[async_trait]
pub trait AuthService: Send + Sync {
    // --- Credential operations ---
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        info: Option<SignUpInfo>,
    ) -> PortResult<()>;

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<()>;

    /// Starts the OAuth redirect flow and returns the provider authorize URL.
    /// The resulting session arrives through the notification stream, never
    /// through this call's return value.
    async fn sign_in_with_google(&self) -> PortResult<String>;

    async fn sign_out(&self) -> PortResult<()>;

    async fn reset_password(&self, email: &str) -> PortResult<()>;

    async fn update_password(&self, new_password: &str) -> PortResult<()>;

    async fn resend_email_verification(&self) -> PortResult<()>;

    /// One-shot fetch of the current session, if any.
    async fn current_session(&self) -> PortResult<Option<Session>>;

    /// Subscribe to auth-state change notifications. Every sign-in,
    /// sign-out, and token refresh is delivered, in order, to each
    /// live receiver.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthChange>;

    // --- Profile storage ---
    async fn get_user_profile(&self, user_id: Uuid) -> PortResult<Option<UserProfile>>;

    /// Applies a partial update and returns the canonical stored profile.
    async fn update_user_profile(
        &self,
        user_id: Uuid,
        updates: ProfileUpdate,
    ) -> PortResult<UserProfile>;

    /// Uploads an avatar image and returns its public URL.
    async fn upload_avatar(&self, user_id: Uuid, upload: AvatarUpload) -> PortResult<String>;
}

/// Read access to stored skin-assessment records.
#[async_trait]
pub trait AssessmentService: Send + Sync {
    /// Returns the single most recent assessment for the user, or `None`.
    async fn latest_for_user(&self, user_id: Uuid) -> PortResult<Option<SkinAssessment>>;
}

#[async_trait]
pub trait IngredientAnalysisService: Send + Sync {
    /// Analyzes a single skincare ingredient by name.
    async fn analyze_ingredient(&self, ingredient: &str) -> PortResult<IngredientAnalysis>;
}

#[async_trait]
pub trait RoutineGenerationService: Send + Sync {
    /// Generates a personalized routine for the given skin profile.
    async fn generate_routine(&self, request: &RoutineRequest) -> PortResult<RoutineResponse>;
}
