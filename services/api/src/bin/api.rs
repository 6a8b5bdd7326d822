//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        ingredient_llm::OpenAiIngredientAdapter, routine_llm::OpenAiRoutineAdapter,
        supabase::SupabaseAuthAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{
            google_handler, login_handler, logout_handler, resend_verification_handler,
            reset_password_handler, signup_handler, update_password_handler,
        },
        middleware::require_auth,
        rest::{
            analyze_ingredient_handler, generate_routine_handler, me_handler,
            refresh_assessment_handler, update_profile_handler, upload_avatar_handler, ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use dermaglow_core::context::AuthContext;
use dermaglow_core::workflow::{IngredientChecker, RoutineGenerator};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let supabase = Arc::new(SupabaseAuthAdapter::new(
        &config.supabase_url,
        &config.supabase_anon_key,
    ));

    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let ingredient_adapter = Arc::new(OpenAiIngredientAdapter::new(
        openai_client.clone(),
        config.ingredient_model.clone(),
    ));
    let routine_adapter = Arc::new(OpenAiRoutineAdapter::new(
        openai_client.clone(),
        config.routine_model.clone(),
    ));

    // --- 3. Start the Session Synchronizer & Workflow Components ---
    // The same adapter instance serves both ports, so the synchronizer's
    // subscription sees every session transition the auth calls produce.
    let auth = AuthContext::start(supabase.clone(), supabase);
    let ingredient_checker = IngredientChecker::new(ingredient_adapter);
    let routine_generator = RoutineGenerator::new(routine_adapter);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        auth: auth.clone(),
        ingredient_checker,
        routine_generator,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:5173".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/google", post(google_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/reset-password", post(reset_password_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(me_handler))
        .route("/auth/password", put(update_password_handler))
        .route("/auth/resend-verification", post(resend_verification_handler))
        .route("/profile", patch(update_profile_handler))
        .route("/profile/avatar", post(upload_avatar_handler))
        .route("/assessment/refresh", post(refresh_assessment_handler))
        .route("/ingredients/analyze", post(analyze_ingredient_handler))
        .route("/routines/generate", post(generate_routine_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    auth.shutdown();
    Ok(())
}
