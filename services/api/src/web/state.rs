//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use dermaglow_core::context::AuthContext;
use dermaglow_core::workflow::{IngredientChecker, RoutineGenerator};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// `auth` is the session synchronizer; the workflow components wrap the two
/// LLM adapters and enforce the one-in-flight-request rule per concern.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthContext,
    pub ingredient_checker: IngredientChecker,
    pub routine_generator: RoutineGenerator,
    pub config: Arc<Config>,
}
