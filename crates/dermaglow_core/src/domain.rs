//! crates/dermaglow_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any wire format or vendor SDK.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The authenticated identity carried inside a [`Session`].
///
/// Derived from the session, never mutated independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// The credential bundle issued by the auth collaborator.
///
/// Replaced wholesale on every auth event; nulled on sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

/// The mutable user-owned record, keyed by user id and kept separate
/// from the session credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A partial profile patch. `None` fields are left untouched by the
/// collaborator; the caller always receives the canonical updated row back.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

/// Display info optionally attached to a sign-up request.
#[derive(Debug, Clone, Default)]
pub struct SignUpInfo {
    pub full_name: Option<String>,
    pub username: Option<String>,
}

/// A stored skin-evaluation questionnaire result. Only the most recent
/// record per user is ever queried.
#[derive(Debug, Clone)]
pub struct SkinAssessment {
    pub id: Uuid,
    pub skin_type: String,
    pub hydration_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An avatar image handed to the upload operation.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Kinds of notifications emitted by the auth collaborator's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One notification from the auth-state stream: the event kind plus the
/// full replacement session (or `None` when signed out).
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

//=========================================================================================
// AI payloads (transient, per-request)
//=========================================================================================

/// The structured result of analyzing one skincare ingredient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientAnalysis {
    /// Overall rating, 1 (poor) through 10 (excellent).
    pub rating: u8,
    pub category: String,
    pub benefits: String,
    pub how_to_use: String,
    pub mechanism_of_action: String,
    pub safety_usage_limit: String,
    pub side_effects: String,
    pub suitable_skin_types: String,
}

impl IngredientAnalysis {
    /// One-word quality label for the rating (8+ excellent, 6+ good,
    /// 4+ fair, below that poor).
    pub fn rating_badge(&self) -> &'static str {
        match self.rating {
            8..=10 => "Excellent",
            6..=7 => "Good",
            4..=5 => "Fair",
            _ => "Poor",
        }
    }

    /// Renders the professional summary paragraph shown alongside the
    /// analysis. The confidence sentence switches at ratings 7 and 4.
    pub fn professional_summary(&self) -> String {
        let verdict = match self.rating {
            7..=10 => {
                " This ingredient is well-researched and generally considered safe and \
                 effective for most users."
            }
            4..=6 => {
                " This ingredient shows promise but may require careful use or have \
                 limited research."
            }
            _ => " This ingredient may have safety concerns or limited efficacy data.",
        };
        format!(
            "This {} has received a rating of {}/10 based on its efficacy, safety \
             profile, and scientific backing.{}",
            self.category.to_lowercase(),
            self.rating,
            verdict
        )
    }
}

/// How many products the generated routine should involve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineComplexity {
    TwoStep,
    ThreeToFourStep,
    MoreThanFourStep,
}

impl RoutineComplexity {
    /// The label used on the wire and in prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoStep => "2-step",
            Self::ThreeToFourStep => "3-4-step",
            Self::MoreThanFourStep => "more-than-4-step",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2-step" => Some(Self::TwoStep),
            "3-4-step" => Some(Self::ThreeToFourStep),
            "more-than-4-step" => Some(Self::MoreThanFourStep),
            _ => None,
        }
    }
}

/// The skin profile sent to the routine-generation collaborator.
#[derive(Debug, Clone)]
pub struct RoutineRequest {
    pub skin_type: String,
    pub concerns: Vec<String>,
    pub complexity: RoutineComplexity,
}

impl RoutineRequest {
    /// A request is only submittable with a skin type and at least one concern.
    pub fn is_complete(&self) -> bool {
        !self.skin_type.trim().is_empty()
            && self.concerns.iter().any(|c| !c.trim().is_empty())
    }
}

/// One step in a generated routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineStep {
    pub step: u32,
    pub product_type: String,
    pub product_name: String,
    pub instructions: String,
    pub benefits: String,
    pub timing: String,
    pub optional: bool,
}

/// A generated skincare routine: ordered morning and evening step
/// sequences plus four advisory notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineResponse {
    pub morning_routine: Vec<RoutineStep>,
    pub evening_routine: Vec<RoutineStep>,
    pub general_tips: String,
    pub frequency_notes: String,
    pub weekly_schedule: String,
    pub product_recommendations: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(rating: u8) -> IngredientAnalysis {
        IngredientAnalysis {
            rating,
            category: "Active".to_string(),
            benefits: String::new(),
            how_to_use: String::new(),
            mechanism_of_action: String::new(),
            safety_usage_limit: String::new(),
            side_effects: String::new(),
            suitable_skin_types: String::new(),
        }
    }

    #[test]
    fn summary_high_rating_is_high_confidence() {
        let summary = analysis(9).professional_summary();
        assert!(summary.contains("well-researched"));
        assert!(summary.contains("effective"));
        assert!(summary.contains("9/10"));
        assert!(summary.starts_with("This active"));
    }

    #[test]
    fn summary_mid_rating_warns_about_careful_use() {
        let summary = analysis(5).professional_summary();
        assert!(summary.contains("may require careful use"));
    }

    #[test]
    fn summary_low_rating_flags_safety_concerns() {
        let summary = analysis(2).professional_summary();
        assert!(summary.contains("safety concerns"));
    }

    #[test]
    fn rating_badges_follow_thresholds() {
        assert_eq!(analysis(10).rating_badge(), "Excellent");
        assert_eq!(analysis(8).rating_badge(), "Excellent");
        assert_eq!(analysis(7).rating_badge(), "Good");
        assert_eq!(analysis(4).rating_badge(), "Fair");
        assert_eq!(analysis(3).rating_badge(), "Poor");
    }

    #[test]
    fn complexity_labels_round_trip() {
        for c in [
            RoutineComplexity::TwoStep,
            RoutineComplexity::ThreeToFourStep,
            RoutineComplexity::MoreThanFourStep,
        ] {
            assert_eq!(RoutineComplexity::parse(c.as_str()), Some(c));
        }
        assert_eq!(RoutineComplexity::parse("5-step"), None);
    }

    #[test]
    fn routine_request_completeness() {
        let mut req = RoutineRequest {
            skin_type: "Oily".to_string(),
            concerns: vec!["Acne".to_string()],
            complexity: RoutineComplexity::TwoStep,
        };
        assert!(req.is_complete());

        req.concerns.clear();
        assert!(!req.is_complete());

        req.concerns.push("  ".to_string());
        assert!(!req.is_complete());

        req.concerns.push("Aging".to_string());
        req.skin_type = String::new();
        assert!(!req.is_complete());
    }
}
