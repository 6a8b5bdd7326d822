//! crates/dermaglow_core/src/workflow.rs
//!
//! Request/response components for the two AI-backed features. Each holds
//! exactly one of {no result, in flight, result, error} at a time: starting
//! a request clears the previous outcome, a second trigger while one is
//! pending is a no-op, and failures surface the collaborator's message
//! verbatim. There is no queue, no retry, and no cancellation.

use std::sync::{Arc, Mutex};

use crate::domain::{IngredientAnalysis, RoutineRequest, RoutineResponse};
use crate::ports::{IngredientAnalysisService, RoutineGenerationService};

/// The single observable state of a request component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState<T> {
    Idle,
    InFlight,
    Ready(T),
    Failed(String),
}

impl<T> RequestState<T> {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Why a trigger did not issue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A required input was absent; no request was issued and no error raised.
    MissingInput,
    /// A request is already pending; duplicate triggers are suppressed.
    InFlight,
}

/// The outcome of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<T> {
    Completed(T),
    Failed(String),
    NotSubmitted(SkipReason),
}

/// Analyzes a single ingredient name through the analysis collaborator.
#[derive(Clone)]
pub struct IngredientChecker {
    analyzer: Arc<dyn IngredientAnalysisService>,
    state: Arc<Mutex<RequestState<IngredientAnalysis>>>,
}

impl IngredientChecker {
    pub fn new(analyzer: Arc<dyn IngredientAnalysisService>) -> Self {
        Self {
            analyzer,
            state: Arc::new(Mutex::new(RequestState::Idle)),
        }
    }

    pub fn state(&self) -> RequestState<IngredientAnalysis> {
        self.state.lock().expect("checker state poisoned").clone()
    }

    /// Triggers an analysis for `ingredient`. An empty name or a pending
    /// request makes this a no-op that leaves existing state untouched.
    pub async fn analyze(&self, ingredient: &str) -> Submission<IngredientAnalysis> {
        let ingredient = ingredient.trim();
        if ingredient.is_empty() {
            return Submission::NotSubmitted(SkipReason::MissingInput);
        }

        {
            let mut state = self.state.lock().expect("checker state poisoned");
            if state.is_in_flight() {
                return Submission::NotSubmitted(SkipReason::InFlight);
            }
            // Previous result and error are cleared before the call begins.
            *state = RequestState::InFlight;
        }

        match self.analyzer.analyze_ingredient(ingredient).await {
            Ok(analysis) => {
                *self.state.lock().expect("checker state poisoned") =
                    RequestState::Ready(analysis.clone());
                Submission::Completed(analysis)
            }
            Err(e) => {
                let message = e.to_string();
                *self.state.lock().expect("checker state poisoned") =
                    RequestState::Failed(message.clone());
                Submission::Failed(message)
            }
        }
    }
}

/// Generates a personalized routine through the generation collaborator.
#[derive(Clone)]
pub struct RoutineGenerator {
    generator: Arc<dyn RoutineGenerationService>,
    state: Arc<Mutex<RequestState<RoutineResponse>>>,
}

impl RoutineGenerator {
    pub fn new(generator: Arc<dyn RoutineGenerationService>) -> Self {
        Self {
            generator,
            state: Arc::new(Mutex::new(RequestState::Idle)),
        }
    }

    pub fn state(&self) -> RequestState<RoutineResponse> {
        self.state.lock().expect("generator state poisoned").clone()
    }

    /// Triggers routine generation. An incomplete profile (no skin type or
    /// no concerns) or a pending request makes this a no-op; in particular
    /// a previously generated routine stays visible until a new request
    /// actually starts.
    pub async fn generate(&self, request: &RoutineRequest) -> Submission<RoutineResponse> {
        if !request.is_complete() {
            return Submission::NotSubmitted(SkipReason::MissingInput);
        }

        {
            let mut state = self.state.lock().expect("generator state poisoned");
            if state.is_in_flight() {
                return Submission::NotSubmitted(SkipReason::InFlight);
            }
            *state = RequestState::InFlight;
        }

        match self.generator.generate_routine(request).await {
            Ok(routine) => {
                *self.state.lock().expect("generator state poisoned") =
                    RequestState::Ready(routine.clone());
                Submission::Completed(routine)
            }
            Err(e) => {
                let message = e.to_string();
                *self.state.lock().expect("generator state poisoned") =
                    RequestState::Failed(message.clone());
                Submission::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoutineComplexity, RoutineStep};
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn analysis(rating: u8) -> IngredientAnalysis {
        IngredientAnalysis {
            rating,
            category: "Active".to_string(),
            benefits: "Brightens".to_string(),
            how_to_use: "Apply at night".to_string(),
            mechanism_of_action: "Inhibits melanin transfer".to_string(),
            safety_usage_limit: "Up to 10%".to_string(),
            side_effects: "Mild flushing".to_string(),
            suitable_skin_types: "All".to_string(),
        }
    }

    fn routine() -> RoutineResponse {
        RoutineResponse {
            morning_routine: vec![RoutineStep {
                step: 1,
                product_type: "Cleanser".to_string(),
                product_name: "Gentle Gel Cleanser".to_string(),
                instructions: "Massage onto damp skin".to_string(),
                benefits: "Removes excess oil".to_string(),
                timing: "30 seconds".to_string(),
                optional: false,
            }],
            evening_routine: vec![],
            general_tips: "Patch test new products".to_string(),
            frequency_notes: "Daily".to_string(),
            weekly_schedule: "Exfoliate twice a week".to_string(),
            product_recommendations: "Fragrance-free formulas".to_string(),
        }
    }

    #[derive(Default)]
    struct MockAnalyzer {
        gate: Option<Arc<Notify>>,
        fail_with: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IngredientAnalysisService for MockAnalyzer {
        async fn analyze_ingredient(&self, _ingredient: &str) -> PortResult<IngredientAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.fail_with {
                Some(message) => Err(PortError::Unexpected(message.clone())),
                None => Ok(analysis(9)),
            }
        }
    }

    #[derive(Default)]
    struct MockGenerator {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RoutineGenerationService for MockGenerator {
        async fn generate_routine(&self, _request: &RoutineRequest) -> PortResult<RoutineResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(PortError::Unexpected("model unavailable".to_string()))
            } else {
                Ok(routine())
            }
        }
    }

    fn oily_acne_request() -> RoutineRequest {
        RoutineRequest {
            skin_type: "Oily".to_string(),
            concerns: vec!["Acne".to_string()],
            complexity: RoutineComplexity::TwoStep,
        }
    }

    #[tokio::test]
    async fn successful_analysis_is_held_as_result() {
        let checker = IngredientChecker::new(Arc::new(MockAnalyzer::default()));

        let outcome = checker.analyze("Niacinamide").await;
        assert!(matches!(outcome, Submission::Completed(_)));

        let state = checker.state();
        assert_eq!(state.result().map(|a| a.rating), Some(9));
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let analyzer = Arc::new(MockAnalyzer::default());
        let checker = IngredientChecker::new(analyzer.clone());

        checker.analyze("Niacinamide").await;
        let outcome = checker.analyze("   ").await;

        assert_eq!(outcome, Submission::NotSubmitted(SkipReason::MissingInput));
        // The earlier result is still there; no request went out.
        assert!(checker.state().result().is_some());
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_surfaces_collaborator_message_verbatim() {
        let checker = IngredientChecker::new(Arc::new(MockAnalyzer {
            fail_with: Some("quota exceeded".to_string()),
            ..Default::default()
        }));

        let outcome = checker.analyze("Retinol").await;
        match outcome {
            Submission::Failed(message) => assert!(message.contains("quota exceeded")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(checker.state().error().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn new_request_clears_previous_error() {
        let analyzer = Arc::new(MockAnalyzer {
            fail_with: Some("boom".to_string()),
            ..Default::default()
        });
        let checker = IngredientChecker::new(analyzer);
        checker.analyze("Retinol").await;
        assert!(checker.state().error().is_some());

        let ok_checker = IngredientChecker {
            analyzer: Arc::new(MockAnalyzer::default()),
            state: checker.state.clone(),
        };
        ok_checker.analyze("Retinol").await;
        let state = ok_checker.state();
        assert!(state.error().is_none());
        assert!(state.result().is_some());
    }

    #[tokio::test]
    async fn double_trigger_issues_a_single_call() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(MockAnalyzer {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let checker = IngredientChecker::new(analyzer.clone());

        let first = {
            let checker = checker.clone();
            tokio::spawn(async move { checker.analyze("Niacinamide").await })
        };

        // Let the first trigger reach the in-flight state.
        while !checker.state().is_in_flight() {
            tokio::task::yield_now().await;
        }

        let second = checker.analyze("Niacinamide").await;
        assert_eq!(second, Submission::NotSubmitted(SkipReason::InFlight));

        gate.notify_waiters();
        let first = first.await.unwrap();
        assert!(matches!(first, Submission::Completed(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn routine_validation_gates_without_clearing_result() {
        let generator = Arc::new(MockGenerator::default());
        let workflow = RoutineGenerator::new(generator.clone());

        let outcome = workflow.generate(&oily_acne_request()).await;
        assert!(matches!(outcome, Submission::Completed(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        // Removing every concern disables submission, but the generated
        // routine stays visible.
        let mut incomplete = oily_acne_request();
        incomplete.concerns.clear();
        let outcome = workflow.generate(&incomplete).await;
        assert_eq!(outcome, Submission::NotSubmitted(SkipReason::MissingInput));
        assert!(workflow.state().result().is_some());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn routine_failure_reports_the_message() {
        let generator = Arc::new(MockGenerator::default());
        generator.fail.store(true, Ordering::SeqCst);
        let workflow = RoutineGenerator::new(generator);

        let outcome = workflow.generate(&oily_acne_request()).await;
        match outcome {
            Submission::Failed(message) => assert!(message.contains("model unavailable")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
