pub mod context;
pub mod domain;
pub mod ports;
pub mod workflow;

pub use context::{AuthContext, AuthContextError, AuthSnapshot};
pub use domain::{
    AuthChange, AuthEvent, AuthUser, AvatarUpload, IngredientAnalysis, ProfileUpdate,
    RoutineComplexity, RoutineRequest, RoutineResponse, RoutineStep, Session, SignUpInfo,
    SkinAssessment, UserProfile,
};
pub use ports::{
    AssessmentService, AuthService, IngredientAnalysisService, PortError, PortResult,
    RoutineGenerationService,
};
pub use workflow::{IngredientChecker, RequestState, RoutineGenerator, SkipReason, Submission};
