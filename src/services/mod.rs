pub mod analysis_service;
pub mod analysis_service_impl;
pub mod auth_service;
pub mod auth_service_impl;
pub mod quota;

pub use analysis_service::{AnalysisError, AnalysisOutcome, AnalysisService, UsageStats};
pub use analysis_service_impl::SeaOrmAnalysisService;
pub use auth_service::{AuthError, AuthService, LoginResult, RegisterRequest, UserSummary};
pub use auth_service_impl::SeaOrmAuthService;
pub use quota::{QuotaLedger, QuotaStatus};
