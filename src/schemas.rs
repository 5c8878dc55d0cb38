use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::config::AppConfig;
use crate::storage::AvatarStore;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Startup configuration (public origin, token secret)
    pub config: AppConfig,
    /// Blob store for uploaded avatars
    pub storage: AvatarStore,
}

/// Acknowledgement returned by mutating endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable confirmation
    pub message: String,
    /// Echoed HTTP status
    pub status: u16,
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Client-safe error message
    pub error: String,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::profile::profile,
        crate::handlers::profile::update_client,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            MessageResponse,
            crate::handlers::profile::ProfileResponse,
            crate::handlers::profile::ProfileUserData,
            crate::handlers::profile::EnrolledCourseData,
            crate::handlers::profile::CourseSummary,
            crate::handlers::profile::SaleDetailData,
            crate::handlers::profile::SaleData,
            crate::handlers::profile::UpdateProfileRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "profile", description = "Student profile endpoints"),
    ),
    info(
        title = "Aula API",
        description = "Course store API - student profile aggregation and account updates",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
