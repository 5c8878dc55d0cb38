use anyhow::Result;
use sea_orm::Database;

use crate::schemas::AppState;
use crate::storage::AvatarStore;

/// Process-wide settings resolved once at startup. Handlers receive
/// these through [`AppState`] and never read the environment directly.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Public origin used to build absolute URLs for stored files.
    pub app_url: String,
    /// Secret used to verify bearer tokens.
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000/".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET is not set, falling back to an insecure default");
            "insecure-dev-secret".to_string()
        });

        Self { app_url, jwt_secret }
    }
}

/// Initialize application configuration and state
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Connect to database
    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    let storage_root = std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "storage".to_string());

    Ok(AppState {
        db,
        config: AppConfig::from_env(),
        storage: AvatarStore::new(storage_root),
    })
}
