use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string for the user directory
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 10)
    pub db_max_connections: u32,

    /// Firebase project that owns the FCM sender
    pub fcm_project_id: String,

    /// OAuth2 bearer token presented to FCM HTTP v1
    pub fcm_access_token: String,

    /// FCM base URL (default: https://fcm.googleapis.com)
    pub fcm_endpoint: String,

    /// Upper bound on a single gateway call in milliseconds (default: 10000)
    pub dispatch_timeout_ms: u64,

    /// Logical notification sound identifier, without extension (default: "notification")
    pub notification_sound: String,

    /// Trigger adapter listen address (default: 0.0.0.0:8080)
    pub api_bind_addr: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            fcm_project_id: std::env::var("FCM_PROJECT_ID")
                .map_err(|_| anyhow::anyhow!("FCM_PROJECT_ID environment variable is required"))?,
            fcm_access_token: std::env::var("FCM_ACCESS_TOKEN").map_err(|_| {
                anyhow::anyhow!("FCM_ACCESS_TOKEN environment variable is required")
            })?,
            fcm_endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            dispatch_timeout_ms: std::env::var("DISPATCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_TIMEOUT_MS must be a valid u64"))?,
            notification_sound: std::env::var("NOTIFICATION_SOUND")
                .unwrap_or_else(|_| "notification".to_string()),
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms.max(1))
    }
}
