//! Configuration management for the AgroTIC platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with AGRO_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Realtime notification hub
    pub notifications: NotificationsConfig,

    /// Report generation settings
    pub reports: ReportsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Apply pending migrations on start outside development
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    /// Events buffered per subscriber before a slow client starts skipping
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Farm local time offset from UTC, in hours
    pub utc_offset_hours: i32,

    /// Hourly rate used to estimate labor cost in crop reports
    pub labor_hourly_rate: Decimal,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AGRO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", false)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("notifications.channel_capacity", 256)?
            .set_default("reports.utc_offset_hours", -5)?
            .set_default("reports.labor_hourly_rate", "10.00")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGRO__ prefix)
            .add_source(
                Environment::with_prefix("AGRO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Migrations run automatically in development or when asked to
    pub fn should_run_migrations(&self) -> bool {
        self.environment == "development" || self.database.run_migrations
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_flag() {
        let config = Config {
            environment: "production".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/agrotic".to_string(),
                max_connections: 10,
                min_connections: 2,
                run_migrations: false,
            },
            jwt: JwtConfig {
                secret: "secret".to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 604800,
            },
            notifications: NotificationsConfig { channel_capacity: 16 },
            reports: ReportsConfig {
                utc_offset_hours: -5,
                labor_hourly_rate: Decimal::from(10),
            },
        };
        assert!(!config.should_run_migrations());

        let mut dev = config.clone();
        dev.environment = "development".to_string();
        assert!(dev.should_run_migrations());
    }
}
