use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Postgres connection string. When unset the API falls back to the
    /// in-memory store (development only).
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
}

fn default_jwt_secret() -> String {
    // Development fallback; override via AGRIRENT__AUTH__JWT_SECRET.
    "agrirent-dev-secret".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
        }
    }
}

/// Tunable marketplace rules. Defaults match the published fee card:
/// 5% platform fee, 18% GST, proof photos capped at 5 per upload and 20
/// per booking.
#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_platform_fee")]
    pub platform_fee_percent: i64,
    #[serde(default = "default_gst")]
    pub gst_percent: i64,
    #[serde(default = "default_photos_per_batch")]
    pub max_photos_per_batch: usize,
    #[serde(default = "default_photos_total")]
    pub max_photos_total: usize,
}

fn default_platform_fee() -> i64 {
    5
}
fn default_gst() -> i64 {
    18
}
fn default_photos_per_batch() -> usize {
    5
}
fn default_photos_total() -> usize {
    20
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            platform_fee_percent: default_platform_fee(),
            gst_percent: default_gst(),
            max_photos_per_batch: default_photos_per_batch(),
            max_photos_total: default_photos_total(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // `AGRIRENT__SERVER__PORT=9000` style environment overrides.
            .add_source(config::Environment::with_prefix("AGRIRENT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let rules = BusinessRules::default();
        assert_eq!(rules.platform_fee_percent, 5);
        assert_eq!(rules.gst_percent, 18);
        assert_eq!(rules.max_photos_per_batch, 5);
        assert_eq!(rules.max_photos_total, 20);

        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
    }
}
