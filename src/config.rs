//! Runtime configuration loaded from the environment (and `.env` via dotenvy).

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Postgres connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cors_origin: String,
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: None,
            database_max_connections: 10,
            cors_origin: "http://localhost:3000".to_string(),
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let environment = env::var("APP_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(defaults.environment);

        let port = match env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{}': {}", v, e))?,
            Err(_) => defaults.port,
        };

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid DATABASE_MAX_CONNECTIONS '{}': {}", v, e))?,
            Err(_) => defaults.database_max_connections,
        };

        let cache_ttl = match env::var("CACHE_TTL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .map_err(|e| anyhow::anyhow!("Invalid CACHE_TTL_SECS '{}': {}", v, e))?,
            ),
            Err(_) => defaults.cache_ttl,
        };

        Ok(Self {
            environment,
            host: env::var("HOST").unwrap_or(defaults.host),
            port,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            database_max_connections,
            cors_origin: env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            cache_ttl,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address '{}': {}", addr, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("development"), Environment::Development);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(!config.is_production());
        assert!(config.socket_addr().is_ok());
    }
}
