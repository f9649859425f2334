use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} is not a valid value for {1}")]
    Invalid(String, &'static str),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    /// Without a URI the service keeps everything in memory.
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub frontend_origin: String,
    pub ai_endpoint: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::Invalid(raw, "SESSION_TTL_HOURS"))?,
            Err(_) => 24,
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            mongo_uri: env::var("MONGO_URI").ok().filter(|uri| !uri.trim().is_empty()),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "hackmatch".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            session_ttl_hours,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            ai_endpoint: env::var("AI_ENDPOINT")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            ai_api_key: env::var("AI_API_KEY").ok(),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
        })
    }

    #[cfg(test)]
    pub fn for_tests(ai_endpoint: &str) -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            mongo_uri: None,
            database_name: "hackmatch_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            session_ttl_hours: 1,
            frontend_origin: "http://localhost:3000".to_string(),
            ai_endpoint: ai_endpoint.to_string(),
            ai_api_key: Some("test-key".to_string()),
            ai_model: "test-model".to_string(),
        }
    }
}
