// Environment-driven configuration

use crate::auth::{
    password::MIN_BCRYPT_COST,
    token::{TokenTtl, DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS},
};
use std::{collections::HashMap, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Supported password hashing schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordScheme {
    Bcrypt,
    Argon2,
}

impl FromStr for PasswordScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bcrypt" => Ok(PasswordScheme::Bcrypt),
            "argon2" => Ok(PasswordScheme::Argon2),
            other => Err(format!("unknown password scheme '{}'", other)),
        }
    }
}

/// Process configuration, read once at start-up and passed to constructors
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub app_name: String,
    pub jwt_secret: String,
    pub token_ttl: TokenTtl,
    pub request_timeout: Duration,
    pub password_scheme: PasswordScheme,
    pub bcrypt_cost: u32,
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let required = |name: &'static str| {
            get(name)
                .map(str::to_string)
                .ok_or(ConfigError::Missing(name))
        };

        fn parsed<T>(name: &'static str, raw: Option<&str>, default: T) -> Result<T, ConfigError>
        where
            T: FromStr,
            T::Err: std::fmt::Display,
        {
            match raw {
                None => Ok(default),
                Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        let positive = |name: &'static str, default: i64| -> Result<i64, ConfigError> {
            let value = parsed(name, get(name), default)?;
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            Ok(value)
        };

        let bcrypt_cost: u32 = parsed("BCRYPT_COST", get("BCRYPT_COST"), 11)?;
        if bcrypt_cost < MIN_BCRYPT_COST {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: format!("must be at least {}", MIN_BCRYPT_COST),
            });
        }

        let timeout_ms = positive("REQUEST_TIMEOUT_MS", 2000)?;

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            host: get("HOST").unwrap_or("0.0.0.0").to_string(),
            port: parsed("PORT", get("PORT"), 8080)?,
            app_name: get("APP_NAME").unwrap_or("account-api").to_string(),
            jwt_secret: required("JWT_SECRET")?,
            token_ttl: TokenTtl {
                access_secs: positive("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
                refresh_secs: positive("REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?,
            },
            request_timeout: Duration::from_millis(timeout_ms as u64),
            password_scheme: parsed(
                "PASSWORD_SCHEME",
                get("PASSWORD_SCHEME"),
                PasswordScheme::Bcrypt,
            )?,
            bcrypt_cost,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
