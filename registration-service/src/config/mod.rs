use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::services::RegistrationSettings;
use crate::utils::HashingParams;

/// Minimum CSRF key length accepted in production.
const MIN_PROD_SECRET_BYTES: usize = 32;

/// Upper bound for either expiry interval (30 days).
const MAX_EXPIRY_MINUTES: i64 = 30 * 24 * 60;

#[derive(Debug)]
pub struct RegistrationConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub csrf_secret: SecretString,
    pub session_expiry_minutes: i64,
    pub registration_flow_expiry_minutes: i64,
    pub store_timeout_seconds: u64,
    pub argon2: HashingParams,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("Unknown ENVIRONMENT: {}", other)),
        }
    }
}

impl RegistrationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment: Environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let defaults = HashingParams::default();

        let config = RegistrationConfig {
            common,
            environment,
            service_name: get("SERVICE_NAME", Some("registration-service"))?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|endpoint| !endpoint.is_empty()),
            csrf_secret: SecretString::new(get("CSRF_SECRET", None)?),
            session_expiry_minutes: parse(
                "SESSION_EXPIRY_MINUTES",
                get("SESSION_EXPIRY_MINUTES", Some("120"))?,
            )?,
            registration_flow_expiry_minutes: parse(
                "REGISTRATION_FLOW_EXPIRY_MINUTES",
                get("REGISTRATION_FLOW_EXPIRY_MINUTES", Some("60"))?,
            )?,
            store_timeout_seconds: parse(
                "STORE_TIMEOUT_SECONDS",
                get("STORE_TIMEOUT_SECONDS", Some("5"))?,
            )?,
            argon2: HashingParams {
                memory_kib: parse(
                    "ARGON2_MEMORY_KIB",
                    get("ARGON2_MEMORY_KIB", Some(&defaults.memory_kib.to_string()))?,
                )?,
                iterations: parse(
                    "ARGON2_ITERATIONS",
                    get("ARGON2_ITERATIONS", Some(&defaults.iterations.to_string()))?,
                )?,
                parallelism: parse(
                    "ARGON2_PARALLELISM",
                    get("ARGON2_PARALLELISM", Some(&defaults.parallelism.to_string()))?,
                )?,
            },
            cookie_secure: parse("COOKIE_SECURE", get("COOKIE_SECURE", Some("true"))?)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.registration_flow_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REGISTRATION_FLOW_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.session_expiry_minutes > MAX_EXPIRY_MINUTES {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_EXPIRY_MINUTES must not exceed {}",
                MAX_EXPIRY_MINUTES
            )));
        }

        if self.registration_flow_expiry_minutes > self.session_expiry_minutes {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REGISTRATION_FLOW_EXPIRY_MINUTES must not exceed SESSION_EXPIRY_MINUTES"
            )));
        }

        if self.store_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.csrf_secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CSRF_SECRET must not be empty"
            )));
        }

        if self.environment == Environment::Prod {
            if self.csrf_secret.expose_secret().len() < MIN_PROD_SECRET_BYTES {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "CSRF_SECRET must be at least {} bytes in production",
                    MIN_PROD_SECRET_BYTES
                )));
            }

            if !self.cookie_secure {
                tracing::error!("COOKIE_SECURE is disabled in production - session cookies will be sent over plain HTTP");
            }
        }

        Ok(())
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            session_expiry: chrono::Duration::minutes(self.session_expiry_minutes),
            flow_expiry: chrono::Duration::minutes(self.registration_flow_expiry_minutes),
            store_timeout: std::time::Duration::from_secs(self.store_timeout_seconds),
            hashing: self.argon2,
        }
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse<T>(key: &str, value: String) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e))
    })
}
