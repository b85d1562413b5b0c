//! Configuration loading for the Master CRUD service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `HERA_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::operations::OperationKind;

const ENV_PREFIX: &str = "HERA_";

/// Application configuration derived from `HERA_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Apply pending migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
    /// Attach raw failure text to error envelopes
    #[serde(default)]
    pub expose_diagnostics: bool,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub smart_code: SmartCodeConfig,
}

/// Response-time budgets and result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PerformanceConfig {
    /// Create budget in milliseconds (default: 80)
    #[serde(default = "default_create_budget_ms")]
    pub create_budget_ms: u64,
    /// Update budget in milliseconds (default: 75)
    #[serde(default = "default_update_budget_ms")]
    pub update_budget_ms: u64,
    /// Delete budget in milliseconds (default: 60)
    #[serde(default = "default_delete_budget_ms")]
    pub delete_budget_ms: u64,
    /// Query budget in milliseconds (default: 60)
    #[serde(default = "default_query_budget_ms")]
    pub query_budget_ms: u64,
    /// Serve repeated queries from the short-lived result cache
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// Lifetime of a cached query result in seconds (default: 300)
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached query results (default: 1024)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Samples kept per operation for rolling statistics (default: 100)
    #[serde(default = "default_metrics_window")]
    pub metrics_window: usize,
}

impl PerformanceConfig {
    /// Budget for one operation category.
    pub fn budget_ms(&self, operation: OperationKind) -> u64 {
        match operation {
            OperationKind::Create => self.create_budget_ms,
            OperationKind::Update => self.update_budget_ms,
            OperationKind::Delete => self.delete_budget_ms,
            OperationKind::Query => self.query_budget_ms,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Validate budget and cache bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        for operation in OperationKind::ALL {
            let value = self.budget_ms(operation);
            if value == 0 || value > 60_000 {
                return Err(ConfigError::InvalidBudget {
                    operation: operation.name().to_string(),
                    value,
                });
            }
        }

        if self.cache_enabled && (self.cache_ttl_seconds == 0 || self.cache_ttl_seconds > 86_400)
        {
            return Err(ConfigError::InvalidCacheTtl {
                value: self.cache_ttl_seconds,
            });
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity {
                value: self.cache_capacity,
            });
        }

        if self.metrics_window == 0 || self.metrics_window > 10_000 {
            return Err(ConfigError::InvalidMetricsWindow {
                value: self.metrics_window,
            });
        }

        Ok(())
    }
}

/// Defaults used when generating smart codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SmartCodeConfig {
    /// Leading namespace segment (default: HERA)
    #[serde(default = "default_smart_code_namespace")]
    pub namespace: String,
    /// Domain segment used when the caller supplies no smart code (default: CORE)
    #[serde(default = "default_smart_code_domain")]
    pub default_domain: String,
}

impl SmartCodeConfig {
    /// Default smart code for an entity type, e.g. `HERA.CORE.CUSTOMER.ENTITY.PROFILE.V1`.
    pub fn default_for(&self, entity_type: &str) -> String {
        format!(
            "{}.{}.{}.ENTITY.PROFILE.V1",
            self.namespace,
            self.default_domain,
            entity_type.to_ascii_uppercase()
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let namespace_ok = self
            .namespace
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_uppercase())
            && self
                .namespace
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !namespace_ok {
            return Err(ConfigError::InvalidSmartCodeSegment {
                field: "namespace".to_string(),
                value: self.namespace.clone(),
            });
        }

        let domain_ok = !self.default_domain.is_empty()
            && self
                .default_domain
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !domain_ok {
            return Err(ConfigError::InvalidSmartCodeSegment {
                field: "default_domain".to_string(),
                value: self.default_domain.clone(),
            });
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            run_migrations: default_run_migrations(),
            expose_diagnostics: default_expose_diagnostics(&default_profile()),
            performance: PerformanceConfig::default(),
            smart_code: SmartCodeConfig::default(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            create_budget_ms: default_create_budget_ms(),
            update_budget_ms: default_update_budget_ms(),
            delete_budget_ms: default_delete_budget_ms(),
            query_budget_ms: default_query_budget_ms(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_capacity: default_cache_capacity(),
            metrics_window: default_metrics_window(),
        }
    }
}

impl Default for SmartCodeConfig {
    fn default() -> Self {
        Self {
            namespace: default_smart_code_namespace(),
            default_domain: default_smart_code_domain(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns true for the `local` and `test` profiles.
    pub fn is_development(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Returns a redacted JSON representation (credentials are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        config.database_url = redact_database_url(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error for out-of-range settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        // In-memory stores lose every row on restart
        if !self.is_development() && self.database_url.contains(":memory:") {
            return Err(ConfigError::EphemeralDatabase {
                profile: self.profile.clone(),
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections {
                value: self.db_max_connections,
            });
        }

        self.performance.validate()?;
        self.smart_code.validate()?;

        Ok(())
    }
}

/// Replaces the password component of a connection URL.
fn redact_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("[REDACTED]")).is_ok() {
                parsed.to_string()
            } else {
                "[REDACTED]".to_string()
            }
        }
        _ => raw.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_run_migrations() -> bool {
    true
}

fn default_expose_diagnostics(profile: &str) -> bool {
    matches!(profile, "local" | "test")
}

fn default_create_budget_ms() -> u64 {
    80
}

fn default_update_budget_ms() -> u64 {
    75
}

fn default_delete_budget_ms() -> u64 {
    60
}

fn default_query_budget_ms() -> u64 {
    60
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_metrics_window() -> usize {
    100
}

fn default_smart_code_namespace() -> String {
    "HERA".to_string()
}

fn default_smart_code_domain() -> String {
    "CORE".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("database url is missing; set HERA_DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("profile '{profile}' cannot use an in-memory database; set HERA_DATABASE_URL")]
    EphemeralDatabase { profile: String },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("database max connections must be positive, got {value}")]
    InvalidMaxConnections { value: u32 },
    #[error("{operation} budget must be between 1 and 60000 ms, got {value}")]
    InvalidBudget { operation: String, value: u64 },
    #[error("cache ttl must be between 1 and 86400 seconds, got {value}")]
    InvalidCacheTtl { value: u64 },
    #[error("cache capacity must be positive, got {value}")]
    InvalidCacheCapacity { value: usize },
    #[error("metrics window must be between 1 and 10000 samples, got {value}")]
    InvalidMetricsWindow { value: usize },
    #[error("smart code {field} '{value}' must be upper-case letters, digits or underscores")]
    InvalidSmartCodeSegment { field: String, value: String },
}

/// Loads configuration using layered `.env` files and `HERA_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.<profile>`, `.env.<profile>.local`
    /// and finally the process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = parse_or(
            &mut layered,
            "DB_MAX_CONNECTIONS",
            default_db_max_connections,
        )?;
        let db_acquire_timeout_ms = parse_or(
            &mut layered,
            "DB_ACQUIRE_TIMEOUT_MS",
            default_db_acquire_timeout_ms,
        )?;
        let run_migrations = parse_or(&mut layered, "RUN_MIGRATIONS", default_run_migrations)?;
        let expose_diagnostics = parse_or(&mut layered, "EXPOSE_DIAGNOSTICS", || {
            default_expose_diagnostics(&profile)
        })?;

        let performance = PerformanceConfig {
            create_budget_ms: parse_or(&mut layered, "CREATE_BUDGET_MS", default_create_budget_ms)?,
            update_budget_ms: parse_or(&mut layered, "UPDATE_BUDGET_MS", default_update_budget_ms)?,
            delete_budget_ms: parse_or(&mut layered, "DELETE_BUDGET_MS", default_delete_budget_ms)?,
            query_budget_ms: parse_or(&mut layered, "QUERY_BUDGET_MS", default_query_budget_ms)?,
            cache_enabled: parse_or(&mut layered, "CACHE_ENABLED", default_cache_enabled)?,
            cache_ttl_seconds: parse_or(
                &mut layered,
                "CACHE_TTL_SECONDS",
                default_cache_ttl_seconds,
            )?,
            cache_capacity: parse_or(&mut layered, "CACHE_CAPACITY", default_cache_capacity)?,
            metrics_window: parse_or(&mut layered, "METRICS_WINDOW", default_metrics_window)?,
        };

        let smart_code = SmartCodeConfig {
            namespace: layered
                .remove("SMART_CODE_NAMESPACE")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_smart_code_namespace),
            default_domain: layered
                .remove("SMART_CODE_DEFAULT_DOMAIN")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_smart_code_domain),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            run_migrations,
            expose_diagnostics,
            performance,
            smart_code,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes `key` and parses it, falling back to `default` when absent or blank.
fn parse_or<T, F>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
    default: F,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: FnOnce() -> T,
{
    match layered.remove(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: format!("{ENV_PREFIX}{key}"),
            value: raw,
        }),
        None => Ok(default()),
    }
}
