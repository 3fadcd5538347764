use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// A retail branch as configured in the branch directory.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct BranchConfig {
    pub id: Uuid,
    pub name: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key used to validate caller identity tokens
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Ordered list of retail branches. Stock operations depend on this list
    /// existing and being stable for the lifetime of the process.
    #[validate(length(min = 1, message = "at least one branch must be configured"))]
    pub branches: Vec<BranchConfig>,

    /// The branch that receives initial stock and manual adjustments.
    /// Must reference an entry of `branches`; checked in `load_config`.
    pub default_branch_id: Uuid,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.chars().all(|c| c == secret.chars().next().unwrap_or(' ')) {
        return Err(ValidationError::new("jwt_secret_degenerate"));
    }
    Ok(())
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    /// Looks up a configured branch by id.
    pub fn branch(&self, id: Uuid) -> Option<&BranchConfig> {
        self.branches.iter().find(|b| b.id == id)
    }
}

/// Loads configuration from `config/{default,<env>}.toml` plus `APP__*`
/// environment variable overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .set_default("host", "0.0.0.0")?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    // The default branch must be one of the configured branches; everything
    // downstream assumes the lookup cannot fail.
    if cfg.branch(cfg.default_branch_id).is_none() {
        return Err(ConfigError::Message(format!(
            "default_branch_id {} is not in the configured branch list",
            cfg.default_branch_id
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for branch in &cfg.branches {
        if !seen.insert(branch.id) {
            return Err(ConfigError::Message(format!(
                "duplicate branch id {} in branch list",
                branch.id
            )));
        }
    }

    info!(
        environment = %cfg.environment,
        branches = cfg.branches.len(),
        "Configuration loaded"
    );

    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}
