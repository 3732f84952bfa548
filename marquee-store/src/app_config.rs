use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Which seat-ledger backend the API serves from. Both provide the same
/// atomic conditional transitions; Redis is the default.
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_backend")]
    pub backend: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
        }
    }
}

fn default_ledger_backend() -> String {
    "redis".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// How long an unpaid hold stays alive before it expires.
    pub hold_seconds: u64,
    /// Cadence of the background expiry sweep.
    pub sweep_interval_seconds: u64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// Now-playing entries served by the static catalog adapter.
    #[serde(default)]
    pub movies: Vec<CatalogMovie>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogMovie {
    pub movie_id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: i64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `MARQUEE__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
