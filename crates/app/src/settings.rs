//! Handles settings for the application. Configuration is read from
//! `settings.toml` and can be overridden with `VOLTPAY__SECTION__KEY`
//! environment variables.
use config::{Config, ConfigError, Environment, File};
use providers::{PaystackConfig, VtpassConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    #[serde(default = "default_min_topup_minor")]
    pub min_topup_minor: i64,
}

fn default_conflict_retries() -> u32 {
    5
}

fn default_min_topup_minor() -> i64 {
    10_000
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
            min_topup_minor: default_min_topup_minor(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub ledger: Ledger,
    pub biller: VtpassConfig,
    pub gateway: PaystackConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("VOLTPAY").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
