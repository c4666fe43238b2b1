use chrono::NaiveTime;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ordering: OrderingConfig,
    pub fulfillment: FulfillmentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrderingConfig {
    /// "HH:MM", local time; unset means ordering never closes
    pub cutoff: Option<String>,
    pub delivery_slot: String,
    pub per_person_cap_cents: i32,
    #[serde(default = "default_gratuity_tolerance")]
    pub gratuity_tolerance_cents: i32,
    #[serde(default = "default_suggestion_threshold")]
    pub suggestion_threshold: usize,
}

fn default_gratuity_tolerance() -> i32 { 75 }

fn default_suggestion_threshold() -> usize { 10 }

#[derive(Debug, Deserialize, Clone)]
pub struct FulfillmentConfig {
    pub max_retries: u32,
    pub step_timeout_ms: u64,
    #[serde(default)]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_clear_on_success")]
    pub clear_on_success: bool,
    /// Fixes point-of-contact selection, for reproducible runs
    pub seed: Option<u64>,
    #[serde(default = "default_tax_rate_bps")]
    pub simulated_tax_rate_bps: i32,
}

fn default_clear_on_success() -> bool { true }

fn default_tax_rate_bps() -> i32 { 625 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Directory for JSON snapshots; unset keeps everything in memory
    pub data_dir: Option<String>,
    pub menus_file: Option<String>,
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, config::ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| config::ConfigError::Message(format!("{}: '{}' is not HH:MM ({})", key, value, e)))
}

impl OrderingConfig {
    pub fn cutoff_time(&self) -> Result<Option<NaiveTime>, config::ConfigError> {
        self.cutoff
            .as_deref()
            .map(|value| parse_time("ordering.cutoff", value))
            .transpose()
    }

    pub fn delivery_slot_time(&self) -> Result<NaiveTime, config::ConfigError> {
        parse_time("ordering.delivery_slot", &self.delivery_slot)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `POTLUCK__FULFILLMENT__DRY_RUN=true`
            .add_source(config::Environment::with_prefix("POTLUCK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
