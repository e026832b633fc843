//! Application settings and configuration

use chrono::NaiveDate;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use grid_common::error::ConfigurationError;

use crate::calendar::PeriodCalendar;
use crate::dataset::Dataset;
use crate::parser::Provider;
use crate::reference::AreaTable;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Period grid time zone
    #[serde(default)]
    pub calendar: CalendarSettings,
    /// Active areas
    #[serde(default)]
    pub areas: AreaSettings,
    /// Provider endpoints
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Chunking and window settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Writer settings
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgresql://localhost/grid".into())
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

/// Calendar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// IANA zone the period grid is anchored to
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Europe/Prague".to_string()
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl CalendarSettings {
    pub fn tz(&self) -> Result<Tz, ConfigurationError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigurationError::invalid("calendar.timezone", format!("unknown zone '{}'", self.timezone)))
    }
}

/// Area settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaSettings {
    /// Labels of areas to ingest; empty means all
    #[serde(default)]
    pub active: Vec<String>,
}

/// Provider-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub entsoe: EntsoeSettings,
    #[serde(default)]
    pub ceps: CepsSettings,
    #[serde(default)]
    pub ote: OteSettings,
    /// Attempts per document before the chunk fails
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            entsoe: EntsoeSettings::default(),
            ceps: CepsSettings::default(),
            ote: OteSettings::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// ENTSO-E Transparency Platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntsoeSettings {
    #[serde(default = "default_entsoe_url")]
    pub base_url: String,
    /// API security token
    #[serde(default, skip_serializing)]
    pub security_token: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_entsoe_url() -> String {
    "https://web-api.tp.entsoe.eu/api".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl Default for EntsoeSettings {
    fn default() -> Self {
        Self {
            base_url: default_entsoe_url(),
            security_token: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

/// CEPS web service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CepsSettings {
    #[serde(default = "default_ceps_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_ceps_endpoint() -> String {
    "https://www.ceps.cz/_layouts/CepsData.asmx".to_string()
}

impl Default for CepsSettings {
    fn default() -> Self {
        Self {
            endpoint: default_ceps_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

/// OTE download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OteSettings {
    /// Workbook URL with `{yyyy}`, `{mm}`, `{dd}` and `{file}` placeholders
    #[serde(default = "default_ote_template")]
    pub url_template: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_ote_template() -> String {
    "https://www.ote-cr.cz/pubweb/attachments/01/{yyyy}/month{mm}/day{dd}/{file}".to_string()
}

impl Default for OteSettings {
    fn default() -> Self {
        Self {
            url_template: default_ote_template(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Chunk sizes per provider, in days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDays {
    #[serde(default = "default_week")]
    pub entsoe: u32,
    #[serde(default = "default_week")]
    pub ceps: u32,
    #[serde(default = "default_day")]
    pub ote: u32,
}

fn default_week() -> u32 {
    7
}

fn default_day() -> u32 {
    1
}

impl Default for ChunkDays {
    fn default() -> Self {
        Self {
            entsoe: default_week(),
            ceps: default_week(),
            ote: default_day(),
        }
    }
}

impl ChunkDays {
    pub fn for_provider(&self, provider: Provider) -> u32 {
        match provider {
            Provider::Entsoe => self.entsoe,
            Provider::Ceps => self.ceps,
            Provider::Ote => self.ote,
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Normal-mode window length
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default)]
    pub chunk_days: ChunkDays,
    /// Upper bound for one chunk's fetch, parse and write
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: u64,
    /// Where auto mode starts when the table is empty
    #[serde(default = "default_earliest_date")]
    pub earliest_date: NaiveDate,
}

fn default_lookback_hours() -> u32 {
    3
}

fn default_chunk_timeout() -> u64 {
    300
}

fn default_earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            chunk_days: ChunkDays::default(),
            chunk_timeout_secs: default_chunk_timeout(),
            earliest_date: default_earliest_date(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Rows per INSERT statement
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// First year with partitions
    #[serde(default = "default_first_year")]
    pub partition_first_year: i32,
    /// Last year with partitions
    #[serde(default = "default_last_year")]
    pub partition_last_year: i32,
}

fn default_batch_size() -> usize {
    1000
}

fn default_first_year() -> i32 {
    2024
}

fn default_last_year() -> i32 {
    2028
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            partition_first_year: default_first_year(),
            partition_last_year: default_last_year(),
        }
    }
}

impl StorageSettings {
    pub fn partition_years(&self) -> RangeInclusive<i32> {
        self.partition_first_year..=self.partition_last_year
    }
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("GRID_INGEST")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // e.g. GRID_INGEST__PROVIDER__ENTSOE__SECURITY_TOKEN
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("GRID_INGEST_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Check values a run depends on.
    ///
    /// `dataset` is the dataset about to run, if any; the ENTSO-E token is only
    /// required for ENTSO-E datasets.
    pub fn validate(&self, dataset: Option<Dataset>) -> Result<(), ConfigurationError> {
        self.calendar.tz()?;
        self.area_table()?;

        let chunks = &self.scheduler.chunk_days;
        for (field, days) in [
            ("scheduler.chunk_days.entsoe", chunks.entsoe),
            ("scheduler.chunk_days.ceps", chunks.ceps),
            ("scheduler.chunk_days.ote", chunks.ote),
        ] {
            if days == 0 {
                return Err(ConfigurationError::invalid(field, "must be at least one day"));
            }
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigurationError::invalid(
                "database.min_connections",
                format!(
                    "{} exceeds max_connections {}",
                    self.database.min_connections, self.database.max_connections
                ),
            ));
        }

        if self.storage.partition_first_year > self.storage.partition_last_year {
            return Err(ConfigurationError::invalid(
                "storage.partition_first_year",
                "after partition_last_year",
            ));
        }

        if dataset.map(Dataset::provider) == Some(Provider::Entsoe)
            && self.provider.entsoe.security_token.trim().is_empty()
        {
            return Err(ConfigurationError::MissingField(
                "provider.entsoe.security_token".to_string(),
            ));
        }

        Ok(())
    }

    pub fn calendar(&self) -> Result<PeriodCalendar, ConfigurationError> {
        Ok(PeriodCalendar::new(self.calendar.tz()?))
    }

    pub fn area_table(&self) -> Result<AreaTable, ConfigurationError> {
        AreaTable::standard().with_active(&self.areas.active)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            calendar: CalendarSettings::default(),
            areas: AreaSettings::default(),
            provider: ProviderSettings::default(),
            scheduler: SchedulerSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}
