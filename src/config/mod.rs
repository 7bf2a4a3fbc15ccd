use crate::errors::{Result, StoreError};
use crate::infrastructure::logging::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

pub const CONFIG_FILE_NAME: &str = ".material-store.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 0 = available parallelism
    #[serde(default)]
    pub workers: usize,

    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// JSON catalog file
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub autosave_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            filter: None,
        }
    }
}

fn default_grace_period_ms() -> u64 { 5000 }
fn default_level() -> String { "info".to_string() }

impl PoolConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl PersistenceConfig {
    /// Autosave interval, if autosave is enabled and a path is set
    pub fn autosave_interval(&self) -> Option<Duration> {
        match (&self.path, self.autosave_interval_secs) {
            (Some(_), Some(secs)) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level: Level = self
            .level
            .parse()
            .map_err(|_| StoreError::Config(format!("unknown log level '{}'", self.level)))?;

        let mut config = LogConfig::new().with_level(level).with_format(self.format);
        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.clone());
        }
        Ok(config)
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(format!("failed to parse config: {}", e)))
    }

    /// Find `.material-store.toml` in the current directory or its parents.
    /// Falls back to defaults when none is found or it fails to load.
    pub fn discover() -> Self {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::discover_from(&dir))
            .unwrap_or_default()
    }

    pub fn discover_from(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
            .find_map(|path| Self::load(&path).ok())
    }

    /// Default configuration as TOML
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::Config(format!("failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }
}
