use crate::error::{DepotError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// FleetConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default = "default_service_interval")]
    pub service_interval_days: u32,
    /// Whether a service event sets an inactive resource back to active.
    #[serde(default)]
    pub reactivate_on_service: bool,
}

fn default_service_interval() -> u32 {
    30
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            service_interval_days: default_service_interval(),
            reactivate_on_service: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ScannerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_lookahead")]
    pub lookahead_days: u32,
}

fn default_poll_interval() -> u64 {
    24 * 60 * 60
}

fn default_lookahead() -> u32 {
    7
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            lookahead_days: default_lookahead(),
        }
    }
}

impl ScannerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Database file, relative to the project root unless absolute.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

fn default_version() -> u32 {
    1
}

fn default_database() -> PathBuf {
    PathBuf::from(paths::DATABASE_FILE)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: default_database(),
            fleet: FleetConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(DepotError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        crate::io::atomic_write(&path, self.to_yaml()?.as_bytes())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        root.join(&self.database)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.fleet.service_interval_days == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "fleet.service_interval_days is 0: every resource is due the day it is serviced".into(),
            });
        }

        if self.scanner.poll_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "scanner.poll_interval_secs must be greater than 0".into(),
            });
        } else if self.scanner.poll_interval_secs < 60 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "scanner.poll_interval_secs={} (<60 is unusual)",
                    self.scanner.poll_interval_secs
                ),
            });
        }

        if self.scanner.lookahead_days > self.fleet.service_interval_days
            && self.fleet.service_interval_days > 0
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "scanner.lookahead_days={} exceeds fleet.service_interval_days={}: \
                     resources are flagged as soon as they are serviced",
                    self.scanner.lookahead_days, self.fleet.service_interval_days
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
