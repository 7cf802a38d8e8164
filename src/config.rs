use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::protocol::DEFAULT_DEVICE;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub sweep: SweepConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    pub host: String,
    pub port: u16,
    pub device: String,
}

/// Sweep tuning. The delay and band values are the empirically determined
/// settings for the SIS junction on the standard bias rack; the bands mark
/// a device transition around +/-2.3 mV where readings need extra settling.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SweepConfig {
    pub settle_delay_ms: u64,
    pub current_poll_delay_ms: u64,
    pub reflection_poll_delay_ms: u64,
    /// Lower and upper bound of the instability band, in volts. The band is
    /// mirrored around zero and both comparisons are strict.
    pub instability_band_v: [f64; 2],
    /// Attempts before a persistently unparseable current reading becomes an
    /// error. 0 retries forever.
    pub max_parse_retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig::default(),
            sweep: SweepConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9876,
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 200,
            current_poll_delay_ms: 100,
            reflection_poll_delay_ms: 200,
            instability_band_v: [2.1e-3, 2.5e-3],
            max_parse_retries: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl SweepConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn current_poll_delay(&self) -> Duration {
        Duration::from_millis(self.current_poll_delay_ms)
    }

    pub fn reflection_poll_delay(&self) -> Duration {
        Duration::from_millis(self.reflection_poll_delay_ms)
    }

    /// True when `volt` falls strictly inside the mirrored instability band.
    pub fn in_instability_band(&self, volt: f64) -> bool {
        let [lower, upper] = self.instability_band_v;
        (volt > lower && volt < upper) || (volt > -upper && volt < -lower)
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else if Path::new("config.toml").exists() {
        builder = builder.add_source(File::with_name("config.toml"));
    }

    // Add environment variable overrides with prefix "BLOCK_SWEEP_"
    builder = builder.add_source(
        Environment::with_prefix("BLOCK_SWEEP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration with better error handling and defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}
