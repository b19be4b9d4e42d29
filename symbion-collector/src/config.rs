use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

pub const CONFIG_ENV: &str = "SYMBION_COLLECTOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "collector.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Age beyond which an ingested report is dropped from the window.
    pub window_secs: u64,
    pub mqtt: MqttConf,
    pub capture: CaptureConf,
    pub probe: ProbeConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub reports_topic: String,
    pub packets_topic: String,
    pub controls_topic: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CaptureConf {
    pub queue_capacity: usize,
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConf {
    pub interval_secs: u64,
    /// Generated at startup when absent.
    pub id: Option<String>,
    /// Send local reports through the broker instead of straight to the
    /// in-process collector.
    pub publish: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            window_secs: 15,
            mqtt: MqttConf::default(),
            capture: CaptureConf::default(),
            probe: ProbeConf::default(),
        }
    }
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "symbion-collector".into(),
            reports_topic: "symbion/reports@v1".into(),
            packets_topic: "symbion/packets@v1".into(),
            controls_topic: "symbion/controls@v1".into(),
        }
    }
}

impl Default for CaptureConf {
    fn default() -> Self {
        Self { queue_capacity: 1024, enabled: true }
    }
}

impl Default for ProbeConf {
    fn default() -> Self {
        Self { interval_secs: 3, id: None, publish: false }
    }
}

impl CollectorConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid("window_secs must be > 0".into()));
        }
        if self.capture.queue_capacity == 0 {
            return Err(ConfigError::Invalid("capture.queue_capacity must be > 0".into()));
        }
        if self.probe.interval_secs == 0 {
            return Err(ConfigError::Invalid("probe.interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// Strict loading: a missing or empty file gives the defaults, anything
/// unreadable or invalid is an error.
pub async fn load_config_from(path: impl AsRef<Path>) -> Result<CollectorConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("[collector] pas de {}, usage config par défaut", path.display());
        return Ok(CollectorConfig::default());
    }
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(CollectorConfig::default());
    }
    let cfg: CollectorConfig = serde_yaml::from_str(&txt)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Path from `SYMBION_COLLECTOR_CONFIG`, falling back to the defaults on any
/// error.
pub async fn load_config() -> CollectorConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_config_from(&path).await.unwrap_or_else(|e| {
        warn!("[collector] {e}, usage config par défaut");
        CollectorConfig::default()
    })
}
