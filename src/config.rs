use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ipc::ChannelAddr;
use crate::resilience::RecoveryPolicy;
use crate::shm::SharedFrameBuffer;

pub const DEFAULT_CONFIG_PATH: &str = "ptamlink.json";
pub const CONFIG_PATH_ENV: &str = "PTAMLINK_CONFIG";

/// Start-up settings. Loaded once and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Channel the HUB signals frame readiness on
    pub hub_channel: String,

    /// Channel the Modeler listens for reports on
    pub modeler_channel: String,

    /// Shared memory segment holding the current frame
    pub frame_buffer: String,

    pub start_hidden: bool,

    /// Directory for Unix domain sockets
    pub runtime_dir: PathBuf,

    /// Directory backing shared memory segments on Unix
    pub shm_dir: PathBuf,

    /// Upper bound for every blocking channel wait; unbounded when absent
    pub wait_timeout_ms: Option<u64>,

    pub error_pause_ms: u64,

    pub park_interval_ms: u64,

    /// Cycles between metrics summaries in the log, 0 disables them
    pub metrics_log_interval: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            hub_channel: "PTAMHubNotifier".to_string(),
            modeler_channel: "PTAMModelerNotifier".to_string(),
            frame_buffer: "PTAMFrameBuffer".to_string(),
            start_hidden: false,
            runtime_dir: std::env::temp_dir(),
            shm_dir: default_shm_dir(),
            wait_timeout_ms: None,
            error_pause_ms: 0,
            park_interval_ms: 100,
            metrics_log_interval: 300,
        }
    }
}

fn default_shm_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from("/dev/shm")
    } else {
        std::env::temp_dir()
    }
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config: BridgeConfig =
            serde_json::from_str(&json).context("Failed to deserialize config")?;
        config.validate()?;

        Ok(config)
    }

    /// Load the file, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(?path, "config file not found, using defaults");
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(?path, error = format!("{e:#}"), "invalid config, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("hub_channel", &self.hub_channel),
            ("modeler_channel", &self.modeler_channel),
            ("frame_buffer", &self.frame_buffer),
        ] {
            ensure!(!value.trim().is_empty(), "{} must not be empty", field);
            ensure!(
                !value.contains(['/', '\\']),
                "{} must be a bare name, got '{}'",
                field,
                value
            );
        }
        ensure!(
            self.hub_channel != self.modeler_channel,
            "hub_channel and modeler_channel must differ"
        );
        Ok(())
    }

    pub fn hub_addr(&self) -> ChannelAddr {
        ChannelAddr::new(&self.hub_channel, &self.runtime_dir)
    }

    pub fn modeler_addr(&self) -> ChannelAddr {
        ChannelAddr::new(&self.modeler_channel, &self.runtime_dir)
    }

    pub fn frame_buffer(&self) -> SharedFrameBuffer {
        SharedFrameBuffer::new(&self.frame_buffer, &self.shm_dir)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        RecoveryPolicy::from_pause_ms(self.error_pause_ms)
    }

    pub fn park_interval(&self) -> Duration {
        Duration::from_millis(self.park_interval_ms)
    }
}
