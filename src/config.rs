use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::estimate::PercentCurve;
use crate::monitor::Sampling;
use crate::profile::{ByteOrder, ChipProfile, Revision, VoltageScale};
use crate::registers::{CHIP_ADDRESS, DEFAULT_BUS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub chip: ChipConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus")]
    pub index: u8,
    #[serde(default = "default_address")]
    pub address: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChipConfig {
    #[serde(default = "default_revision")]
    pub revision: Revision,
    // Per-field overrides on top of the revision preset
    #[serde(default)]
    pub byte_order: Option<ByteOrder>,
    #[serde(default)]
    pub scale: Option<VoltageScale>,
    #[serde(default)]
    pub curve: Option<PercentCurve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_sample_delay_ms")]
    pub sample_delay_ms: u64,
    #[serde(default = "default_block_delay_ms")]
    pub block_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_dump_path")]
    pub dump_path: PathBuf,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

// Defaults

fn default_bus() -> u8 { DEFAULT_BUS }
fn default_address() -> u16 { CHIP_ADDRESS }
fn default_revision() -> Revision { Revision::Tuned }
fn default_samples() -> usize { 10 }
fn default_sample_delay_ms() -> u64 { 50 }
fn default_block_delay_ms() -> u64 { 100 }
fn default_log_path() -> PathBuf { data_path().join("LogVoltage.csv") }
fn default_dump_path() -> PathBuf { data_path().join("LiveLogVoltage.csv") }
fn default_interval() -> u64 { 300 }

// Implementations

impl Default for BusConfig {
    fn default() -> Self {
        Self { index: default_bus(), address: default_address() }
    }
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self { revision: default_revision(), byte_order: None, scale: None, curve: None }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            sample_delay_ms: default_sample_delay_ms(),
            block_delay_ms: default_block_delay_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            dump_path: default_dump_path(),
            interval_secs: default_interval(),
        }
    }
}

impl ChipConfig {
    /// The revision preset with any explicit overrides applied.
    pub fn profile(&self) -> ChipProfile {
        let mut profile = self.revision.profile();
        if let Some(order) = self.byte_order {
            profile.byte_order = order;
        }
        if let Some(scale) = self.scale {
            profile.scale = scale;
        }
        if let Some(curve) = self.curve {
            profile.curve = curve;
        }
        profile
    }
}

impl SamplingConfig {
    pub fn sampling(&self) -> Sampling {
        Sampling {
            samples: self.samples,
            sample_delay: Duration::from_millis(self.sample_delay_ms),
            block_delay: Duration::from_millis(self.block_delay_ms),
        }
    }
}

impl LogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.sampling.samples > 0, "sampling.samples must be at least 1");
        anyhow::ensure!(self.log.interval_secs > 0, "log.interval_secs must be at least 1");
        anyhow::ensure!(
            self.bus.address <= 0x7F,
            "bus.address 0x{:X} is not a 7-bit address",
            self.bus.address
        );
        self.chip.profile().curve.validate().map_err(anyhow::Error::msg)?;
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"));
    base.join("pisugar-monitor")
}

fn data_path() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local/share"));
    base.join("pisugar-monitor")
}

fn home() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".into()))
}

pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        log::info!("Config file not found at {}, generating default", path.display());
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::write(path, generate_default_config()) {
            Ok(()) => log::info!("Created default config at {}", path.display()),
            Err(e) => log::warn!("Failed to write default config: {}", e),
        }
        return Ok(MonitorConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: MonitorConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}

fn generate_default_config() -> &'static str {
    r#"# pisugar-monitor configuration
# Generated automatically on first run. Defaults are shown.

[bus]
# I2C bus number (/dev/i2c-N)
index   = 1
# Chip address
address = 0x57

[chip]
# Board revision preset: "original" | "tuned" | "exponential"
#   original    - mV, high byte at 0x22, linear 2.1 V .. 4.2 V
#   tuned       - mV, high byte at 0x22, linear 3.1 V .. 4.2 V
#   exponential - 0.1 mV, high byte at 0x23, piecewise curve
revision = "tuned"
# Overrides, applied on top of the preset. Verify against your hardware.
# byte_order = "high-first"   # or "low-first"
# scale = 1000                # or 10000
# curve = { kind = "linear", v_min = 3.1, v_range = 1.1 }
# curve = { kind = "piecewise" }

[sampling]
# Reads averaged per voltage/energy value
samples         = 10
# Settling time between samples (ms)
sample_delay_ms = 50
# Pause before each 32-byte block of a register dump (ms)
block_delay_ms  = 100

[log]
# Reading log, appended by `log` and `watch`
# path = "~/.local/share/pisugar-monitor/LogVoltage.csv"
# Register dump log, appended by `watch --dump`
# dump_path = "~/.local/share/pisugar-monitor/LiveLogVoltage.csv"
# Poll interval for `watch` (seconds)
interval_secs = 300
"#
}
