//! Dongle configuration
//!
//! Stored as TOML under the user config directory. Every field has a
//! default, so a partial file (or none at all) is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::playback::DEFAULT_FILE_PACING_MS;
use crate::script::DEFAULT_STEP_BUDGET;
use crate::security::AccessCodes;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DongleConfig {
    /// Name reported by ABOUT
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Key-value store file (credentials, login code, boot flags)
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Directory standing in for the SD card
    #[serde(default = "default_macro_dir")]
    pub macro_dir: PathBuf,
    /// Type unrecognized BLE lines on the USB host
    #[serde(default = "default_true")]
    pub dual_relay: bool,
    /// Default per-character delay for macro text (ms)
    #[serde(default = "default_typing_speed")]
    pub typing_speed_ms: u32,
    /// Per-byte delay when a file is typed raw (ms)
    #[serde(default = "default_file_pacing")]
    pub file_pacing_ms: u32,
    /// BLE lines handled per poll before buttons and serial get a turn
    #[serde(default = "default_ble_drain_cap")]
    pub ble_drain_cap: usize,
    /// BLE notification size (bytes)
    #[serde(default = "default_ble_chunk_size")]
    pub ble_chunk_size: usize,
    /// Instruction limit for one advanced script run
    #[serde(default = "default_step_budget")]
    pub script_step_budget: u64,
    /// Address the simulated BLE link listens on
    #[serde(default = "default_ble_addr")]
    pub ble_addr: String,
    #[serde(default)]
    pub codes: AccessCodes,
}

fn default_device_name() -> String {
    "PWDongle".to_string()
}
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pwdongle")
}
fn default_store_path() -> PathBuf {
    default_data_dir().join("store.json")
}
fn default_macro_dir() -> PathBuf {
    default_data_dir().join("macros")
}
fn default_true() -> bool {
    true
}
fn default_typing_speed() -> u32 {
    10
}
fn default_file_pacing() -> u32 {
    DEFAULT_FILE_PACING_MS
}
fn default_ble_drain_cap() -> usize {
    4
}
fn default_ble_chunk_size() -> usize {
    pwdongle_transport::BLE_CHUNK_SIZE
}
fn default_step_budget() -> u64 {
    DEFAULT_STEP_BUDGET
}
fn default_ble_addr() -> String {
    "127.0.0.1:7878".to_string()
}

impl Default for DongleConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            store_path: default_store_path(),
            macro_dir: default_macro_dir(),
            dual_relay: true,
            typing_speed_ms: default_typing_speed(),
            file_pacing_ms: default_file_pacing(),
            ble_drain_cap: default_ble_drain_cap(),
            ble_chunk_size: default_ble_chunk_size(),
            script_step_budget: default_step_budget(),
            ble_addr: default_ble_addr(),
            codes: AccessCodes::default(),
        }
    }
}

impl DongleConfig {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pwdongle")
            .join("config.toml")
    }

    /// Load from `path`, or defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }
}
