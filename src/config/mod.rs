// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::session::{
    DeviceTarget, LineFraming, SessionOptions, DEFAULT_DELIMITER, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_READ_CHUNK_SIZE,
};
use crate::transport::rfcomm::DEFAULT_RFCOMM_CHANNEL;

const APP_DIR: &str = "bluetooth-viewer";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Line framing and read settings.
    pub session: SessionConfig,

    /// Conversation view settings.
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// RFCOMM channel to connect on.
    pub channel: u8,

    /// Power on the adapter at startup if it is off.
    pub power_on_adapter: bool,

    /// Address to connect to when none is given on the command line.
    pub default_device: Option<String>,

    /// Display name for the default device.
    pub default_device_name: Option<String>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_RFCOMM_CHANNEL,
            power_on_adapter: true,
            default_device: None,
            default_device_name: None,
        }
    }
}

impl BluetoothConfig {
    /// The configured default device, if any.
    pub fn default_target(&self) -> Option<DeviceTarget> {
        let id = self.default_device.as_deref()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(match self.default_device_name.as_deref() {
            Some(name) if !name.trim().is_empty() => DeviceTarget::new(id, name.trim()),
            _ => DeviceTarget::from_id(id),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Byte value that terminates a line (10 = `\n`).
    pub line_delimiter: u8,

    /// Drop a `\r` in front of the delimiter.
    pub trim_carriage_return: bool,

    /// Longest unterminated line kept in memory.
    pub max_line_length: usize,

    /// Bytes requested per read.
    pub read_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_delimiter: DEFAULT_DELIMITER,
            trim_carriage_return: true,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn to_options(&self) -> SessionOptions {
        SessionOptions {
            framing: LineFraming {
                delimiter: self.line_delimiter,
                trim_carriage_return: self.trim_carriage_return,
                max_line_length: self.max_line_length.max(1),
            },
            read_chunk_size: self.read_chunk_size.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Scroll-back length of the conversation log.
    pub max_log_lines: usize,

    /// Start the log with the welcome text.
    pub show_welcome: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_log_lines: 500,
            show_welcome: true,
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            info!("Configuration loaded from {:?}", path);
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            info!("Default configuration written to {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
