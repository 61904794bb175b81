//! Settings management for oscrelay.
//!
//! The settings file stores the eight connection slots plus display
//! and logging options. Loading is forgiving: a missing file yields
//! defaults which are written back, and the connection list is always
//! normalized to exactly eight entries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::connection::{
    ConnectionConfig, HeartbeatConfig, OscArg, ProxyTarget, SettingsSink,
};
use crate::error::{Error, Result};
use crate::types::SlotId;
use crate::MAX_CONNECTIONS;

/// Everything persisted to the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    /// Show timestamps next to each displayed message.
    pub show_date_info: bool,

    /// Show every message as it arrives (vs. frequency summaries only).
    pub show_each_message: bool,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// The eight connection slots, in slot order.
    pub connections: Vec<ConnectionConfig>,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            show_date_info: true,
            show_each_message: true,
            logging: LoggingConfig::default(),
            connections: vec![ConnectionConfig::default(); MAX_CONNECTIONS],
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,

    /// Output format: "text" or "json".
    pub format: String,

    /// Enable ANSI colors.
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            color: true,
        }
    }
}

/// The settings collaborator: owns the on-disk file and hands
/// connection configs to the registry.
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    file: SettingsFile,
}

impl Settings {
    /// Load settings from `path`, creating the file with defaults if
    /// it does not exist yet.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            Self::load(path)
        } else {
            let settings = Self {
                path,
                file: SettingsFile::default(),
            };
            settings.save()?;
            Ok(settings)
        }
    }

    /// Load settings from an existing file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read settings: {e}")))?;

        let mut file: SettingsFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse settings: {e}")))?;
        normalize(&mut file);

        Ok(Self { path, file })
    }

    /// Write settings back to disk.
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(&self.file)
            .map_err(|e| Error::Config(format!("failed to serialize settings: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("failed to create settings dir: {e}")))?;
        }

        std::fs::write(&self.path, content)
            .map_err(|e| Error::Config(format!("failed to write settings: {e}")))?;

        Ok(())
    }

    /// Default settings path under the platform config directory.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "oscrelay", "oscrelay").map_or_else(
            || PathBuf::from("oscrelay.toml"),
            |dirs| dirs.config_dir().join("settings.toml"),
        )
    }

    /// All eight connection configs, in slot order.
    pub fn connections(&self) -> &[ConnectionConfig] {
        &self.file.connections
    }

    /// The config stored for `slot`.
    pub fn connection(&self, slot: SlotId) -> &ConnectionConfig {
        &self.file.connections[slot.index() - 1]
    }

    /// Replace the config stored for `slot` and persist.
    pub fn set_connection(&mut self, slot: SlotId, config: ConnectionConfig) -> Result<()> {
        self.file.connections[slot.index() - 1] = config;
        self.save()
    }

    /// Flip a slot's stored config to inactive and persist.
    pub fn mark_inactive(&mut self, slot: SlotId) -> Result<()> {
        self.file.connections[slot.index() - 1].active = false;
        self.save()
    }

    /// Display options and logging config.
    pub fn file(&self) -> &SettingsFile {
        &self.file
    }

    /// Example settings demonstrating every connection feature.
    pub fn example() -> SettingsFile {
        let mut file = SettingsFile::default();

        file.connections[0] = ConnectionConfig {
            name: Some("console".into()),
            active: true,
            port_in: Some(3333),
            port_out: Some(4444),
            proxy_pairs: vec![
                ProxyTarget {
                    address: "127.0.0.1".into(),
                    port: 5555,
                },
                ProxyTarget {
                    address: "10.0.0.20".into(),
                    port: 3333,
                },
            ],
            ..Default::default()
        };

        file.connections[1] = ConnectionConfig {
            name: Some("media server".into()),
            active: true,
            port_out: Some(8000),
            address_out: Some("10.0.0.30".into()),
            proxy_in: Some(ProxyTarget {
                address: "0.0.0.0".into(),
                port: 8001,
            }),
            heartbeat: Some(HeartbeatConfig {
                address: "/hello".into(),
                args: vec![OscArg::String("world".into())],
                every: Duration::from_secs(2),
            }),
            ..Default::default()
        };

        file
    }
}

/// A shared, lockable settings handle usable as the registry's
/// settings collaborator.
pub type SharedSettings = Arc<Mutex<Settings>>;

impl SettingsSink for Mutex<Settings> {
    fn mark_inactive(&self, slot: SlotId) {
        if let Err(e) = self.lock().mark_inactive(slot) {
            warn!(%slot, "failed to persist inactive flag: {e}");
        }
    }
}

/// Pad or truncate the connection list to exactly eight entries.
fn normalize(file: &mut SettingsFile) {
    file.connections
        .resize_with(MAX_CONNECTIONS, ConnectionConfig::default);
}

/// Initialize global logging from config.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Config(format!("failed to init logging: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_default_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let settings = Settings::load_or_default(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.connections().len(), MAX_CONNECTIONS);
        assert!(settings.connections().iter().all(|c| !c.active));
    }

    #[test]
    fn test_round_trip_connection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let slot = SlotId::new(3).unwrap();
        {
            let mut settings = Settings::load_or_default(&path).unwrap();
            settings
                .set_connection(
                    slot,
                    ConnectionConfig {
                        name: Some("desk".into()),
                        active: true,
                        port_in: Some(3333),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        let reloaded = Settings::load(&path).unwrap();
        let config = reloaded.connection(slot);
        assert_eq!(config.name.as_deref(), Some("desk"));
        assert!(config.active);
        assert_eq!(config.port_in, Some(3333));

        // The other slots stayed untouched.
        assert!(!reloaded.connection(SlotId::new(4).unwrap()).active);
    }

    #[test]
    fn test_short_connection_list_is_padded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        std::fs::write(
            &path,
            r#"
            [[connections]]
            name = "only one"
            active = true
            port_in = 3333
            "#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.connections().len(), MAX_CONNECTIONS);
        assert_eq!(
            settings.connection(SlotId::new(1).unwrap()).name.as_deref(),
            Some("only one")
        );
        assert!(!settings.connection(SlotId::new(8).unwrap()).active);
    }

    #[test]
    fn test_mark_inactive_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let slot = SlotId::new(5).unwrap();
        {
            let mut settings = Settings::load_or_default(&path).unwrap();
            settings
                .set_connection(
                    slot,
                    ConnectionConfig {
                        active: true,
                        port_in: Some(3333),
                        ..Default::default()
                    },
                )
                .unwrap();
            settings.mark_inactive(slot).unwrap();
        }

        let reloaded = Settings::load(&path).unwrap();
        assert!(!reloaded.connection(slot).active);
    }

    #[test]
    fn test_example_is_serializable() {
        let example = Settings::example();
        let text = toml::to_string_pretty(&example).unwrap();

        let parsed: SettingsFile = toml::from_str(&text).unwrap();
        assert_eq!(parsed.connections[0].port_in, Some(3333));
        assert!(parsed.connections[1].heartbeat.is_some());
    }
}
