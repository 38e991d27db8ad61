//! Configuration handling for the relay server.
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, a YAML config file, and environment variables. CLI flags
//! (handled in `main.rs`) override all three.

use anyhow::Result;
use relay_session::RelayMode;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// TCP port to listen on
    pub listen_port: u16,
    /// Listen backlog
    pub backlog: u32,
    /// Relay discipline applied to every session
    pub mode: RelayMode,
    /// Upper bound on the bytes read per relay step
    pub read_buffer_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            backlog: 10,
            mode: RelayMode::Unordered,
            read_buffer_bytes: 1024,
        }
    }
}

/// Root configuration structure (matches the YAML layout)
#[derive(Debug, Deserialize)]
struct RootConfig {
    listen: Option<ListenSection>,
    relay: Option<RelaySection>,
}

#[derive(Debug, Deserialize)]
struct ListenSection {
    port: Option<u16>,
    backlog: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RelaySection {
    mode: Option<String>,
    read_buffer_bytes: Option<usize>,
}

impl RelayConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(content) = std::fs::read_to_string(&config_path) {
            match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    config.apply_root_config(root)?;
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(_) => {
                    warn!(
                        "Failed to parse config file {:?}, using defaults",
                        config_path.as_ref()
                    );
                }
            }
        } else {
            warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            );
        }

        config.apply_environment_overrides();

        info!(
            "Final relay configuration: listen_port={}, backlog={}, mode={}, read_buffer_bytes={}",
            config.listen_port, config.backlog, config.mode, config.read_buffer_bytes
        );

        Ok(config)
    }

    fn apply_root_config(&mut self, root: RootConfig) -> Result<()> {
        if let Some(listen) = root.listen {
            if let Some(port) = listen.port {
                self.listen_port = port;
            }
            if let Some(backlog) = listen.backlog {
                self.backlog = backlog;
            }
        }
        if let Some(relay) = root.relay {
            if let Some(mode) = relay.mode {
                self.mode = mode.parse().map_err(anyhow::Error::msg)?;
            }
            if let Some(bytes) = relay.read_buffer_bytes {
                self.read_buffer_bytes = bytes;
            }
        }
        Ok(())
    }

    fn apply_environment_overrides(&mut self) {
        if let Ok(port) = std::env::var("RELAY_LISTEN_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.listen_port = port;
                info!("Listen port overridden by environment: {}", port);
            }
        }

        if let Ok(backlog) = std::env::var("RELAY_BACKLOG") {
            if let Ok(backlog) = backlog.parse::<u32>() {
                self.backlog = backlog;
                info!("Backlog overridden by environment: {}", backlog);
            }
        }

        if let Ok(mode) = std::env::var("RELAY_MODE") {
            match mode.parse::<RelayMode>() {
                Ok(mode) => {
                    self.mode = mode;
                    info!("Relay mode overridden by environment: {}", mode);
                }
                Err(e) => warn!("Ignoring RELAY_MODE: {e}"),
            }
        }

        if let Ok(bytes) = std::env::var("RELAY_READ_BUFFER_BYTES") {
            if let Ok(bytes) = bytes.parse::<usize>() {
                self.read_buffer_bytes = bytes;
                info!("Read buffer size overridden by environment: {}", bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.backlog, 10);
        assert_eq!(config.mode, RelayMode::Unordered);
        assert_eq!(config.read_buffer_bytes, 1024);
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
listen:
  port: 9090
  backlog: 64

relay:
  mode: turn-based
  read_buffer_bytes: 4096
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = RelayConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.backlog, 64);
        assert_eq!(config.mode, RelayMode::TurnBased);
        assert_eq!(config.read_buffer_bytes, 4096);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let yaml_content = r#"
listen:
  port: 7000
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = RelayConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.listen_port, 7000);
        assert_eq!(config.backlog, 10);
        assert_eq!(config.mode, RelayMode::Unordered);
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        let yaml_content = r#"
relay:
  mode: round-robin
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        assert!(RelayConfig::load_from_file(temp_file.path()).is_err());
    }
}
