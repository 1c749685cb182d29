//! Server configuration from environment variables

use crate::recording::{DEFAULT_CHANNELS, DEFAULT_MAX_RECORDING_BYTES, DEFAULT_SAMPLE_RATE};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub recordings_dir: PathBuf,
    pub recording_enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
    /// Buffered call audio beyond this is dropped
    pub max_recording_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            recordings_dir: PathBuf::from("recordings"),
            recording_enabled: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            max_recording_bytes: DEFAULT_MAX_RECORDING_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind: parse_var(&lookup, "COUNSEL_BIND")?.unwrap_or(defaults.bind),
            port: parse_var(&lookup, "COUNSEL_PORT")?.unwrap_or(defaults.port),
            recordings_dir: lookup("COUNSEL_RECORDINGS_DIR")
                .map_or(defaults.recordings_dir, PathBuf::from),
            recording_enabled: parse_bool(&lookup, "COUNSEL_RECORDING_ENABLED")?
                .unwrap_or(defaults.recording_enabled),
            sample_rate: parse_var(&lookup, "COUNSEL_SAMPLE_RATE")?.unwrap_or(defaults.sample_rate),
            channels: parse_var(&lookup, "COUNSEL_CHANNELS")?.unwrap_or(defaults.channels),
            max_recording_bytes: parse_var(&lookup, "COUNSEL_MAX_RECORDING_BYTES")?
                .unwrap_or(defaults.max_recording_bytes),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<bool>, ConfigError> {
    lookup(var)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:8765");
        assert_eq!(cfg.sample_rate, 8000);
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.max_recording_bytes, 57_600_000);
    }

    #[test]
    fn test_overrides_applied() {
        let cfg = config(&[
            ("COUNSEL_BIND", "127.0.0.1"),
            ("COUNSEL_PORT", "9000"),
            ("COUNSEL_RECORDINGS_DIR", "/tmp/calls"),
            ("COUNSEL_RECORDING_ENABLED", "off"),
            ("COUNSEL_SAMPLE_RATE", "16000"),
            ("COUNSEL_CHANNELS", "2"),
            ("COUNSEL_MAX_RECORDING_BYTES", "1024"),
        ])
        .unwrap();

        assert_eq!(cfg.addr().to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.recordings_dir, PathBuf::from("/tmp/calls"));
        assert!(!cfg.recording_enabled);
        assert_eq!(cfg.sample_rate, 16000);
        assert_eq!(cfg.channels, 2);
        assert_eq!(cfg.max_recording_bytes, 1024);
    }

    #[test]
    fn test_invalid_number_is_error() {
        assert_eq!(
            config(&[("COUNSEL_PORT", "eighty")]).unwrap_err(),
            ConfigError::Invalid {
                var: "COUNSEL_PORT",
                value: "eighty".to_string()
            }
        );
        assert!(config(&[("COUNSEL_CHANNELS", "-1")]).is_err());
        assert!(config(&[("COUNSEL_RECORDING_ENABLED", "maybe")]).is_err());
        assert!(config(&[("COUNSEL_MAX_RECORDING_BYTES", "1GB")]).is_err());
    }
}
