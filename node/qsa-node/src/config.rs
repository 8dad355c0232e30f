use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use qsa_device_coupler::{PathTranslator, DEFAULT_RECV_PORT, DEFAULT_SEND_PORT};
use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};
use qsa_serial_store::{CapacityThresholds, DEFAULT_CRITICAL_THRESHOLD, DEFAULT_WARNING_THRESHOLD};
use qsa_svg_composer::{ComposerSettings, Rotation};
use qsa_workflow::Caller;
use serde::Deserialize;

/// The node's TOML configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Database location.
    pub storage: StorageConfig,
    /// RPC bind address.
    pub rpc: RpcConfig,
    /// Serial capacity thresholds.
    #[serde(default)]
    pub serials: SerialsConfig,
    /// Workstation coupling.
    pub device: DeviceSection,
    /// Artwork generation.
    pub svg: SvgConfig,
    /// Public lookup rate limiting.
    #[serde(default)]
    pub lookup: LookupConfig,
    /// Auth token table.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Optional host-catalog JSON export consumed by modules-awaiting.
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
}

/// Database location.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
}

/// RPC bind address.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Bind host.
    pub bind_host: String,
    /// Bind port.
    pub bind_port: u16,
}

/// Serial capacity thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialsConfig {
    /// Remaining serials that raise the warning flag.
    pub warning_threshold: u32,
    /// Remaining serials that raise the critical flag.
    pub critical_threshold: u32,
}

impl Default for SerialsConfig {
    fn default() -> Self {
        Self {
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

/// Workstation coupling section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    /// Master switch.
    pub enabled: bool,
    /// Workstation IP address.
    pub host: String,
    /// LOADFILE port.
    #[serde(default = "default_send_port")]
    pub send_port: u16,
    /// Probe port.
    #[serde(default = "default_recv_port")]
    pub recv_port: u16,
    /// Probe timeout in seconds, 1-30.
    #[serde(default = "default_udp_timeout")]
    pub udp_timeout_seconds: u64,
}

fn default_send_port() -> u16 {
    DEFAULT_SEND_PORT
}

fn default_recv_port() -> u16 {
    DEFAULT_RECV_PORT
}

fn default_udp_timeout() -> u64 {
    qsa_device_coupler::DEFAULT_TIMEOUT_SECS
}

/// Artwork generation section.
#[derive(Debug, Clone, Deserialize)]
pub struct SvgConfig {
    /// Directory generated documents land in.
    pub output_dir: PathBuf,
    /// Server-side prefix stripped before shipping paths.
    #[serde(default)]
    pub path_prefix_local: Option<String>,
    /// Workstation-side prefix prepended in its place.
    #[serde(default)]
    pub path_prefix_remote: Option<String>,
    /// Whole-document rotation in degrees: 0, 90, 180 or 270.
    #[serde(default)]
    pub rotation: u16,
    /// Vertical nudge in millimeters, −5…+5.
    #[serde(default)]
    pub top_offset: f64,
    /// LED-code tracking factor, 0.5…3.0.
    #[serde(default = "default_tracking")]
    pub led_code_tracking: f64,
    /// Keep generated files after batch completion.
    #[serde(default)]
    pub keep_svg_files: bool,
    /// Ship artwork to the workstation right after generation.
    #[serde(default)]
    pub auto_load: bool,
}

fn default_tracking() -> f64 {
    1.0
}

/// Public lookup rate limiting.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    /// Window length in seconds.
    pub window_seconds: u64,
    /// Requests allowed per window per source.
    pub max_requests: u32,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            window_seconds: qsa_workflow::DEFAULT_WINDOW_SECS,
            max_requests: qsa_workflow::DEFAULT_MAX_REQUESTS,
        }
    }
}

/// Auth token table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Known tokens and their callers.
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

/// One auth token entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    /// The token value presented by the host.
    pub token: String,
    /// Operator name recorded on reservations.
    pub name: String,
    /// May drive the engraving workflow.
    #[serde(default)]
    pub can_engrave: bool,
    /// May read full traceability records.
    #[serde(default)]
    pub staff: bool,
}

impl NodeConfig {
    /// The workstation address, validated as an IP literal.
    pub fn device_host(&self) -> WorkflowResult<IpAddr> {
        self.device.host.parse().map_err(|_| {
            WorkflowError::validation(
                ErrorCode::InvalidIp,
                format!("'{}' is not an IPv4/IPv6 address", self.device.host),
            )
        })
    }

    /// The validated composition settings.
    pub fn composer_settings(&self) -> WorkflowResult<ComposerSettings> {
        let rotation = Rotation::from_degrees(self.svg.rotation)?;
        ComposerSettings::new(rotation, self.svg.top_offset, self.svg.led_code_tracking)
    }

    /// The validated capacity thresholds.
    pub fn capacity_thresholds(&self) -> CapacityThresholds {
        CapacityThresholds {
            warning: self.serials.warning_threshold,
            critical: self.serials.critical_threshold,
        }
    }

    /// The path translator for LOADFILE commands.
    pub fn path_translator(&self) -> PathTranslator {
        PathTranslator {
            local_prefix: self.svg.path_prefix_local.clone(),
            remote_prefix: self.svg.path_prefix_remote.clone(),
        }
    }

    /// The auth token table keyed for resolution.
    pub fn token_table(&self) -> HashMap<String, Caller> {
        self.auth
            .tokens
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    Caller {
                        name: entry.name.clone(),
                        can_engrave: entry.can_engrave,
                        staff: entry.staff,
                    },
                )
            })
            .collect()
    }
}

/// Reads and parses the TOML configuration at `path`.
pub fn from_toml_path(path: impl AsRef<Path>) -> anyhow::Result<NodeConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
        [storage]
        db_path = "/tmp/engrave.db"
        [rpc]
        bind_host = "127.0.0.1"
        bind_port = 8745
        [device]
        enabled = true
        host = "192.168.7.50"
        [svg]
        output_dir = "/tmp/svg"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let file = config_file(MINIMAL);
        let config = from_toml_path(file.path()).unwrap();

        assert_eq!(config.device.send_port, 19840);
        assert_eq!(config.device.recv_port, 19841);
        assert_eq!(config.device.udp_timeout_seconds, 5);
        assert_eq!(config.serials.warning_threshold, 10_000);
        assert_eq!(config.serials.critical_threshold, 1_000);
        assert_eq!(config.lookup.max_requests, 30);
        assert!(config.auth.tokens.is_empty());
        assert!(config.catalog_file.is_none());

        config.device_host().unwrap();
        let settings = config.composer_settings().unwrap();
        assert_eq!(settings, ComposerSettings::default());
    }

    #[test]
    fn full_config_round_trips() {
        let file = config_file(
            r#"
            catalog_file = "/var/lib/qsa/awaiting.json"
            [storage]
            db_path = "/var/lib/qsa/engrave.db"
            [rpc]
            bind_host = "0.0.0.0"
            bind_port = 9000
            [serials]
            warning_threshold = 20000
            critical_threshold = 2000
            [device]
            enabled = true
            host = "10.0.0.9"
            send_port = 20000
            recv_port = 20001
            udp_timeout_seconds = 10
            [svg]
            output_dir = "/var/lib/qsa/svg"
            path_prefix_local = "/var/lib/qsa/svg/"
            path_prefix_remote = "Z:/engrave/"
            rotation = 180
            top_offset = 1.5
            led_code_tracking = 1.5
            keep_svg_files = true
            auto_load = true
            [lookup]
            window_seconds = 30
            max_requests = 10
            [[auth.tokens]]
            token = "secret"
            name = "jane"
            can_engrave = true
            staff = true
        "#,
        );
        let config = from_toml_path(file.path()).unwrap();

        assert_eq!(config.svg.rotation, 180);
        assert!(config.svg.auto_load);
        let table = config.token_table();
        assert!(table["secret"].staff);
        let translator = config.path_translator();
        assert_eq!(
            translator.translate("/var/lib/qsa/svg/1-1.svg").unwrap(),
            "Z:/engrave/1-1.svg"
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = config_file(&MINIMAL.replace("192.168.7.50", "laser.local"));
        let config = from_toml_path(file.path()).unwrap();
        assert_eq!(
            config.device_host().unwrap_err().code,
            ErrorCode::InvalidIp
        );

        let file = config_file(&format!("{}\nrotation = 45", MINIMAL.trim_end()));
        let config = from_toml_path(file.path()).unwrap();
        assert_eq!(
            config.composer_settings().unwrap_err().code,
            ErrorCode::InvalidRotation
        );
    }
}
