#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

/// Default port the workstation listens on for file commands.
pub const DEFAULT_SEND_PORT: u16 = 19840;
/// Default port the workstation answers probes on.
pub const DEFAULT_RECV_PORT: u16 = 19841;
/// Default probe timeout, seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Connection settings for the engraving workstation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Master switch; every operation fails fast when off.
    pub enabled: bool,
    /// Workstation address.
    pub host: IpAddr,
    /// Port for `LOADFILE` commands.
    pub send_port: u16,
    /// Port for probe exchanges.
    pub recv_port: u16,
    /// Probe reply timeout, 1-30 seconds.
    pub timeout_secs: u64,
}

impl DeviceConfig {
    /// Validates the port and timeout ranges.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.send_port == 0 || self.recv_port == 0 {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidPort,
                "device ports must be non-zero",
            ));
        }
        if !(1..=30).contains(&self.timeout_secs) {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("probe timeout {}s outside [1, 30]", self.timeout_secs),
            ));
        }
        Ok(())
    }
}

/// Rewrites server-local paths into workstation-visible ones.
///
/// With no prefix pair configured the path ships unchanged (server and
/// workstation share a mount point).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTranslator {
    /// Server-side prefix to strip.
    pub local_prefix: Option<String>,
    /// Workstation-side prefix to prepend.
    pub remote_prefix: Option<String>,
}

impl PathTranslator {
    /// Translates one path for the workstation.
    pub fn translate(&self, local_path: &str) -> WorkflowResult<String> {
        match (&self.local_prefix, &self.remote_prefix) {
            (None, None) => Ok(local_path.to_string()),
            (Some(local), Some(remote)) => {
                let rest = local_path.strip_prefix(local.as_str()).ok_or_else(|| {
                    WorkflowError::validation(
                        ErrorCode::InvalidPath,
                        format!("'{}' is outside the shared prefix '{}'", local_path, local),
                    )
                })?;
                Ok(format!("{}{}", remote, rest))
            }
            _ => Err(WorkflowError::validation(
                ErrorCode::InvalidPath,
                "path translation needs both prefixes or neither",
            )),
        }
    }
}

/// Deterministic, filesystem-safe name for one carrier's artwork. The
/// first carrier of a row keeps the bare `{batch}-{row}.svg` name;
/// overflow carriers from redistribution append their ordinal.
pub fn carrier_file_name(batch_id: i64, qsa_sequence: u32, carrier_index: usize) -> String {
    if carrier_index == 0 {
        format!("{}-{}.svg", batch_id, qsa_sequence)
    } else {
        format!("{}-{}-{}.svg", batch_id, qsa_sequence, carrier_index + 1)
    }
}

/// The UDP client for the engraving workstation.
#[derive(Debug, Clone)]
pub struct DeviceCoupler {
    config: DeviceConfig,
    translator: PathTranslator,
}

impl DeviceCoupler {
    /// Creates a coupler after validating the configuration.
    pub fn new(config: DeviceConfig, translator: PathTranslator) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(Self { config, translator })
    }

    /// Whether device coupling is switched on.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Ships `LOADFILE:{path}` to the workstation, translating the path
    /// first. Fire-and-forget: a returned `Ok` means the datagram left
    /// this host, nothing more.
    pub fn load_file(&self, local_path: &str) -> WorkflowResult<String> {
        self.ensure_enabled()?;
        let remote_path = self.translator.translate(local_path)?;
        let command = format!("LOADFILE:{}", remote_path);

        let socket = self.socket()?;
        let target = SocketAddr::new(self.config.host, self.config.send_port);
        socket.send_to(command.as_bytes(), target).map_err(|e| {
            WorkflowError::new(
                ErrorCode::LoadFailed,
                format!("failed to send LOADFILE to {}: {}", target, e),
            )
        })?;
        tracing::info!(%target, path = %remote_path, "sent LOADFILE");
        Ok(remote_path)
    }

    /// Bounded-timeout connectivity probe: sends `HELLO` to the receive
    /// port and waits for any reply. Returns the round-trip time.
    pub fn probe(&self) -> WorkflowResult<Duration> {
        self.ensure_enabled()?;
        let socket = self.socket()?;
        socket
            .set_read_timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .map_err(|e| {
                WorkflowError::new(ErrorCode::ConnectionFailed, format!("socket setup: {}", e))
            })?;

        let target = SocketAddr::new(self.config.host, self.config.recv_port);
        let started = Instant::now();
        socket.send_to(b"HELLO", target).map_err(|e| {
            WorkflowError::new(
                ErrorCode::ConnectionFailed,
                format!("failed to send probe to {}: {}", target, e),
            )
        })?;

        let mut buffer = [0u8; 64];
        match socket.recv_from(&mut buffer) {
            Ok(_) => {
                let elapsed = started.elapsed();
                tracing::info!(%target, ?elapsed, "probe reply received");
                Ok(elapsed)
            }
            Err(e) => Err(WorkflowError::new(
                ErrorCode::ConnectionFailed,
                format!(
                    "no reply from {} within {}s: {}",
                    target, self.config.timeout_secs, e
                ),
            )),
        }
    }

    fn ensure_enabled(&self) -> WorkflowResult<()> {
        if !self.config.enabled {
            return Err(WorkflowError::new(
                ErrorCode::DeviceDisabled,
                "device coupling is disabled in configuration",
            ));
        }
        Ok(())
    }

    fn socket(&self) -> WorkflowResult<UdpSocket> {
        let bind_addr: SocketAddr = if self.config.host.is_ipv4() {
            "0.0.0.0:0".parse().expect("fixed address parses")
        } else {
            "[::]:0".parse().expect("fixed address parses")
        };
        UdpSocket::bind(bind_addr).map_err(|e| {
            WorkflowError::new(
                ErrorCode::ConnectionFailed,
                format!("failed to open UDP socket: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn local_config(send_port: u16, recv_port: u16) -> DeviceConfig {
        DeviceConfig {
            enabled: true,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            send_port,
            recv_port,
            timeout_secs: 1,
        }
    }

    #[test]
    fn load_file_ships_the_translated_path() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let coupler = DeviceCoupler::new(
            local_config(port, DEFAULT_RECV_PORT),
            PathTranslator {
                local_prefix: Some("/var/qsa/svg/".into()),
                remote_prefix: Some("Z:/engrave/".into()),
            },
        )
        .unwrap();

        let sent = coupler.load_file("/var/qsa/svg/12-3.svg").unwrap();
        assert_eq!(sent, "Z:/engrave/12-3.svg");

        let mut buffer = [0u8; 128];
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let (len, _) = receiver.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], b"LOADFILE:Z:/engrave/12-3.svg");
    }

    #[test]
    fn probe_round_trips_against_a_local_responder() {
        let responder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = responder.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let mut buffer = [0u8; 16];
            if let Ok((len, from)) = responder.recv_from(&mut buffer) {
                assert_eq!(&buffer[..len], b"HELLO");
                let _ = responder.send_to(b"HELLO", from);
            }
        });

        let coupler =
            DeviceCoupler::new(local_config(DEFAULT_SEND_PORT, port), PathTranslator::default())
                .unwrap();
        let elapsed = coupler.probe().unwrap();
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn probe_times_out_without_a_responder() {
        // An ephemeral port that nothing answers on.
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = silent.local_addr().unwrap().port();

        let coupler =
            DeviceCoupler::new(local_config(DEFAULT_SEND_PORT, port), PathTranslator::default())
                .unwrap();
        let err = coupler.probe().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConnectionFailed);
    }

    #[test]
    fn disabled_device_fails_fast() {
        let mut config = local_config(DEFAULT_SEND_PORT, DEFAULT_RECV_PORT);
        config.enabled = false;
        let coupler = DeviceCoupler::new(config, PathTranslator::default()).unwrap();

        assert_eq!(
            coupler.load_file("/tmp/x.svg").unwrap_err().code,
            ErrorCode::DeviceDisabled
        );
        assert_eq!(coupler.probe().unwrap_err().code, ErrorCode::DeviceDisabled);
    }

    #[test]
    fn config_ranges_are_validated() {
        let mut config = local_config(DEFAULT_SEND_PORT, DEFAULT_RECV_PORT);
        config.timeout_secs = 31;
        assert!(DeviceCoupler::new(config, PathTranslator::default()).is_err());

        let mut config = local_config(DEFAULT_SEND_PORT, DEFAULT_RECV_PORT);
        config.send_port = 0;
        assert!(DeviceCoupler::new(config, PathTranslator::default()).is_err());
    }

    #[test]
    fn path_translation_rules() {
        let translator = PathTranslator {
            local_prefix: Some("/srv/svg/".into()),
            remote_prefix: Some("//LASER/share/".into()),
        };
        assert_eq!(
            translator.translate("/srv/svg/7-1.svg").unwrap(),
            "//LASER/share/7-1.svg"
        );
        assert_eq!(
            translator.translate("/elsewhere/7-1.svg").unwrap_err().code,
            ErrorCode::InvalidPath
        );
        assert_eq!(
            PathTranslator::default().translate("/srv/svg/7-1.svg").unwrap(),
            "/srv/svg/7-1.svg"
        );
    }

    #[test]
    fn file_names_are_deterministic() {
        assert_eq!(carrier_file_name(12, 3, 0), "12-3.svg");
        assert_eq!(carrier_file_name(12, 3, 1), "12-3-2.svg");
        assert_eq!(carrier_file_name(12, 3, 2), "12-3-3.svg");
    }
}
