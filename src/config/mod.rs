//! Configuration management for tello-link.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::VIDEO_PREFIX_LEN;
use crate::relay::VideoConfig;
use crate::transport::TransportConfig;
use crate::{COMMAND_PORT, DRONE_IP, HEARTBEAT_INTERVAL, KEYFRAME_INTERVAL, VIDEO_PORT};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Aircraft endpoints.
    #[serde(default)]
    pub drone: DroneConfig,

    /// Video relay configuration.
    #[serde(default)]
    pub video: VideoConfig,

    /// Scheduler cadences.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.timing.heartbeat_interval.is_zero() || self.timing.keyframe_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "Scheduler intervals must be non-zero".into(),
            ));
        }

        if self.timing.heartbeat_interval >= self.timing.keyframe_interval {
            return Err(Error::InvalidConfig(format!(
                "Heartbeat interval {:?} must be shorter than keyframe interval {:?}",
                self.timing.heartbeat_interval, self.timing.keyframe_interval
            )));
        }

        if self.video.enabled {
            // Prefix, start code and NAL header byte must fit.
            let min = VIDEO_PREFIX_LEN + 5;
            if self.video.max_datagram < min {
                return Err(Error::InvalidConfig(format!(
                    "video.max_datagram must be at least {min}"
                )));
            }

            if self.video.recv_timeout.is_zero() {
                return Err(Error::InvalidConfig(
                    "video.recv_timeout must be non-zero".into(),
                ));
            }

            if self.video.listen_addr == self.video.relay_addr {
                return Err(Error::InvalidConfig(
                    "Video relay address must differ from the listen address".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tello-link", "tello-link").map_or_else(
            || PathBuf::from("tello-link.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            video: VideoConfig {
                relay_addr: SocketAddr::from(([127, 0, 0, 1], crate::RELAY_PORT)),
                ..Default::default()
            },
            transport: TransportConfig {
                interface: Some("wlan0".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Aircraft endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneConfig {
    /// Command endpoint.
    #[serde(default = "default_command_addr")]
    pub command_addr: SocketAddr,

    /// Video port announced in the connection request.
    #[serde(default = "default_video_port")]
    pub video_port: u16,
}

fn default_command_addr() -> SocketAddr {
    SocketAddr::new(DRONE_IP, COMMAND_PORT)
}
fn default_video_port() -> u16 {
    VIDEO_PORT
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            command_addr: default_command_addr(),
            video_port: default_video_port(),
        }
    }
}

/// Scheduler cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Stick heartbeat period.
    #[serde(default = "default_heartbeat_interval", with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Keyframe request period.
    #[serde(default = "default_keyframe_interval", with = "humantime_serde")]
    pub keyframe_interval: Duration,
}

fn default_heartbeat_interval() -> Duration {
    HEARTBEAT_INTERVAL
}
fn default_keyframe_interval() -> Duration {
    KEYFRAME_INTERVAL
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            keyframe_interval: default_keyframe_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Logs go to stderr; stdin/stdout belong to the operator.
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
