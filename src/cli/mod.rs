//! Command line interface for tello-link.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, LoggingConfig};
use crate::protocol::Stick;

/// tello-link - raw UDP flight link for Tello-class quadcopters
#[derive(Parser, Debug)]
#[command(
    name = "tello-link",
    author,
    version,
    about = "Raw UDP flight control and video relay for Tello-class quadcopters",
    long_about = r#"
tello-link speaks the aircraft's binary control protocol directly:

  - 50 Hz stick heartbeat keeping the aircraft under control
  - Takeoff and land on demand
  - Keyframe requests once a second
  - H.264 relay to a local player once the stream becomes decodable

QUICK START:
  Join the aircraft's Wi-Fi, then:
    tello-link fly
  and play the relayed stream with e.g.
    ffplay udp://192.168.10.2:8080

KEYS (type a key and press enter):
  W/w S/s   ascend / descend (fast / slow)
  A/a D/d   yaw left / right
  I/i K/k   pitch forward / back
  J/j L/l   roll left / right
  arrows    slow pitch and roll
  <space>   take off or land
  <enter>   quit (only while landed)
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: from config, else info]
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format [default: from config, else text]
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Logging settings: the configured ones with any flags given on the
    /// command line applied on top.
    pub fn logging(&self, configured: &LoggingConfig) -> LoggingConfig {
        let mut logging = configured.clone();
        if let Some(ref level) = self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            logging.format = format.as_str().into();
        }
        if self.no_color {
            logging.color = false;
        }
        logging
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the aircraft and fly from the keyboard
    Fly(FlyArgs),

    /// Show example configuration
    Config(ConfigArgs),
}

/// Fly command arguments
#[derive(Args, Debug)]
pub struct FlyArgs {
    /// Aircraft command address
    #[arg(long)]
    pub drone: Option<SocketAddr>,

    /// Local address the aircraft streams video to
    #[arg(long)]
    pub video_listen: Option<SocketAddr>,

    /// Where to relay the decodable stream
    #[arg(long)]
    pub relay: Option<SocketAddr>,

    /// Do not start the video relay
    #[arg(long)]
    pub no_video: bool,

    /// Network interface facing the aircraft (Linux only)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// How long a stick key stays applied before reverting to hover
    #[arg(long, default_value = "300ms", value_parser = parse_duration)]
    pub hold: Duration,
}

impl FlyArgs {
    /// Overlay command line flags on a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(addr) = self.drone {
            config.drone.command_addr = addr;
        }
        if let Some(addr) = self.video_listen {
            config.video.listen_addr = addr;
        }
        if let Some(addr) = self.relay {
            config.video.relay_addr = addr;
        }
        if self.no_video {
            config.video.enabled = false;
        }
        if let Some(ref interface) = self.interface {
            config.transport.interface = Some(interface.clone());
        }
    }
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the default configuration file location instead
    #[arg(long)]
    pub path: bool,

    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Operator intent decoded from one line of keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Stick(Stick),
    TakeOffOrLand,
    Quit,
}

impl Intent {
    /// Decode a line with its terminator already stripped.
    ///
    /// Upper case is the fast variant, lower case the slow one. Anything
    /// unrecognised means hover.
    pub fn from_line(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Self::Quit;
        }
        if line.trim().is_empty() {
            return Self::TakeOffOrLand;
        }

        if let Some(stick) = arrow_stick(line.trim()) {
            return Self::Stick(stick);
        }

        let stick = line.trim().chars().next().map_or(Stick::Hover, key_stick);
        Self::Stick(stick)
    }
}

// Cursor keys as terminals send them, in normal and application mode.
fn arrow_stick(seq: &str) -> Option<Stick> {
    match seq {
        "\x1b[A" | "\x1bOA" => Some(Stick::PitchForwardSlow),
        "\x1b[B" | "\x1bOB" => Some(Stick::PitchBackSlow),
        "\x1b[C" | "\x1bOC" => Some(Stick::RollRightSlow),
        "\x1b[D" | "\x1bOD" => Some(Stick::RollLeftSlow),
        _ => None,
    }
}

fn key_stick(key: char) -> Stick {
    match key {
        'W' => Stick::AscendFast,
        'w' => Stick::AscendSlow,
        'S' => Stick::DescendFast,
        's' => Stick::DescendSlow,
        'A' => Stick::YawCcwFast,
        'a' => Stick::YawCcwSlow,
        'D' => Stick::YawCwFast,
        'd' => Stick::YawCwSlow,
        'I' => Stick::PitchForwardFast,
        'i' => Stick::PitchForwardSlow,
        'K' => Stick::PitchBackFast,
        'k' => Stick::PitchBackSlow,
        'J' => Stick::RollLeftFast,
        'j' => Stick::RollLeftSlow,
        'L' => Stick::RollRightFast,
        'l' => Stick::RollRightSlow,
        _ => Stick::Hover,
    }
}
