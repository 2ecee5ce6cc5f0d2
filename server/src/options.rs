//! Option resolution.
//!
//! Options come from three layers, each overriding the previous one:
//! compiled defaults, an options file in TOML, and the command line.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use framelink::config::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};
use framelink::HubConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Options file looked up in the working directory, then in `$HOME`.
pub const OPTIONS_FILE_NAME: &str = ".framelink.toml";

pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_OUTPUT_FILE: &str = "data";

/// Log framed serial data to a file and redistribute it over TCP or UDP.
///
/// Frames look like `0xFF 0xFF | LEN | payload | CK1 | CK2`. Every packet
/// that passes its checksum is kept and saved on exit as a 4-byte packet
/// count followed by the raw payloads.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Options file (default: ./.framelink.toml, then ~/.framelink.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial device (default: /dev/ttyACM0)
    #[arg(short = 'p', long)]
    pub serial_port: Option<String>,

    /// Serial baud rate (default: 115200)
    #[arg(short, long)]
    pub baud_rate: Option<u32>,

    /// Stop after this many packets; 0 runs until Ctrl+C
    #[arg(short = 'n', long)]
    pub data_size: Option<usize>,

    /// Output file base name (default: data)
    #[arg(short = 'f', long)]
    pub output_file: Option<String>,

    /// Do not append the date, time and extension to the output file name
    #[arg(short = 'd', long)]
    pub no_datetime: bool,

    /// Print raw received bytes to stdout instead of scanning for frames
    #[arg(short, long)]
    pub repeat: bool,

    /// Start the TCP server
    #[arg(short, long)]
    pub tcp: bool,

    /// Start the UDP server
    #[arg(short, long)]
    pub udp: bool,

    /// Port for both servers; overrides --tcp-port and --udp-port
    #[arg(short = 'P', long)]
    pub net_port: Option<u16>,

    /// TCP server port (default: 5353)
    #[arg(long)]
    pub tcp_port: Option<u16>,

    /// UDP server port (default: 5050)
    #[arg(long)]
    pub udp_port: Option<u16>,

    /// Log connections and traffic
    #[arg(short, long)]
    pub verbose: bool,
}

/// One layer of options; unset fields leave the lower layer in place.
///
/// The older key names `serialport`, `baudrate` and `datetime` are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsLayer {
    #[serde(alias = "serialport")]
    pub serial_port: Option<String>,
    #[serde(alias = "baudrate")]
    pub baud_rate: Option<u32>,
    pub data_size: Option<usize>,
    pub output_file: Option<String>,
    #[serde(alias = "datetime")]
    pub no_datetime: Option<bool>,
    pub repeat: Option<bool>,
    pub tcp: Option<bool>,
    pub udp: Option<bool>,
    pub net_port: Option<u16>,
    pub tcp_port: Option<u16>,
    pub udp_port: Option<u16>,
    pub verbose: Option<bool>,
}

impl OptionsLayer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|source| ServerError::OptionsFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Flags only switch things on; an absent flag defers to the file.
impl From<&Args> for OptionsLayer {
    fn from(args: &Args) -> Self {
        let flag = |set: bool| set.then_some(true);
        Self {
            serial_port: args.serial_port.clone(),
            baud_rate: args.baud_rate,
            data_size: args.data_size,
            output_file: args.output_file.clone(),
            no_datetime: flag(args.no_datetime),
            repeat: flag(args.repeat),
            tcp: flag(args.tcp),
            udp: flag(args.udp),
            net_port: args.net_port,
            tcp_port: args.tcp_port,
            udp_port: args.udp_port,
            verbose: flag(args.verbose),
        }
    }
}

/// Fully resolved options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub serial_port: String,
    pub baud_rate: u32,
    /// Packet limit; 0 means unlimited.
    pub data_size: usize,
    pub output_file: String,
    /// Append date and time to the output file name.
    pub stamped: bool,
    pub repeat: bool,
    pub tcp: bool,
    pub udp: bool,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            serial_port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_size: 0,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            stamped: true,
            repeat: false,
            tcp: false,
            udp: false,
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            verbose: false,
        }
    }
}

impl Options {
    /// Resolves defaults, the first options file found, then `args`.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut options = Self::default();
        if let Some(path) = find_options_file(args.config.as_deref()) {
            log::debug!("Reading options from {}", path.display());
            options.apply(OptionsLayer::from_file(&path)?);
        }
        options.apply(OptionsLayer::from(args));
        Ok(options)
    }

    pub fn apply(&mut self, layer: OptionsLayer) {
        if let Some(port) = layer.serial_port {
            self.serial_port = port;
        }
        if let Some(baud) = layer.baud_rate {
            self.baud_rate = baud;
        }
        if let Some(size) = layer.data_size {
            self.data_size = size;
        }
        if let Some(file) = layer.output_file {
            self.output_file = file;
        }
        if let Some(no_datetime) = layer.no_datetime {
            self.stamped = !no_datetime;
        }
        if let Some(repeat) = layer.repeat {
            self.repeat = repeat;
        }
        if let Some(tcp) = layer.tcp {
            self.tcp = tcp;
        }
        if let Some(udp) = layer.udp {
            self.udp = udp;
        }
        if let Some(port) = layer.tcp_port {
            self.tcp_port = port;
        }
        if let Some(port) = layer.udp_port {
            self.udp_port = port;
        }
        if let Some(port) = layer.net_port {
            self.tcp_port = port;
            self.udp_port = port;
        }
        if let Some(verbose) = layer.verbose {
            self.verbose = verbose;
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        let mut config = HubConfig::new();
        if self.tcp {
            config = config.with_tcp_port(self.tcp_port);
        }
        if self.udp {
            config = config.with_udp_port(self.udp_port);
        }
        config
    }
}

/// An explicit path always wins, even if it does not exist.
fn find_options_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(OPTIONS_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    let home = std::env::var_os("HOME").map(|home| Path::new(&home).join(OPTIONS_FILE_NAME))?;
    home.is_file().then_some(home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.serial_port, "/dev/ttyACM0");
        assert_eq!(options.baud_rate, 115200);
        assert_eq!(options.data_size, 0);
        assert_eq!(options.output_file, "data");
        assert!(options.stamped);
        assert_eq!(options.tcp_port, 5353);
        assert_eq!(options.udp_port, 5050);
        assert!(!options.hub_config().is_enabled());
    }

    #[test]
    fn test_file_then_command_line() {
        let file: OptionsLayer = toml::from_str(
            r#"
serial_port = "/dev/ttyUSB0"
baud_rate = 57600
udp = true
no_datetime = true
"#,
        )
        .unwrap();
        let args = Args::parse_from(["framelink-server", "-b", "9600", "-t", "-n", "10"]);

        let mut options = Options::default();
        options.apply(file);
        options.apply(OptionsLayer::from(&args));

        assert_eq!(options.serial_port, "/dev/ttyUSB0");
        assert_eq!(options.baud_rate, 9600);
        assert_eq!(options.data_size, 10);
        assert!(options.tcp && options.udp);
        assert!(!options.stamped);
    }

    #[test]
    fn test_absent_flag_keeps_file_value() {
        let file = OptionsLayer {
            verbose: Some(true),
            repeat: Some(true),
            ..Default::default()
        };
        let args = Args::parse_from(["framelink-server"]);

        let mut options = Options::default();
        options.apply(file);
        options.apply(OptionsLayer::from(&args));

        assert!(options.verbose);
        assert!(options.repeat);
    }

    #[test]
    fn test_net_port_overrides_both() {
        let args = Args::parse_from(["framelink-server", "--tcp-port", "1", "-P", "7000", "-t", "-u"]);
        let mut options = Options::default();
        options.apply(OptionsLayer::from(&args));

        assert_eq!(options.tcp_port, 7000);
        assert_eq!(options.udp_port, 7000);
        let config = options.hub_config();
        assert_eq!(config.stream_addr.unwrap().port(), 7000);
        assert_eq!(config.datagram_addr.unwrap().port(), 7000);
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let parsed: std::result::Result<OptionsLayer, _> = toml::from_str("serial = \"/dev/x\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_legacy_key_names() {
        let file: OptionsLayer = toml::from_str(
            r#"
serialport = "/dev/ttyS1"
baudrate = 9600
datetime = true
"#,
        )
        .unwrap();

        let mut options = Options::default();
        options.apply(file);
        assert_eq!(options.serial_port, "/dev/ttyS1");
        assert_eq!(options.baud_rate, 9600);
        assert!(!options.stamped);
    }

    #[test]
    fn test_explicit_options_file() {
        let path = std::env::temp_dir().join(format!("framelink-options-{}.toml", std::process::id()));
        fs::write(&path, "output_file = \"run\"\ndata_size = 3\n").unwrap();

        let args = Args::parse_from(["framelink-server", "-c", path.to_str().unwrap()]);
        let options = Options::resolve(&args).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(options.output_file, "run");
        assert_eq!(options.data_size, 3);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let args = Args::parse_from(["framelink-server", "-c", "/nonexistent/framelink.toml"]);
        assert!(matches!(Options::resolve(&args), Err(ServerError::Io(_))));
    }
}
