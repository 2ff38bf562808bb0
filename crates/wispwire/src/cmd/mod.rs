use clap::{Args, Subcommand};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use wispwire_frame::WireFormat;
use wispwire_transport::LinkSpec;

use crate::config::FileConfig;
use crate::exit::{io_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod bench;
pub mod decode;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

/// Baud rate used when `--serial` is given without `--baud`.
pub const DEFAULT_BAUD: u32 = 115200;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one frame and print its wire bytes.
    Encode(EncodeArgs),
    /// Decode an offline capture and print frames and decoder counters.
    Decode(DecodeArgs),
    /// Send a single frame to a bench.
    Send(SendArgs),
    /// Connect to a bench and print received frames.
    Listen(ListenArgs),
    /// Simulate a TCP test bench that echoes every frame back.
    Bench(BenchArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Per-invocation settings shared by every subcommand.
pub struct Context {
    pub format: OutputFormat,
    pub file: FileConfig,
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, ctx),
        Command::Decode(args) => decode::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Bench(args) => bench::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct LinkArgs {
    /// Bench reachable over TCP.
    #[arg(long, value_name = "HOST:PORT", conflicts_with_all = ["udp", "serial"])]
    pub tcp: Option<String>,
    /// Bench reachable over UDP.
    #[arg(long, value_name = "HOST:PORT", conflicts_with_all = ["tcp", "serial"])]
    pub udp: Option<String>,
    /// Local address for the UDP socket (default: any).
    #[arg(long, value_name = "HOST:PORT", requires = "udp")]
    pub bind: Option<String>,
    /// Bench attached to a serial port.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["tcp", "udp"])]
    pub serial: Option<String>,
    /// Serial baud rate (default: 115200).
    #[arg(long, requires = "serial")]
    pub baud: Option<u32>,
}

impl LinkArgs {
    /// Pick the link from flags, falling back to the config file.
    pub fn resolve(&self, fallback: Option<&LinkSpec>) -> CliResult<LinkSpec> {
        if let Some(addr) = &self.tcp {
            return Ok(LinkSpec::Tcp { addr: addr.clone() });
        }
        if let Some(addr) = &self.udp {
            return Ok(LinkSpec::Udp {
                addr: addr.clone(),
                bind: self.bind.clone(),
            });
        }
        if let Some(path) = &self.serial {
            return Ok(LinkSpec::Serial {
                path: path.clone(),
                baud: self.baud.unwrap_or(DEFAULT_BAUD),
            });
        }
        fallback.cloned().ok_or_else(|| {
            CliError::usage("no link given: use --tcp, --udp or --serial, or set \"link\" in --config")
        })
    }
}

#[derive(Args, Debug, Default)]
pub struct WireArgs {
    /// Speak fixed-size records of BYTES payload instead of stuffed frames.
    #[arg(long, value_name = "BYTES")]
    pub fixed: Option<usize>,
}

impl WireArgs {
    pub fn resolve(&self, configured: WireFormat) -> WireFormat {
        match self.fixed {
            Some(payload_len) => WireFormat::Fixed { payload_len },
            None => configured,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct PayloadArgs {
    /// Payload as hex bytes (e.g. "AA AA 01" or "aaaa01").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with_all = ["hex", "data"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// The payload bytes; empty when no source is given.
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(text) = &self.hex {
            return parse_hex(text);
        }
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            return read_file(path);
        }
        Ok(Vec::new())
    }
}

/// Parse hex bytes, ignoring whitespace, `:`/`,` separators and `0x`
/// prefixes.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex input: {err}")))
}

pub fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|err| io_error(&format!("failed reading {}", path.display()), err))
}

pub fn read_stdin() -> CliResult<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Frame id (0-63).
    #[arg(long)]
    pub id: u32,
    #[command(flatten)]
    pub payload: PayloadArgs,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture as hex bytes.
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,
    /// Binary capture file. Reads stdin when neither --hex nor --file is set.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Exit with status 60 when the capture held corrupt frames.
    #[arg(long)]
    pub strict: bool,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Frame id to send (0-63).
    #[arg(long, default_value = "1")]
    pub id: u32,
    #[command(flatten)]
    pub payload: PayloadArgs,
    #[command(flatten)]
    pub wire: WireArgs,
    /// Wait for one reply frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Only accept a reply with this id when --wait is set.
    #[arg(long, requires = "wait", value_parser = clap::value_parser!(u8).range(0..64))]
    pub reply_id: Option<u8>,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub wire: WireArgs,
    /// Only print frames with these ids (comma-separated).
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..64))]
    pub ids: Option<Vec<u8>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print link counters on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Address to listen on.
    #[arg(long, value_name = "HOST:PORT", default_value = "127.0.0.1:5000")]
    pub bind: String,
    /// Exit after echoing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Serve a single front-end connection, then exit.
    #[arg(long)]
    pub once: bool,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
