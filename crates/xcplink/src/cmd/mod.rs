use clap::{Args, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

use xcplink_config::LOGLEVEL;
use xcplink_engine::FrameTransport;
use xcplink_frame::Command as XcpCommand;

use crate::exit::{config_error, engine_error, CliError, CliResult, USAGE};
use crate::logging::LogLevel;
use crate::output::OutputFormat;

pub mod backends;
pub mod dlc;
pub mod filter;
pub mod monitor;
pub mod request;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command and print the response.
    Request(RequestArgs),
    /// Print events, service requests and DAQ packets.
    Monitor(MonitorArgs),
    /// Show the CAN DLC for a payload length.
    Dlc(DlcArgs),
    /// Calculate a CAN acceptance filter for a set of identifiers.
    Filter(FilterArgs),
    /// List transports, CAN drivers and plugin diagnostics.
    Backends(BackendsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, log_level: LogLevel) -> CliResult<i32> {
    match command {
        Command::Request(args) => request::run(args, format, log_level),
        Command::Monitor(args) => monitor::run(args, format, log_level),
        Command::Dlc(args) => dlc::run(args, format),
        Command::Filter(args) => filter::run(args, format),
        Command::Backends(args) => backends::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct TransportArgs {
    /// Transport name (eth, can).
    #[arg(long, short = 't')]
    pub transport: String,
    /// JSON file with the transport options.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[command(flatten)]
    pub link: TransportArgs,
    /// Command name (e.g. GET_STATUS) or code (e.g. 0xFD).
    pub command: String,
    /// Argument bytes in hex (e.g. 00 CA 0xFE).
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: TransportArgs,
    /// Send CONNECT (normal mode) before monitoring.
    #[arg(long)]
    pub connect: bool,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DlcArgs {
    /// Payload length in bytes.
    #[arg(allow_negative_numbers = true)]
    pub length: isize,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Raw identifiers, hex (0x7E1) or decimal; bit 31 marks extended.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct BackendsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Create and connect the transport described by `args`.
///
/// `LOGLEVEL` defaults to the CLI log level so `--log-level debug` also
/// turns on frame hex dumps.
pub fn open_transport(args: &TransportArgs, log_level: LogLevel) -> CliResult<FrameTransport> {
    let raw = load_options(&args.config, log_level)?;
    let backends = xcplink::backends();

    let mut transport = backends
        .transports
        .create(&args.transport, &raw)
        .map_err(|err| engine_error("transport setup failed", err))?;
    transport
        .connect()
        .map_err(|err| engine_error("connect failed", err))?;
    Ok(transport)
}

fn load_options(path: &Path, log_level: LogLevel) -> CliResult<Value> {
    let mut raw = xcplink_config::load_json_file(path)
        .map_err(|err| config_error("configuration", err))?;
    let object = raw
        .as_object_mut()
        .ok_or_else(|| config_error("configuration", xcplink_config::ConfigError::NotAnObject))?;
    object
        .entry(LOGLEVEL)
        .or_insert_with(|| Value::from(log_level.as_option()));
    Ok(raw)
}

/// Parse a hex (`0x` prefix) or decimal integer.
pub fn parse_u32(input: &str) -> CliResult<u32> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid number: {input}")))
}

/// Parse one argument byte, written in hex with or without `0x`.
pub fn parse_byte(input: &str) -> CliResult<u8> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u8::from_str_radix(digits, 16)
        .map_err(|_| CliError::new(USAGE, format!("invalid byte: {input}")))
}

/// Resolve a command by name or numeric code.
pub fn parse_command(input: &str) -> CliResult<XcpCommand> {
    if let Some(command) = XcpCommand::from_name(input) {
        return Ok(command);
    }
    let code = parse_u32(input)
        .map_err(|_| CliError::new(USAGE, format!("unknown command: {input}")))?;
    let code = u16::try_from(code)
        .map_err(|_| CliError::new(USAGE, format!("command code out of range: {input}")))?;
    Ok(XcpCommand::new(code))
}
