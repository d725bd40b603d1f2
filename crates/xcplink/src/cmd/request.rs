use std::time::Instant;

use serde::Serialize;
use xcplink_frame::command_name;

use crate::cmd::{open_transport, parse_byte, parse_command, RequestArgs};
use crate::exit::{engine_error, CliResult, SUCCESS};
use crate::logging::LogLevel;
use crate::output::{hex, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct RequestOutput {
    transport: &'static str,
    command: &'static str,
    code: u16,
    response: String,
    response_size: usize,
    elapsed_ms: f64,
}

pub fn run(args: RequestArgs, format: OutputFormat, log_level: LogLevel) -> CliResult<i32> {
    let command = parse_command(&args.command)?;
    let bytes = args
        .args
        .iter()
        .map(|arg| parse_byte(arg))
        .collect::<CliResult<Vec<u8>>>()?;

    let mut transport = open_transport(&args.link, log_level)?;

    let started = Instant::now();
    let response = transport
        .request(command, &bytes)
        .map_err(|err| engine_error("request failed", err))?;
    let elapsed = started.elapsed();

    let out = RequestOutput {
        transport: transport.link_name(),
        command: command_name(command),
        code: command.code(),
        response: hex(&response),
        response_size: response.len(),
        elapsed_ms: (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
    };
    print_request(&out, format);

    transport
        .close()
        .map_err(|err| engine_error("close failed", err))?;
    Ok(SUCCESS)
}

fn print_request(out: &RequestOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["COMMAND", "CODE", "SIZE", "TIME (ms)", "RESPONSE"],
            vec![vec![
                out.command.to_string(),
                format!("0x{:02X}", out.code),
                out.response_size.to_string(),
                format!("{:.2}", out.elapsed_ms),
                out.response.clone(),
            ]],
        ),
        OutputFormat::Pretty => {
            println!("{} (0x{:02X}) via {}", out.command, out.code, out.transport);
            println!("  Response: [{}] {}", out.response_size, out.response);
            println!("  Time:     {:.2}ms", out.elapsed_ms);
        }
    }
}
