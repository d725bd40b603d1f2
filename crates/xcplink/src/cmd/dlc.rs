use serde::Serialize;
use xcplink_can::{dlc_code, dlc_for};

use crate::cmd::DlcArgs;
use crate::exit::{can_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct DlcOutput {
    length: isize,
    dlc: usize,
    code: u8,
    fd: bool,
}

pub fn run(args: DlcArgs, format: OutputFormat) -> CliResult<i32> {
    let dlc = dlc_for(args.length).map_err(|err| can_error("dlc", &err))?;
    let code = dlc_code(dlc).map_err(|err| can_error("dlc", &err))?;

    let out = DlcOutput {
        length: args.length,
        dlc,
        code,
        fd: code > 8,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["LENGTH", "DLC", "CODE", "CAN-FD"],
            vec![vec![
                out.length.to_string(),
                out.dlc.to_string(),
                out.code.to_string(),
                out.fd.to_string(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "length {} -> frame of {} bytes (DLC code {}{})",
            out.length,
            out.dlc,
            out.code,
            if out.fd { ", CAN-FD" } else { "" }
        ),
    }
    Ok(SUCCESS)
}
