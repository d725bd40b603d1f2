use std::fmt::Write as _;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One inbound packet as printed by `monitor`.
#[derive(Serialize)]
pub struct PacketOutput<'a> {
    pub kind: &'a str,
    pub counter: u16,
    pub length: usize,
    pub payload: String,
    /// Milliseconds since the first DAQ packet, when timestamps are on.
    pub elapsed_ms: Option<f64>,
}

pub fn print_packet(packet: &PacketOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(packet),
        OutputFormat::Table => {
            let elapsed = packet
                .elapsed_ms
                .map(|ms| format!("{ms:.3}"))
                .unwrap_or_default();
            print_table(
                &["KIND", "CTR", "LEN", "TIME (ms)", "PAYLOAD"],
                vec![vec![
                    packet.kind.to_string(),
                    packet.counter.to_string(),
                    packet.length.to_string(),
                    elapsed,
                    packet.payload.clone(),
                ]],
            );
        }
        OutputFormat::Pretty => match packet.elapsed_ms {
            Some(ms) => println!(
                "{:<4} ctr={} len={} t={ms:.3}ms {}",
                packet.kind, packet.counter, packet.length, packet.payload
            ),
            None => println!(
                "{:<4} ctr={} len={} {}",
                packet.kind, packet.counter, packet.length, packet.payload
            ),
        },
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

/// Bytes as space-separated upper-case hex.
pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}
