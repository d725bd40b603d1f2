use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use xcplink_engine::FrameTransport;
use xcplink_frame::command::CONNECT;

use crate::cmd::{open_transport, MonitorArgs};
use crate::exit::{engine_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::logging::LogLevel;
use crate::output::{hex, print_packet, OutputFormat, PacketOutput};

/// How long one loop iteration waits for an event.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: MonitorArgs, format: OutputFormat, log_level: LogLevel) -> CliResult<i32> {
    let mut transport = open_transport(&args.link, log_level)?;

    if args.connect {
        let response = transport
            .request(CONNECT, &[0x00])
            .map_err(|err| engine_error("CONNECT failed", err))?;
        info!(response = %hex(&response), "connected to slave");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        printed = printed.saturating_add(drain(&transport, format));

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    transport
        .close()
        .map_err(|err| engine_error("close failed", err))?;
    Ok(SUCCESS)
}

/// Print whatever is queued; returns the number of packets printed.
fn drain(transport: &FrameTransport, format: OutputFormat) -> usize {
    let mut printed = 0;

    if let Some(event) = transport.poll_event(POLL_INTERVAL) {
        print_packet(
            &PacketOutput {
                kind: "EV",
                counter: event.counter,
                length: event.length,
                payload: hex(&event.payload),
                elapsed_ms: None,
            },
            format,
        );
        printed += 1;
    }

    while let Some(request) = transport.poll_service_request(Duration::ZERO) {
        print_packet(
            &PacketOutput {
                kind: "SERV",
                counter: request.counter,
                length: request.length,
                payload: hex(&request.payload),
                elapsed_ms: None,
            },
            format,
        );
        printed += 1;
    }

    while let Some(sample) = transport.poll_sample(Duration::ZERO) {
        let elapsed_ms = sample
            .timestamp
            .zip(transport.first_sample_at())
            .map(|(at, first)| at.duration_since(first).as_secs_f64() * 1000.0);
        print_packet(
            &PacketOutput {
                kind: "DAQ",
                counter: sample.counter,
                length: sample.length,
                payload: hex(&sample.payload),
                elapsed_ms,
            },
            format,
        );
        printed += 1;
    }

    printed
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
