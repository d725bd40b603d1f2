use serde::Serialize;

use crate::cmd::BackendsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct DriverInfo {
    name: String,
    options: Vec<String>,
}

#[derive(Serialize)]
struct PluginFailureInfo {
    plugin: String,
    reason: String,
}

#[derive(Serialize)]
struct BackendsOutput {
    transports: Vec<String>,
    drivers: Vec<DriverInfo>,
    plugins_loaded: Vec<String>,
    plugin_failures: Vec<PluginFailureInfo>,
}

pub fn run(_args: BackendsArgs, format: OutputFormat) -> CliResult<i32> {
    let backends = xcplink::backends();

    let drivers = backends
        .drivers
        .names()
        .into_iter()
        .map(|name| {
            let options = match backends.drivers.create(&name) {
                Ok(driver) => driver.parameters().names().map(str::to_string).collect(),
                Err(err) => {
                    tracing::warn!(driver = %name, error = %err, "driver could not be instantiated");
                    Vec::new()
                }
            };
            DriverInfo { name, options }
        })
        .collect();

    let out = BackendsOutput {
        transports: backends.transports.names(),
        drivers,
        plugins_loaded: backends.report.loaded.clone(),
        plugin_failures: backends
            .report
            .failures
            .iter()
            .map(|failure| PluginFailureInfo {
                plugin: failure.plugin.clone(),
                reason: failure.reason.clone(),
            })
            .collect(),
    };

    print_backends(&out, format);
    Ok(SUCCESS)
}

fn print_backends(out: &BackendsOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut rows = Vec::new();
            for name in &out.transports {
                rows.push(vec![
                    "transport".to_string(),
                    name.clone(),
                    "ok".to_string(),
                    String::new(),
                ]);
            }
            for driver in &out.drivers {
                rows.push(vec![
                    "can driver".to_string(),
                    driver.name.clone(),
                    "ok".to_string(),
                    driver.options.join(", "),
                ]);
            }
            for failure in &out.plugin_failures {
                rows.push(vec![
                    "plugin".to_string(),
                    failure.plugin.clone(),
                    "failed".to_string(),
                    failure.reason.clone(),
                ]);
            }
            print_table(&["KIND", "NAME", "STATUS", "DETAIL"], rows);
        }
        OutputFormat::Pretty => {
            println!("Transports:  {}", out.transports.join(", "));
            for driver in &out.drivers {
                if driver.options.is_empty() {
                    println!("CAN driver:  {}", driver.name);
                } else {
                    println!(
                        "CAN driver:  {} (options: {})",
                        driver.name,
                        driver.options.join(", ")
                    );
                }
            }
            if out.plugin_failures.is_empty() {
                println!("Plugins:     all {} loaded", out.plugins_loaded.len());
            }
            for failure in &out.plugin_failures {
                println!("Plugin {} failed: {}", failure.plugin, failure.reason);
            }
        }
    }
}
