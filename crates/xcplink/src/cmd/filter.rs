use serde::Serialize;
use xcplink_can::{calculate_filter, Identifier};

use crate::cmd::{parse_u32, FilterArgs};
use crate::exit::{can_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct FilterOutput {
    ids: Vec<String>,
    extended: bool,
    filter: String,
    mask: String,
}

pub fn run(args: FilterArgs, format: OutputFormat) -> CliResult<i32> {
    let ids = args
        .ids
        .iter()
        .map(|input| {
            let raw = parse_u32(input)?;
            Identifier::new(raw).map_err(|err| can_error("filter", &err))
        })
        .collect::<CliResult<Vec<_>>>()?;

    let filter = calculate_filter(&ids).map_err(|err| can_error("filter", &err))?;

    let out = FilterOutput {
        ids: ids.iter().map(ToString::to_string).collect(),
        extended: ids.iter().any(Identifier::is_extended),
        filter: format!("0x{:08X}", filter.filter),
        mask: format!("0x{:08X}", filter.mask),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["IDS", "FILTER", "MASK"],
            vec![vec![out.ids.join(", "), out.filter.clone(), out.mask.clone()]],
        ),
        OutputFormat::Pretty => {
            println!("Identifiers: {}", out.ids.join(", "));
            println!("  Filter:    {}", out.filter);
            println!("  Mask:      {}", out.mask);
        }
    }
    Ok(SUCCESS)
}
