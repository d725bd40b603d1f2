use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("xcplink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let backends = xcplink::backends();

    println!("name: xcplink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("XCPLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("features: can={}, cli=true", cfg!(feature = "can"));
    println!("transports: {}", backends.transports.names().join(", "));
    println!("can_drivers: {}", backends.drivers.names().join(", "));

    Ok(SUCCESS)
}
