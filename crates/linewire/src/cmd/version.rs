use linewire_pipe::{PipeConfig, RECORD_DELIMITER};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("linewire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    for (key, value) in extended_details() {
        println!("{key}: {value}");
    }
    Ok(SUCCESS)
}

/// Build and transport facts, in print order.
fn extended_details() -> Vec<(&'static str, String)> {
    let defaults = PipeConfig::default();
    vec![
        ("name", "linewire".to_string()),
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        (
            "target",
            option_env!("LINEWIRE_BUILD_TARGET")
                .unwrap_or("unknown")
                .to_string(),
        ),
        ("target_os", std::env::consts::OS.to_string()),
        ("target_arch", std::env::consts::ARCH.to_string()),
        ("record_format", "json".to_string()),
        (
            "record_delimiter",
            char::from(RECORD_DELIMITER).escape_default().to_string(),
        ),
        ("store_compression", "gzip".to_string()),
        ("transports", "unix,tcp".to_string()),
        ("read_chunk_size", defaults.read_chunk_size.to_string()),
        ("tcp_nodelay", defaults.tcp_nodelay.to_string()),
    ]
}
