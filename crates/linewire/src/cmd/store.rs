use std::io::Read;

use linewire_codec::EncodedValue;

use crate::cmd::StoreArgs;
use crate::exit::{codec_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_stored, OutputFormat};

pub fn run(args: StoreArgs, format: OutputFormat) -> CliResult<i32> {
    let text = match args.json {
        Some(text) => text,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| io_error("failed reading stdin", err))?;
            text
        }
    };

    let value = EncodedValue::from_raw(text).map_err(|err| {
        CliError::new(DATA_INVALID, format!("input is not a single JSON value: {err}"))
    })?;
    value
        .write_to_file(&args.path, args.gzip)
        .map_err(|err| codec_error(&format!("failed writing {}", args.path.display()), err))?;

    tracing::info!(
        path = %args.path.display(),
        size = value.len(),
        gzip = args.gzip,
        "stored value"
    );
    print_stored(&args.path, &value, args.gzip, format);
    Ok(SUCCESS)
}
