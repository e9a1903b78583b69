use linewire_codec::EncodedValue;

use crate::cmd::LoadArgs;
use crate::exit::{codec_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_loaded, OutputFormat};

pub fn run(args: LoadArgs, format: OutputFormat) -> CliResult<i32> {
    let value = EncodedValue::read_from_file(&args.path)
        .map_err(|err| codec_error(&format!("failed reading {}", args.path.display()), err))?
        .ok_or_else(|| {
            CliError::new(
                FAILURE,
                format!("no value stored at {}", args.path.display()),
            )
        })?;

    print_loaded(&args.path, &value, format);
    Ok(SUCCESS)
}
