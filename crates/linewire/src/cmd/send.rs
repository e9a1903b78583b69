use std::io::BufRead;
use std::time::{Duration, Instant};

use linewire_codec::EncodedValue;
use linewire_pipe::{connect_tcp, poll_once, Direction, FramedPipe, PipeConfig, UnixEndpoint};
use tracing::debug;

use crate::cmd::{SendArgs, POLL_INTERVAL};
use crate::exit::{
    codec_error, io_error, pipe_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS,
    TIMEOUT, USAGE,
};
use crate::output::{print_record, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let values = resolve_values(&args)?;

    let pipe = if args.tcp {
        connect_tcp(&args.target, PipeConfig::default())
    } else {
        UnixEndpoint::connect(&args.target, PipeConfig::default())
    }
    .map_err(|err| pipe_error("connect failed", err))?;

    let count = values.len();
    for value in values {
        pipe.tx(value).map_err(|err| pipe_error("send failed", err))?;
    }
    // Replies can still arrive after our side is half-closed.
    pipe.tx_eof();
    debug!(count, "queued records");

    finish(&pipe, args.wait, Instant::now() + wait_timeout, format)
}

/// Drive the pipe until everything is written and `wait` replies were
/// printed. Records lost to an early transmit close are a failure.
fn finish(
    pipe: &FramedPipe,
    wait: usize,
    deadline: Instant,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut replies = 0usize;
    loop {
        while replies < wait {
            let Some(record) = pipe.rx_nonblock() else {
                break;
            };
            print_record(&record, 0, format);
            replies += 1;
        }

        if pipe.is_closed(Direction::Transmit) {
            let dropped = pipe.tx_dropped();
            if dropped > 0 {
                return Err(CliError::new(
                    FAILURE,
                    format!("transmit closed with {dropped} record(s) undelivered"),
                ));
            }
            if replies >= wait {
                return Ok(SUCCESS);
            }
        }
        if replies < wait && pipe.is_closed(Direction::Receive) && pipe.pending_rx() == 0 {
            return Err(CliError::new(
                FAILURE,
                format!("peer closed after {replies} of {wait} replies"),
            ));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CliError::new(
                TIMEOUT,
                format!("timed out with {replies} of {wait} replies"),
            ));
        }
        poll_once(&[pipe], Some(remaining.min(POLL_INTERVAL)))
            .map_err(|err| io_error("poll failed", err))?;
    }
}

fn resolve_values(args: &SendArgs) -> CliResult<Vec<EncodedValue>> {
    if !args.json.is_empty() {
        return args
            .json
            .iter()
            .map(|text| {
                text.parse::<EncodedValue>()
                    .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))
            })
            .collect();
    }
    if let Some(path) = &args.file {
        return match EncodedValue::read_from_file(path) {
            Ok(Some(value)) => Ok(vec![value]),
            Ok(None) => Err(CliError::new(
                FAILURE,
                format!("no value stored at {}", path.display()),
            )),
            Err(err) => Err(codec_error(&format!("failed reading {}", path.display()), err)),
        };
    }
    parse_lines(std::io::stdin().lock())
}

/// One value per non-blank line.
fn parse_lines(input: impl BufRead) -> CliResult<Vec<EncodedValue>> {
    let mut values = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        if line.trim().is_empty() {
            continue;
        }
        let value = line.parse::<EncodedValue>().map_err(|err| {
            CliError::new(DATA_INVALID, format!("stdin line {}: {err}", index + 1))
        })?;
        values.push(value);
    }
    Ok(values)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
