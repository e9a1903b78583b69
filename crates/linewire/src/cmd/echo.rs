use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use linewire_codec::{encode, EncodedValue};
use linewire_pipe::{poll_once, Direction, FramedPipe, PipeConfig, Record, UnixEndpoint};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, EchoArgs, POLL_INTERVAL};
use crate::exit::{io_error, pipe_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let endpoint = UnixEndpoint::bind(&args.path).map_err(|err| pipe_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut served = 0usize;
    while running.load(Ordering::SeqCst) {
        let Some(pipe) = endpoint
            .accept_timeout(PipeConfig::default(), POLL_INTERVAL)
            .map_err(|err| pipe_error("accept failed", err))?
        else {
            continue;
        };
        served += 1;
        info!(peer = served, "peer connected");
        serve(&pipe, &running)?;
        info!(peer = served, "peer finished");

        if args.count.is_some_and(|count| served >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Echo records until the peer stops sending and every reply is written.
fn serve(pipe: &FramedPipe, running: &AtomicBool) -> CliResult<()> {
    while running.load(Ordering::SeqCst) {
        poll_once(&[pipe], Some(POLL_INTERVAL)).map_err(|err| io_error("poll failed", err))?;

        while let Some(record) = pipe.rx_nonblock() {
            if let Err(err) = pipe.tx(reply_for(&record)) {
                warn!(error = %err, "dropping reply");
            }
        }
        if pipe.is_closed(Direction::Receive) {
            pipe.tx_eof();
        }
        if pipe.is_closed(Direction::Transmit) {
            break;
        }
    }
    Ok(())
}

/// The record itself when it is valid JSON, otherwise an error object.
fn reply_for(record: &Record) -> EncodedValue {
    match record.to_value() {
        Ok(value) => {
            debug!(size = value.len(), "echoing record");
            value
        }
        Err(err) => {
            warn!(error = %err, size = record.len(), "received invalid record");
            let mut reply = BTreeMap::new();
            reply.insert("error".to_string(), format!("invalid record: {err}"));
            encode(&reply)
        }
    }
}
