use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use linewire_pipe::{poll_once, Direction, PipeConfig, UnixEndpoint};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, ListenArgs, POLL_INTERVAL};
use crate::exit::{io_error, pipe_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = UnixEndpoint::bind(&args.path).map_err(|err| pipe_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut peer = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(pipe) = endpoint
            .accept_timeout(PipeConfig::default(), POLL_INTERVAL)
            .map_err(|err| pipe_error("accept failed", err))?
        else {
            continue;
        };
        peer += 1;
        info!(peer, "peer connected");
        // Listeners never reply.
        pipe.tx_eof();

        while running.load(Ordering::SeqCst) {
            poll_once(&[&pipe], Some(POLL_INTERVAL)).map_err(|err| io_error("poll failed", err))?;
            while let Some(record) = pipe.rx_nonblock() {
                print_record(&record, peer, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    return Ok(SUCCESS);
                }
            }
            if pipe.is_closed(Direction::Receive) {
                info!(peer, "peer disconnected");
                break;
            }
        }
    }

    Ok(SUCCESS)
}
