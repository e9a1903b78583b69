use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod load;
pub mod send;
pub mod store;
pub mod version;

/// Upper bound on each readiness wait, so Ctrl-C is noticed promptly.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an echo server.
    Echo(EchoArgs),
    /// Send JSON records and optionally wait for replies.
    Send(SendArgs),
    /// Listen and print received records.
    Listen(ListenArgs),
    /// Write one JSON value to a file.
    Store(StoreArgs),
    /// Read a JSON value written by `store`.
    Load(LoadArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Store(args) => store::run(args, format),
        Command::Load(args) => load::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after serving N connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path, or `host:port` with --tcp.
    pub target: String,
    /// Connect over TCP instead of a Unix domain socket.
    #[arg(long)]
    pub tcp: bool,
    /// JSON value to send; repeat for several records. Default: one value per stdin line.
    #[arg(long, conflicts_with = "file")]
    pub json: Vec<String>,
    /// Send a value stored with `store` (plain or gzip).
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
    /// Wait for N reply records and print them.
    #[arg(long, default_value = "0")]
    pub wait: usize,
    /// Maximum time to finish sending and collect replies (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after receiving N records.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Destination file.
    pub path: PathBuf,
    /// JSON value to store. Default: read from stdin.
    #[arg(long)]
    pub json: Option<String>,
    /// Compress with gzip.
    #[arg(long)]
    pub gzip: bool,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// File written by `store`.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build and transport details.
    #[arg(long)]
    pub extended: bool,
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
