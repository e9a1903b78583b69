mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "linewire", version, about = "Send, receive and store newline-framed JSON")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "linewire",
            "send",
            "/tmp/test.sock",
            "--json",
            "1",
            "--json",
            "[2]",
            "--wait",
            "2",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.json, vec!["1", "[2]"]);
        assert_eq!(args.wait, 2);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "linewire",
            "send",
            "/tmp/test.sock",
            "--json",
            "{\"x\":1}",
            "--file",
            "value.json",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_store_subcommand() {
        let cli = Cli::try_parse_from([
            "linewire",
            "--format",
            "raw",
            "store",
            "/tmp/value.json.gz",
            "--gzip",
            "--json",
            "{}",
        ])
        .expect("store args should parse");
        assert!(matches!(cli.command, Command::Store(ref args) if args.gzip));
        assert!(matches!(cli.format, Some(OutputFormat::Raw)));
    }
}
