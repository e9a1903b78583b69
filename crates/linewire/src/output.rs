use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use linewire_codec::EncodedValue;
use linewire_pipe::Record;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput {
    peer: usize,
    size: usize,
    valid: bool,
    value: serde_json::Value,
    timestamp: String,
}

#[derive(Serialize)]
struct StoredOutput<'a> {
    path: &'a Path,
    size: usize,
    compressed: bool,
}

#[derive(Serialize)]
struct LoadedOutput<'a> {
    path: &'a Path,
    size: usize,
    value: serde_json::Value,
}

/// Print one received record. `peer` numbers connections in accept order.
pub fn print_record(record: &Record, peer: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let (valid, value) = json_value(record.as_bytes());
            print_json(&RecordOutput {
                peer,
                size: record.len(),
                valid,
                value,
                timestamp: now_unix_seconds(),
            });
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SIZE", "VALUE"])
                .add_row(vec![
                    peer.to_string(),
                    record.len().to_string(),
                    record.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={} size={} value={}", peer, record.len(), record);
        }
        OutputFormat::Raw => print_line(record.as_bytes()),
    }
}

pub fn print_stored(path: &Path, value: &EncodedValue, compressed: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StoredOutput {
            path,
            size: value.len(),
            compressed,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["PATH", "SIZE", "COMPRESSED"])
                .add_row(vec![
                    path.display().to_string(),
                    value.len().to_string(),
                    compressed.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "stored path={} size={} compressed={}",
                path.display(),
                value.len(),
                compressed
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_loaded(path: &Path, value: &EncodedValue, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&LoadedOutput {
            path,
            size: value.len(),
            value: json_value(value.as_bytes()).1,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "SIZE", "VALUE"])
                .add_row(vec![
                    path.display().to_string(),
                    value.len().to_string(),
                    value.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("path={} size={} value={}", path.display(), value.len(), value);
        }
        OutputFormat::Raw => print_line(value.as_bytes()),
    }
}

/// Parse record bytes for structured output. Records that are not valid
/// JSON are reported as their lossy text.
fn json_value(bytes: &[u8]) -> (bool, serde_json::Value) {
    match serde_json::from_slice(bytes) {
        Ok(value) => (true, value),
        Err(_) => (
            false,
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ),
    }
}

fn print_json(out: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_line(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_records_become_strings() {
        let (valid, value) = json_value(br#"{"a":[1,2]}"#);
        assert!(valid);
        assert_eq!(value["a"][1], 2);

        let (valid, value) = json_value(b"{\"a\":");
        assert!(!valid);
        assert_eq!(value, serde_json::Value::String("{\"a\":".to_string()));
    }
}
