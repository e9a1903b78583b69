#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/lwcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket did not appear at {}", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn linewire() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_linewire"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn send_waits_for_echoed_replies() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("echo.sock");

    let mut server = linewire()
        .arg("echo")
        .arg(&sock_path)
        .arg("--count")
        .arg("1")
        .stdout(Stdio::null())
        .spawn()
        .expect("echo command should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let output = linewire()
        .arg("--format")
        .arg("raw")
        .arg("send")
        .arg(&sock_path)
        .arg("--json")
        .arg("42")
        .arg("--json")
        .arg("\"ab\\\"c\"")
        .arg("--wait")
        .arg("2")
        .output()
        .expect("send should run");

    assert!(output.status.success(), "send failed: {output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "42\n\"ab\\\"c\"\n");

    let status = server.wait().expect("echo should exit after one connection");
    assert!(status.success());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_prints_records_from_stdin_sender() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("listen.sock");

    let listener = linewire()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .arg("--count")
        .arg("2")
        .stdout(Stdio::piped())
        .spawn()
        .expect("listen command should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let mut sender = linewire()
        .arg("send")
        .arg(&sock_path)
        .stdin(Stdio::piped())
        .spawn()
        .expect("send should start");
    sender
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(b"{\"n\": 1}\n\n[true, null]\n")
        .expect("stdin should accept input");
    assert!(sender.wait().expect("send should finish").success());

    let output = listener.wait_with_output().expect("listen should exit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"value\":{\"n\":1}"));
    assert!(lines[1].contains("\"value\":[true,null]"));
    assert!(lines[1].contains("\"valid\":true"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn store_and_load_gzip_value() {
    let dir = unique_temp_dir("store");
    let path = dir.join("value.json.gz");

    let stored = linewire()
        .arg("--format")
        .arg("json")
        .arg("store")
        .arg(&path)
        .arg("--gzip")
        .arg("--json")
        .arg("{\"k\": [1, 2,\n 3]}")
        .output()
        .expect("store should run");
    assert!(stored.status.success());
    assert!(String::from_utf8_lossy(&stored.stdout).contains("\"compressed\":true"));
    let on_disk = std::fs::read(&path).expect("stored file should exist");
    assert_eq!(&on_disk[..2], &[0x1f, 0x8b]);

    let loaded = linewire()
        .arg("--format")
        .arg("raw")
        .arg("load")
        .arg(&path)
        .output()
        .expect("load should run");
    assert!(loaded.status.success());
    assert_eq!(String::from_utf8_lossy(&loaded.stdout), "{\"k\": [1, 2,  3]}\n");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn load_missing_file_fails() {
    let dir = unique_temp_dir("load-missing");
    let output = linewire()
        .arg("load")
        .arg(dir.join("absent.json"))
        .output()
        .expect("load should run");
    assert_eq!(output.status.code(), Some(1));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn store_rejects_invalid_json() {
    let dir = unique_temp_dir("store-invalid");
    let output = linewire()
        .arg("store")
        .arg(dir.join("bad.json"))
        .arg("--json")
        .arg("{\"x\":1")
        .output()
        .expect("store should run");
    assert_eq!(output.status.code(), Some(60));
    assert!(!dir.join("bad.json").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_invalid_json_is_usage_error() {
    let output = linewire()
        .arg("send")
        .arg("/tmp/unused.sock")
        .arg("--json")
        .arg("[1,")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("send-missing");
    let output = linewire()
        .arg("send")
        .arg(dir.join("absent.sock"))
        .arg("--json")
        .arg("1")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_reports_name() {
    let output = linewire()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("linewire "));
}

#[test]
fn version_extended_reports_transport_details() {
    let output = linewire()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("record_delimiter: \\n"));
    assert!(stdout.contains("read_chunk_size: 8192"));
    assert!(stdout.contains("transports: unix,tcp"));
}
