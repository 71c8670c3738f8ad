#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn xenowire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xenowire"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("XENOWIRE_CONFIG")
        .output()
        .expect("xenowire should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn temp_config(tag: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "xenowire-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("xenowire.json");
    std::fs::write(&path, contents).expect("config should be writable");
    path
}

#[test]
fn encode_empty_message_with_custom_preload() {
    let output = xenowire(&[
        "--preload", "0xAF", "--format", "pretty", "encode", "--code", "0x0010", "--id", "1",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "080000c001001000");
}

#[test]
fn encode_json_reports_header_fields() {
    let output = xenowire(&["--format", "json", "encode", "--code", "256", "--data", "hi"]);
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("encode output should be JSON");
    assert_eq!(value["bytes_total"], 10);
    assert_eq!(value["message_code"], 256);
    assert_eq!(value["code_name"], "USER");
}

#[test]
fn decode_delivers_message() {
    let output = xenowire(&[
        "--preload",
        "0xAF",
        "--format",
        "json",
        "decode",
        "080000c001001000",
    ]);
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("decode output should be JSON");
    assert_eq!(value["kind"], "message");
    assert_eq!(value["unique_id"], 1);
    assert_eq!(value["message_code"], 16);
}

#[test]
fn decode_reports_checksum_mismatch() {
    let output = xenowire(&[
        "--preload",
        "0xAF",
        "--format",
        "pretty",
        "decode",
        "080000c101001000",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert!(text.starts_with("faulty"), "unexpected output: {text}");
    assert!(text.contains("checksum mismatch"));
}

#[test]
fn decode_chunked_input_after_sync_filler() {
    let output = xenowire(&[
        "--format",
        "json",
        "decode",
        "04000055 04000055 0a00002c0500000168 69",
        "--chunk",
        "1",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(r#""payload_hex":"6869""#));
}

#[test]
fn decode_prints_queued_ack() {
    let config = temp_config(
        "ack",
        r#"{"codes":[{"code":256,"name":"ping","demands_ack":true}]}"#,
    );
    let config = config.to_str().expect("temp path should be UTF-8");

    let encoded = xenowire(&[
        "--config", config, "--format", "pretty", "encode", "--code", "256", "--id", "7",
    ]);
    assert!(encoded.status.success());
    let frame = stdout(&encoded);

    let output = xenowire(&[
        "--config", config, "--format", "pretty", "decode", &frame, "--replies",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("message id=0x0007 code=0x0100 (ping)"), "{text}");
    assert!(text.contains("reply id=0x0007 code=0x0001 (REPLY)"), "{text}");
}

#[test]
fn sync_prints_filler() {
    let output = xenowire(&["--format", "pretty", "sync", "2"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "0400005504000055");
}

#[test]
fn non_hex_digit_is_usage_error() {
    let output = xenowire(&["decode", "08zz"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid character"));
}

#[test]
fn bad_hex_is_usage_error() {
    let output = xenowire(&["decode", "abc"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Odd number of digits"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = temp_config("invalid", r#"{"protocol":{"pool_capacity":0}}"#);
    let output = xenowire(&[
        "--config",
        config.to_str().expect("temp path should be UTF-8"),
        "sync",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = xenowire(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        format!("xenowire {}", env!("CARGO_PKG_VERSION"))
    );
}
