//! Integration tests for the `ootb` CLI binary.
//!
//! Argument parsing, help, completions and config handling run without a
//! device; the read and write paths run against a wiremock stand-in.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ootb` binary with env isolation.
///
/// Clears all `OOTB_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn ootb_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ootb");
    cmd.env("HOME", "/tmp/ootb-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/ootb-cli-test-nonexistent")
        .env_remove("OOTB_DEVICE")
        .env_remove("OOTB_CONFIG")
        .env_remove("OOTB_OUTPUT")
        .env_remove("OOTB_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let device = format!("{}/api/", server.uri());
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    tokio::task::spawn_blocking(move || {
        ootb_cmd()
            .args(["--device", &device, "--timeout", "5"])
            .args(&args)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let output = ootb_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    ootb_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("get")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("scan"))
            .and(predicate::str::contains("firmware")),
    );
}

#[test]
fn version_flag() {
    ootb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ootb"));
}

#[test]
fn completions_bash() {
    ootb_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn unknown_resource_is_a_usage_error() {
    let output = ootb_cmd().args(["get", "toaster"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("unknown resource 'toaster'"), "{text}");
    assert!(text.contains("firmware-update"), "{text}");
}

#[test]
fn unknown_mutation_is_a_usage_error() {
    let output = ootb_cmd().args(["set", "reboot"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("set-hostname"));
}

#[test]
fn malformed_read_argument_is_rejected() {
    let output = ootb_cmd()
        .args(["--device", "http://127.0.0.1:9/api/", "get", "networks", "--arg", "wlan0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("KEY=VALUE"));
}

#[test]
fn non_http_device_url_is_rejected() {
    let output = ootb_cmd()
        .args(["--device", "ftp://192.168.7.1/", "get", "board"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("device.url"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_path_honours_flag() {
    ootb_cmd()
        .args(["--config", "/tmp/elsewhere/ootb.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/ootb.toml"));
}

#[test]
fn config_init_writes_defaults_once() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    let file_arg = file.to_str().unwrap();

    ootb_cmd()
        .args(["--config", file_arg, "config", "init"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&file).unwrap().contains("[device]"));

    let output = ootb_cmd()
        .args(["--config", file_arg, "config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--force"));

    ootb_cmd()
        .args(["--config", file_arg, "config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_show_applies_flag_overrides() {
    ootb_cmd()
        .args(["--device", "http://10.0.0.9/api/", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("url = \"http://10.0.0.9/api/\"")
                .and(predicate::str::contains("[poll.firmware_update]")),
        );
}

// ── Device round trips ──────────────────────────────────────────────

#[tokio::test]
async fn get_prints_the_device_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/board"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "model": "ootb-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(&server, &["-o", "json-compact", "get", "board"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), r#"{"model":"ootb-1"}"#);
}

#[tokio::test]
async fn get_passes_read_arguments_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/networks"))
        .and(query_param("interface", "wlan1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["home", "office"])))
        .mount(&server)
        .await;

    let output = run_against(&server, &["-o", "plain", "get", "networks", "-a", "interface=wlan1"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "home\noffice");
}

#[tokio::test]
async fn missing_endpoint_exits_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/iot-cloud/registration"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no route"))
        .mount(&server)
        .await;

    let output = run_against(&server, &["get", "iot-cloud-registration"]).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test]
async fn set_reports_refreshed_reads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/hostname"))
        .and(body_json(json!({ "hostname": "bench-3" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &["-o", "json-compact", "set", "set-hostname", "--body", r#"{"hostname":"bench-3"}"#],
    )
    .await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mutation"], "set-hostname");
    assert_eq!(report["response"], json!({ "ok": true }));
    // Nothing was read in this process, so nothing needed refreshing.
    assert_eq!(report["refreshed"], json!([]));
}

#[tokio::test]
async fn set_with_invalid_json_body_is_a_usage_error() {
    let server = MockServer::start().await;
    let output = run_against(&server, &["set", "set-hostname", "--body", "{not json"]).await;
    assert_eq!(output.status.code(), Some(2));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_device_exits_with_connection_code() {
    // Port 9 (discard) is closed on test hosts.
    let output = tokio::task::spawn_blocking(|| {
        ootb_cmd()
            .args(["--device", "http://127.0.0.1:9/api/", "get", "board"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

#[tokio::test]
async fn scan_prints_networks_once_the_device_has_them() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/networks/scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/networks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "ssid": "home", "signal": -40 }])),
        )
        .mount(&server)
        .await;

    let output = run_against(&server, &["-o", "json-compact", "scan"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r#"[{"signal":-40,"ssid":"home"}]"#
    );
}

#[tokio::test]
async fn failed_firmware_update_exits_with_operation_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/firmware/update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/firmware/update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "percentage": 100,
            "status": "md5",
            "md5Error": "checksum mismatch",
        })))
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &["firmware", "update", "--url", "http://images.local/fw.tar", "--md5", "abc"],
    )
    .await;
    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("checksum mismatch"));
}

#[tokio::test]
async fn watch_stops_after_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hostname"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("ootb-7f3a")))
        .mount(&server)
        .await;

    // Periodic refetches keep transitions coming however fast the first read lands.
    let output = run_against(
        &server,
        &["-o", "json-compact", "watch", "hostname", "-i", "1", "-n", "3"],
    )
    .await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(
        lines
            .iter()
            .any(|l| l["status"] == "success" && l["value"] == "ootb-7f3a")
    );
}
