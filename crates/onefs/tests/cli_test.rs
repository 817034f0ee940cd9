//! Integration tests for the `onefs` CLI binary.
//!
//! Argument parsing, help, completions, and error exit codes run without a
//! cluster; request commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `onefs` binary with env isolation.
///
/// Clears every `ONEFS_*` variable and points config directories at a
/// nonexistent path so tests never read a real configuration.
fn onefs_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("onefs");
    cmd.env("HOME", "/tmp/onefs-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/onefs-cli-test-nonexistent")
        .env_remove("RUST_LOG");
    for var in [
        "ONEFS_PROFILE",
        "ONEFS_ENDPOINT",
        "ONEFS_USERNAME",
        "ONEFS_PASSWORD",
        "ONEFS_AUTH_MODE",
        "ONEFS_INSECURE",
        "ONEFS_TIMEOUT",
        "ONEFS_DEFAULT_PROFILE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// `onefs_cmd` with basic-auth credentials for `endpoint`.
fn onefs_at(endpoint: &str) -> assert_cmd::Command {
    let mut cmd = onefs_cmd();
    cmd.args(["--endpoint", endpoint, "--username", "admin", "--password", "secret"]);
    cmd
}

async fn mount_version(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/platform/latest/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "latest": "8.1" })))
        .mount(server)
        .await;
}

async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = onefs_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_verbs() {
    onefs_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("get")
            .and(predicate::str::contains("post"))
            .and(predicate::str::contains("delete"))
            .and(predicate::str::contains("version")),
    );
}

#[test]
fn test_version_flag() {
    onefs_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("onefs"));
}

#[test]
fn test_completions_zsh() {
    onefs_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_missing_endpoint_is_reported() {
    onefs_cmd()
        .args(["get", "/platform/1/cluster/config"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No cluster endpoint configured"));
}

#[test]
fn test_data_and_data_file_conflict() {
    onefs_cmd()
        .args(["post", "/x", "--data", "{}", "--data-file", "body.json"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_bad_timeout_is_usage_error() {
    onefs_at("https://cluster:8080")
        .args(["--timeout", "soon", "get", "/x"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("timeout"));
}

#[test]
fn test_unreachable_cluster_exit_code() {
    onefs_at("http://127.0.0.1:1")
        .args(["--timeout", "5s", "version"])
        .assert()
        .failure()
        .code(7);
}

// ── Against a mock cluster ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_version_prints_discovered_version() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    let mut cmd = onefs_at(&server.uri());
    cmd.arg("version");
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "8.1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_prints_pretty_json() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/platform/2/protocols/nfs/exports/"))
        .and(query_param("zone", "System"))
        .and(header("x-trace", "abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "exports": [{ "id": 7 }], "total": 1 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = onefs_at(&server.uri());
    cmd.args([
        "get",
        "/platform/2/protocols/nfs/exports",
        "--param",
        "zone=System",
        "--header",
        "X-Trace: abc",
    ]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["total"], 1);
    assert!(String::from_utf8_lossy(&output.stdout).contains("\n  \"exports\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_found_exit_code() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/platform/2/protocols/nfs/exports/42"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{ "code": "AEC_NOT_FOUND", "message": "Export 42 not found" }]
        })))
        .mount(&server)
        .await;

    let mut cmd = onefs_at(&server.uri());
    cmd.args(["delete", "/platform/2/protocols/nfs/exports", "--id", "42"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Export 42 not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_credentials_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/1/session/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut cmd = onefs_at(&server.uri());
    cmd.args(["--auth-mode", "session", "version"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}
