//! Integration tests for basic CLI behavior.
//!
//! Covers standard flags, per-subcommand help, and the offline
//! subcommands (`decode`, `classify`).

#![allow(deprecated)] // cargo_bin deprecation; replacement not yet stable

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: get a Command for the `reel` binary.
fn reel() -> Command {
    Command::cargo_bin("reel").expect("binary 'reel' should be built")
}

fn xor_encode(plain: &str) -> String {
    let bytes: Vec<u8> = plain.bytes().map(|b| b ^ 56).collect();
    format!("-{}", hex::encode(bytes))
}

/// Writes a request file plus an empty config path into a temp dir.
fn fixture(request: &serde_json::Value) -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let request_path = dir.path().join("request.json");
    std::fs::write(&request_path, request.to_string()).unwrap();
    let config_path = dir.path().join("missing.toml");
    (dir, request_path, config_path)
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    reel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: reel"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("decode"))
        .stdout(predicate::str::contains("playlist"));
}

#[test]
fn version_flag_shows_semver() {
    reel()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^reel \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_subcommand_fails() {
    reel()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: reel"));
}

#[test]
fn unknown_subcommand_fails() {
    reel().arg("frobnicate").assert().failure();
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn resolve_help_lists_options() {
    reel()
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn playlist_requires_url() {
    reel().arg("playlist").assert().failure();
}

// ─── decode ──────────────────────────────────────────────────────────────────

#[test]
fn decode_reverses_xor() {
    reel()
        .args(["decode", &xor_encode("/apivtwo/clock?id=abc")])
        .assert()
        .success()
        .stdout("/apivtwo/clock?id=abc\n");
}

#[test]
fn decode_leaves_plain_urls() {
    reel()
        .args(["decode", "https://ok.ru/videoembed/1"])
        .assert()
        .success()
        .stdout("https://ok.ru/videoembed/1\n");
}

#[test]
fn decode_keeps_odd_length_payload() {
    reel()
        .args(["decode", "-abc"])
        .assert()
        .success()
        .stdout("-abc\n");
}

// ─── classify ────────────────────────────────────────────────────────────────

#[test]
fn classify_routes_and_drops_records() {
    let (_dir, request, config) = fixture(&serde_json::json!({
        "sourceRecords": [
            {"rawUrl": xor_encode("/apivtwo/clock?id=1"), "providerName": "Default", "kind": "internal", "priority": 7.0},
            {"rawUrl": "https://ok.ru/videoembed/2", "providerName": "Ok", "kind": "iframe", "priority": 3.0},
            {"rawUrl": "https://streamlare.com/e/3", "providerName": "Sl", "kind": "iframe", "priority": 1.0},
            {"rawUrl": "https://unknown.example/4", "providerName": "Mystery", "kind": "iframe", "priority": 1.0}
        ],
        "preferences": {"enabledProviders": ["default", "okru"]}
    }));

    reel()
        .args(["classify"])
        .arg(&request)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("internal\t7\tDefault\t/apivtwo/clock?id=1"))
        .stdout(predicate::str::contains("okru\t3\tOk\thttps://ok.ru/videoembed/2"))
        .stdout(predicate::str::contains("streamlare").not())
        .stdout(predicate::str::contains("unknown.example").not())
        .stderr(predicate::str::contains("2 of 4 records classified"));
}

#[test]
fn classify_json_output() {
    let (_dir, request, config) = fixture(&serde_json::json!({
        "sourceRecords": [
            {"rawUrl": "https://cdn.example/v.mp4", "providerName": "Yt-mp4", "kind": "player", "priority": 1.0}
        ]
    }));

    reel()
        .arg("classify")
        .arg(&request)
        .args(["--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type": "player""#))
        .stdout(predicate::str::contains(r#""decodedUrl": "https://cdn.example/v.mp4""#));
}

#[test]
fn classify_missing_file_fails() {
    reel()
        .args(["classify", "/nonexistent/request.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read request file"));
}

// ─── resolve ─────────────────────────────────────────────────────────────────

#[test]
fn resolve_empty_request_fails() {
    let (_dir, request, config) = fixture(&serde_json::json!({ "sourceRecords": [] }));

    reel()
        .arg("resolve")
        .arg(&request)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no source records"));
}

#[test]
fn resolve_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let request = dir.path().join("request.json");
    std::fs::write(&request, r#"{"sourceRecords":[{"rawUrl":"x"}]}"#).unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[scheduler]\nworkers = 0\n").unwrap();

    reel()
        .arg("resolve")
        .arg(&request)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("scheduler.workers"));
}
