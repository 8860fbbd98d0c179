//! Integration tests for the `ovenlink` CLI binary.
//!
//! These exercise argument parsing, config handling, and the offline
//! history commands against a temporary database. No relay is contacted.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use predicates::prelude::*;
use tempfile::TempDir;

use ovenlink_core::{HistoryLocation, HistorySnapshot, TimeSeriesStore};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `ovenlink` binary with config and data dirs
/// isolated under `dir`.
fn ovenlink_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ovenlink");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env("OVENLINK_CONFIG", dir.join("config.toml"))
        .env("OVENLINK_DATABASE_PATH", dir.join("history.sqlite"))
        .env_remove("OVENLINK_OUTPUT")
        .env_remove("OVENLINK_TIMEOUT")
        .env_remove("OVENLINK_RELAY_URL")
        .env_remove("OVENLINK_ID_TOKEN")
        .env_remove("OVENLINK_REFRESH_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn snapshot(appliance_id: &str, at: DateTime<Utc>, cook_id: Option<&str>, dry: f64) -> HistorySnapshot {
    serde_json::from_value(serde_json::json!({
        "id": null,
        "appliance_id": appliance_id,
        "cook_id": cook_id,
        "updated_timestamp": at,
        "dry": dry, "dry_top": dry, "dry_bottom": dry,
        "wet": 40.0, "wet_dosed": false,
        "temperature_mode": "dry",
        "dry_setpoint": 200.0, "wet_setpoint": null,
        "lamp_on": true, "lamp_preference": true,
        "vent_open": false, "door_closed": true, "water_tank_empty": false,
        "fan_speed": 100,
        "heating_top_on": true, "heating_bottom_on": false, "heating_rear_on": true,
        "heating_top_watts": 500, "heating_bottom_watts": 0, "heating_rear_watts": 1000,
        "probe_connected": false, "probe": null, "probe_setpoint": null,
        "steam_mode": "idle",
        "evaporator": 30.0, "boiler": 30.0, "boiler_dosed": false,
        "evaporator_watts": 0, "boiler_watts": 0,
        "relative_humidity": null, "relative_humidity_setpoint": null,
        "steam_percentage_setpoint": null,
        "timer_mode": "idle", "timer_initial": 0, "timer_current": 0
    }))
    .unwrap()
}

/// Seed the temp database with three snapshots one minute apart, ending
/// two minutes ago.
fn seed(dir: &Path) -> DateTime<Utc> {
    let base = (Utc::now() - TimeDelta::minutes(4)).trunc_subsecs(0);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let store = TimeSeriesStore::open(&HistoryLocation::File(dir.join("history.sqlite")), false)
            .await
            .unwrap();
        for (i, dry) in [150.0, 175.0, 190.0].into_iter().enumerate() {
            let at = base + TimeDelta::minutes(i64::try_from(i).unwrap());
            store.append(&snapshot("oven-1", at, Some("cook-a"), dry)).await.unwrap();
        }
        store.close().await;
    });
    base
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    let output = ovenlink_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("start"))
            .and(predicate::str::contains("history")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ovenlink"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ovenlink"));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_unknown_preset_is_usage_error() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["start", "broil"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_unit_is_usage_error() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["unit", "kelvin"])
        .assert()
        .code(2);
}

#[test]
fn test_bad_history_range_is_usage_error() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "--since", "3h"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());

    ovenlink_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .code(2);

    ovenlink_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("relay_url"));
}

#[test]
fn test_config_show_redacts_api_key() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "token_api_key = \"super-secret\"\n").unwrap();
    ovenlink_cmd(dir.path())
        .args(["config", "show", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret").not());
}

#[test]
fn test_invalid_output_in_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "output = \"xml\"\n").unwrap();
    ovenlink_cmd(dir.path())
        .args(["history", "oven-1"])
        .assert()
        .code(2);
}

// ── History ─────────────────────────────────────────────────────────

#[test]
fn test_history_empty_database() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "-o", "json-compact"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn test_history_at_without_rows_is_not_found() {
    let dir = TempDir::new().unwrap();
    ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "--at", "2024-05-01T12:00:00Z"])
        .assert()
        .code(4);
}

#[test]
fn test_history_lists_seeded_rows() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());

    let output = ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "--since", "15m", "-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    let dry: Vec<f64> = rows.iter().map(|r| r["dry"].as_f64().unwrap()).collect();
    assert_eq!(dry, vec![150.0, 175.0, 190.0]);

    // Another appliance has nothing recorded.
    ovenlink_cmd(dir.path())
        .args(["history", "oven-2", "-o", "json-compact"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn test_history_at_picks_nearest() {
    let dir = TempDir::new().unwrap();
    let base = seed(dir.path());
    let at = base + TimeDelta::seconds(70);

    let output = ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "--at", &at.to_rfc3339(), "-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let hit: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(hit["dry"].as_f64(), Some(175.0));
}

#[test]
fn test_history_by_cook() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());

    let output = ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "--cook", "cook-a", "-o", "json-compact"])
        .output()
        .unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 3);

    ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "--cook", "cook-b", "-o", "json-compact"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn test_history_reset_requires_yes() {
    let dir = TempDir::new().unwrap();
    let output = ovenlink_cmd(dir.path())
        .arg("history-reset")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

#[test]
fn test_history_reset_deletes_rows() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());

    ovenlink_cmd(dir.path())
        .args(["history-reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 3 snapshots"));

    ovenlink_cmd(dir.path())
        .args(["history", "oven-1", "-o", "json-compact"])
        .assert()
        .success()
        .stdout("[]\n");
}
