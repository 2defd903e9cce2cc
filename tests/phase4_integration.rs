//! Phase 4 tests: CLI integration and end-to-end flows.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

use trestle_cache::cli::workload::{parse_workload, OpOutcome};
use trestle_cache::{BitemporalCache, CacheConfig, Identifier};

// ==================== CLI Helpers ====================

/// Locate the `trestle` binary built alongside test binaries.
fn trestle_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove "deps"
    path.push("trestle");
    path
}

/// Run the `trestle` CLI with the given arguments and return the output.
fn run_trestle(args: &[&str]) -> Output {
    Command::new(trestle_bin())
        .args(args)
        .output()
        .expect("Failed to run trestle")
}

/// Helper: assert that the CLI ran successfully (exit code 0).
fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "trestle failed with status {:?}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

/// Helper: get stdout as a string from an Output.
fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper: write `content` to a fresh temp file.
fn temp_file(content: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(content.as_bytes()).unwrap();
    tmp.flush().unwrap();
    tmp
}

const SUPERSEDE_WORKLOAD: &str = r#"[
    {"op": "write", "identifier": "county_42",
     "valid": {"low": 0, "high": 100}, "transaction": {"low": 0},
     "payload": {"name": "King"}},
    {"op": "read", "identifier": "county_42", "valid_time": 50, "transaction_time": 10},
    {"op": "read", "identifier": "county_42", "valid_time": 150, "transaction_time": 10},
    {"op": "write", "identifier": "county_42",
     "valid": {"low": 20, "high": 80}, "transaction": {"low": 20},
     "payload": {"name": "King County"}},
    {"op": "read", "identifier": "county_42", "valid_time": 50, "transaction_time": 30},
    {"op": "invalidate", "identifier": "county_42"}
]"#;

// ==================== Locate Tests ====================

#[test]
fn test_cli_locate_text() {
    let output = run_trestle(&["locate", "--max-depth", "4", "--domain-max", "10", "8", "8"]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("Node: 29"), "unexpected output: {out}");
    assert!(out.contains("Range: [8, 9)"));
}

#[test]
fn test_cli_locate_json() {
    let output = run_trestle(&[
        "--format",
        "json",
        "locate",
        "--max-depth",
        "0",
        "--domain-max",
        "10",
        "8",
        "8",
    ]);
    assert_success(&output);
    let info: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    assert_eq!(info["node"], 1);
    assert_eq!(info["depth"], 0);
    assert_eq!(info["range"], serde_json::json!([0, 11]));
}

#[test]
fn test_cli_locate_open_interval() {
    let output = run_trestle(&[
        "--format",
        "json",
        "locate",
        "--max-depth",
        "4",
        "--domain-max",
        "10",
        "9",
    ]);
    assert_success(&output);
    let info: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    assert_eq!(info["interval"]["high"], serde_json::Value::Null);
    assert_eq!(info["range"][1], 11);
}

#[test]
fn test_cli_locate_out_of_domain() {
    let output = run_trestle(&["locate", "--max-depth", "4", "--domain-max", "10", "5", "20"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

// ==================== Replay Tests ====================

#[test]
fn test_cli_replay_text() {
    let workload = temp_file(SUPERSEDE_WORKLOAD);
    let output = run_trestle(&["replay", workload.path().to_str().unwrap()]);
    assert_success(&output);

    let out = stdout_str(&output);
    assert!(out.contains("-> written"));
    assert!(out.contains("-> hit"));
    assert!(out.contains("-> miss"));
    assert!(out.contains("superseded county_42"));
    assert!(out.contains("Operations: 6 (0 failed)"));
    assert!(out.contains("Hits: 2  Misses: 1"));
}

#[test]
fn test_cli_replay_json() {
    let workload = temp_file(SUPERSEDE_WORKLOAD);
    let output = run_trestle(&[
        "--format",
        "json",
        "replay",
        workload.path().to_str().unwrap(),
    ]);
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 6);
    assert_eq!(steps[1]["result"]["outcome"], "hit");
    assert_eq!(steps[1]["result"]["payload"]["name"], "King");
    assert_eq!(steps[2]["result"]["outcome"], "miss");
    assert_eq!(steps[3]["removals"][0]["cause"], "superseded");
    assert_eq!(steps[4]["result"]["payload"]["name"], "King County");
    assert_eq!(steps[5]["result"]["count"], 1);
    assert_eq!(steps[5]["removals"][0]["cause"], "invalidated");

    assert_eq!(report["stats"]["writes"], 2);
    assert_eq!(report["stats"]["superseded"], 1);
    assert_eq!(report["stats"]["invalidations"], 1);
}

#[test]
fn test_cli_replay_with_config_reports_failures() {
    let config = temp_file("max_depth = 6\ndomain_max = 1000\n");
    let workload = temp_file(
        r#"[
            {"op": "write", "identifier": "x", "valid": {"low": 0, "high": 5000},
             "transaction": {"low": 0}, "payload": null},
            {"op": "set_max_depth", "depth": 99},
            {"op": "write", "identifier": "x", "valid": {"low": 0, "high": 500},
             "transaction": {"low": 0}, "payload": "ok"}
        ]"#,
    );
    let output = run_trestle(&[
        "--format",
        "json",
        "replay",
        workload.path().to_str().unwrap(),
        "--config",
        config.path().to_str().unwrap(),
    ]);
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    assert_eq!(report["steps"][0]["result"]["outcome"], "failed");
    assert_eq!(report["steps"][1]["result"]["outcome"], "failed");
    assert_eq!(report["steps"][2]["result"]["outcome"], "written");
    assert_eq!(report["stats"]["writes"], 1);
}

#[test]
fn test_cli_replay_missing_file() {
    let output = run_trestle(&["replay", "/nonexistent/workload.json"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_replay_malformed_workload() {
    let workload = temp_file(r#"[{"op": "write", "identifier": "x"}]"#);
    let output = run_trestle(&["replay", workload.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

// ==================== Config Tests ====================

#[test]
fn test_cli_config_defaults() {
    let output = run_trestle(&["config"]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("max_depth = 16"));
    assert!(out.contains("9999-12-31"));
}

#[test]
fn test_cli_config_from_file_json() {
    let config = temp_file("max_depth = 5\nstore_capacity = 64\n");
    let output = run_trestle(&[
        "--format",
        "json",
        "config",
        "--config",
        config.path().to_str().unwrap(),
    ]);
    assert_success(&output);
    let parsed: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    assert_eq!(parsed["max_depth"], 5);
    assert_eq!(parsed["store_capacity"], 64);
    assert_eq!(parsed["lock_wait_timeout_ms"], 5000);
}

#[test]
fn test_cli_config_invalid() {
    let config = temp_file("max_depth = 100\n");
    let output = run_trestle(&["config", "--config", config.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

// ==================== End-to-End Tests ====================

#[test]
fn test_config_file_drives_cache() {
    let config_file = temp_file("max_depth = 10\ndomain_max = 100000\nstore_capacity = 3\n");
    let config = CacheConfig::load(config_file.path()).unwrap();
    let cache: BitemporalCache<serde_json::Value> = BitemporalCache::new(config).unwrap();

    let ops = parse_workload(
        r#"[
            {"op": "write", "identifier": "a", "valid": {"low": 0, "high": 10}, "transaction": {"low": 0}, "payload": 1},
            {"op": "write", "identifier": "b", "valid": {"low": 0, "high": 10}, "transaction": {"low": 0}, "payload": 2},
            {"op": "write", "identifier": "c", "valid": {"low": 0, "high": 10}, "transaction": {"low": 0}, "payload": 3},
            {"op": "read", "identifier": "a", "valid_time": 5, "transaction_time": 5},
            {"op": "write", "identifier": "d", "valid": {"low": 0, "high": 10}, "transaction": {"low": 0}, "payload": 4},
            {"op": "read", "identifier": "b", "valid_time": 5, "transaction_time": 5}
        ]"#,
    )
    .unwrap();
    let outcomes: Vec<OpOutcome> = ops.iter().map(|op| op.apply(&cache)).collect();

    // Reading "a" refreshed it, so "b" was the one evicted for "d".
    assert_eq!(
        outcomes[3],
        OpOutcome::Hit {
            payload: serde_json::json!(1)
        }
    );
    assert_eq!(outcomes[5], OpOutcome::Miss);
    assert_eq!(
        cache.read(&Identifier::new("a"), 5, 5).unwrap(),
        Some(serde_json::json!(1))
    );

    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.stored_payloads, 3);
    cache.shutdown(true).unwrap();
}
