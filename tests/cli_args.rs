//! Integration tests for CLI argument handling
//!
//! Runs the built binary; every run uses `--no-persist` or `--help` so the
//! user's real cache is never touched.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_skycast"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute skycast")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skycast"), "Help should mention skycast");
    assert!(stdout.contains("--offline"), "Help should mention --offline");
    assert!(stdout.contains("--policy"), "Help should mention --policy");
}

#[test]
fn test_invalid_policy_prints_error_and_exits() {
    let output = run_cli(&["--no-persist", "--policy", "sometimes", "Paris"]);
    assert!(!output.status.success(), "Expected invalid policy to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid policy"),
        "Should print error message about invalid policy: {}",
        stderr
    );
}

#[test]
fn test_invalid_units_prints_error_and_exits() {
    let output = run_cli(&["--no-persist", "--units", "kelvin", "Paris"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid units"), "stderr: {}", stderr);
}

#[test]
fn test_offline_without_cache_fails_with_network_error() {
    let output = run_cli(&["--offline", "--no-persist", "Paris"]);
    assert!(!output.status.success(), "Nothing cached, nothing reachable");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Network error") && stdout.contains("no connectivity"),
        "stdout: {}",
        stdout
    );
}

#[test]
fn test_offline_json_reports_error_kind() {
    let output = run_cli(&["--offline", "--no-persist", "--json", "Paris"]);
    assert!(!output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed[0]["status"], "error");
    assert_eq!(parsed[0]["kind"], "network");
    assert_eq!(parsed[0]["requested"], "Paris");
}

#[test]
fn test_history_with_fresh_cache_is_empty() {
    let output = run_cli(&["--no-persist", "--history"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No recent searches"), "stdout: {}", stdout);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use skycast::cli::{parse_policy_arg, Cli, RunOptions};
    use skycast::repository::FetchPolicy;

    #[test]
    fn test_cli_no_args_shows_history() {
        let cli = Cli::parse_from(["skycast"]);
        let options = RunOptions::from_cli(&cli).unwrap();
        assert!(options.show_history);
    }

    #[test]
    fn test_cli_offline_flag() {
        let cli = Cli::parse_from(["skycast", "--offline", "Lima"]);
        let options = RunOptions::from_cli(&cli).unwrap();
        assert!(options.offline);
        assert_eq!(options.cities, vec!["Lima".to_string()]);
    }

    #[test]
    fn test_parse_policy_arg_cache_first() {
        assert_eq!(parse_policy_arg("cache-first").unwrap(), FetchPolicy::CacheFirst);
    }
}
