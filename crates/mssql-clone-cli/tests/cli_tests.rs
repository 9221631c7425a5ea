//! CLI integration tests for mssql-clone.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for various error conditions.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mssql-clone binary.
fn cmd() -> Command {
    Command::cargo_bin("mssql-clone").unwrap()
}

/// A config whose server refuses connections immediately.
fn unreachable_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "connection_string: \"Server=tcp:127.0.0.1,1;Database=master;User Id=sa;Password=secret;TrustServerCertificate=true\""
    )
    .unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--suffix"))
        .stdout(predicate::str::contains("--parallel-tables"))
        .stdout(predicate::str::contains("--drop-on-failure"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mssql-clone"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-dir"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1) and IO Errors (Exit Code 7)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_connection_string_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "clone:").unwrap();
    writeln!(file, "  parallel_tables: 2").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_template_without_placeholder_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "connection_string: \"Server=tcp:127.0.0.1,1;Database=Sales;User Id=sa;Password=secret\""
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_malformed_connection_string_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "connection_string: \"Server=tcp:127.0.0.1,1;Database=master;User Id=sa;Password=a=b\""
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid connection string"));
}

#[test]
fn test_bad_suffix_override_exits_with_code_1() {
    let config = unreachable_config();
    let logs = tempfile::tempdir().unwrap();

    cmd()
        .args(["--config", config.path().to_str().unwrap()])
        .args(["--log-dir", logs.path().to_str().unwrap()])
        .args(["run", "--suffix", "no-underscore"])
        .assert()
        .code(1);
}

// =============================================================================
// Exit Code Tests - Connection Validation (Exit Code 2)
// =============================================================================

#[test]
fn test_unreachable_server_health_check_exits_with_code_2() {
    let config = unreachable_config();

    cmd()
        .args(["--config", config.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAILED"))
        .stderr(predicate::str::contains("secret").not());
}

#[test]
fn test_unreachable_server_run_aborts_and_closes_log() {
    let config = unreachable_config();
    let logs = tempfile::tempdir().unwrap();

    cmd()
        .args(["--config", config.path().to_str().unwrap()])
        .args(["--log-dir", logs.path().to_str().unwrap()])
        .args(["run", "--suffix", "_test"])
        .assert()
        .code(2);

    let entries: Vec<_> = std::fs::read_dir(logs.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("mssql-clone_") && name.ends_with(".log"));

    let text = std::fs::read_to_string(&entries[0]).unwrap();
    assert!(text.lines().next().unwrap().ends_with("log opened"));
    assert!(text.lines().last().unwrap().ends_with("log closed"));
    assert_eq!(
        text.matches("Cannot initialize a SQL Server connection").count(),
        1
    );
    assert!(!text.contains("Retrieving the databases"));
    assert!(!text.contains("secret"));
}
