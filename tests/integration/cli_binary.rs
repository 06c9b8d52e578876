//! Runs the `vantage` binary end to end.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write_config(dir: &Path, log_file: &Path) -> std::path::PathBuf {
    let path = dir.join("vantage.toml");
    fs::write(
        &path,
        format!(
            r#"
[store]
project_id = "abc123"
base_url = "http://127.0.0.1:9"
token = "sk-secret"
timeout_ms = 500

[logging]
output = "file"
file = "{}"
"#,
            log_file.display()
        ),
    )
    .unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vantage"))
        .env_remove("VANTAGE_LOG")
        .env_remove("VANTAGE_LOG_FORMAT")
        .env_remove("VANTAGE_LOG_OUTPUT")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_config_show_redacts_token_and_logs_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("logs").join("vantage.log");
    let config = write_config(temp_dir.path(), &log_file);

    let output = run(&config, &["config", "show"]);
    assert!(
        output.status.success(),
        "config show should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("abc123"));
    assert!(stdout.contains("<redacted>"));
    assert!(!stdout.contains("sk-secret"));

    let content = fs::read_to_string(&log_file).unwrap();
    assert!(
        content.contains("Vantage CLI starting"),
        "log file should contain a startup message; got: {}",
        content
    );
}

#[test]
fn test_unreachable_store_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), &temp_dir.path().join("vantage.log"));

    let output = run(&config, &["get", "term-42", "--perspective", "published"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not be reached"), "stderr={}", stderr);
}

#[test]
fn test_draft_identity_is_not_a_key() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), &temp_dir.path().join("vantage.log"));

    let output = run(&config, &["get", "drafts.term-42", "-p", "drafts"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid query"), "stderr={}", stderr);
}

#[test]
fn test_perspective_flag_is_required() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), &temp_dir.path().join("vantage.log"));

    let output = run(&config, &["list", "--type", "glossaryTerm"]);
    assert!(!output.status.success());
}
