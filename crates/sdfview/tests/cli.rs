use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn help_lists_viewer_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_sdfview"))
        .arg("--help")
        .output()
        .expect("failed to run sdfview --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--size", "--poll-ms", "--query-ms", "--fly-speed", "--config"] {
        assert!(stdout.contains(flag), "missing {flag} in help output");
    }
}

#[test]
fn invalid_config_fails_before_opening_a_window() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("sdfview.toml");
    fs::write(&config, "version = 7\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sdfview"))
        .env("SDFVIEW_CONFIG_DIR", root.path())
        .env_remove("SDFVIEW_CONFIG")
        .output()
        .expect("failed to run sdfview");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported config version"), "{stderr}");
}
