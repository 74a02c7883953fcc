//! Binary entry point behaviour.

use std::process::Command;

fn pagepack() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pagepack"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_url_exits_with_usage() {
    let output = pagepack().output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No URL provided"));
    assert!(stderr.contains("Usage:"));
}

#[test]
fn test_blank_url_counts_as_missing() {
    let output = pagepack().arg("   ").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No URL provided"));
}

#[test]
fn test_invalid_url_is_fatal() {
    let output = pagepack()
        .args(["--no-browser", "exa mple.com"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FATAL ERROR"));
}
