//! Smoke tests for the `muxtun` binary's startup failure paths.
//!
//! The happy path needs a tun device and CAP_NET_ADMIN, so these only
//! exercise what must fail fast with a nonzero exit status.

use std::process::Command;

#[test]
fn missing_required_settings_exit_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_muxtun"))
        .output()
        .expect("failed to spawn muxtun");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("-i"), "stderr was: {stderr}");
}

#[test]
fn unreadable_config_file_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_muxtun"))
        .args(["--config", "/nonexistent/muxtun.toml"])
        .output()
        .expect("failed to spawn muxtun");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config"), "stderr was: {stderr}");
}

#[test]
fn missing_network_interface_exits_nonzero() {
    // Resource acquisition happens before the event loop; whichever of
    // the device or the interface fails first, the process must not hang.
    let output = Command::new(env!("CARGO_BIN_EXE_muxtun"))
        .args(["-i", "muxtun-smoke0", "-e", "muxtun-no-such0", "-c", "127.0.0.1"])
        .output()
        .expect("failed to spawn muxtun");
    assert!(!output.status.success());
}

#[test]
fn bad_numeric_argument_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_muxtun"))
        .args(["-i", "tun0", "-e", "lo", "-c", "127.0.0.1", "-p", "notaport"])
        .output()
        .expect("failed to spawn muxtun");
    assert!(!output.status.success());
}
