//! Shared harness for driving the `uad` binary from integration tests.
//!
//! Every case runs with its own config home so a developer's real
//! configuration never leaks in, and leaves a log of the invocation under the
//! cargo target tmp dir.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub struct CaseResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
    pub home: PathBuf,
}

pub fn run_cli_case(name: &str, args: &[&str]) -> CaseResult {
    run_cli_case_with_env(name, args, &[])
}

/// Run `uad` with `args` plus extra environment variables.
pub fn run_cli_case_with_env(name: &str, args: &[&str], env: &[(&str, &str)]) -> CaseResult {
    let case_dir = case_dir(name);
    let home = case_dir.join("home");
    std::fs::create_dir_all(&home).expect("create case home");

    let mut command = Command::new(env!("CARGO_BIN_EXE_uad"));
    command
        .args(args)
        .env("XDG_CONFIG_HOME", &home)
        .env("HOME", &home)
        .env("UAD_OUTPUT_FORMAT", "human")
        .env_remove("UAD_ADB")
        .env_remove("UAD_LOG");
    for (key, value) in env {
        command.env(key, value);
    }

    let output = command.output().expect("spawn uad binary");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_path = case_dir.join("case.log");
    let mut log = String::new();
    let _ = writeln!(log, "case: {name}");
    let _ = writeln!(log, "args: {args:?}");
    let _ = writeln!(log, "env: {env:?}");
    let _ = writeln!(log, "status: {:?}", output.status.code());
    let _ = writeln!(log, "--- stdout ---\n{stdout}");
    let _ = writeln!(log, "--- stderr ---\n{stderr}");
    std::fs::write(&log_path, log).expect("write case log");

    CaseResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
        home,
    }
}

fn case_dir(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR"))
        .join("uad-cases")
        .join(name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).expect("reset case dir");
    }
    std::fs::create_dir_all(&dir).expect("create case dir");
    dir
}

/// Write an executable shell script standing in for `adb`.
///
/// The script sees the same argv the real tool would, so `case "$*"` patterns
/// like `"-s S1 shell getprop ro.product.model"` script individual commands.
#[cfg(unix)]
pub fn fake_adb(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-adb");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake adb");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake adb");
    path
}
