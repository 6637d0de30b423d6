//! Re-enable scripts written before (or after) destructive batches.
//!
//! Each call creates `<base>/<YYYYmmdd-HHMMSS>-<serial>/` holding `restore.sh`
//! and `restore.bat`. Directory names sort chronologically.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::core::errors::{Result, UadError};

/// POSIX shell dialect.
pub const SHELL_SCRIPT: &str = "restore.sh";
/// `cmd.exe` dialect.
pub const BATCH_SCRIPT: &str = "restore.bat";

/// Upper bound on same-second collisions before giving up.
const MAX_COLLISION_SUFFIX: u32 = 1_000;

fn is_package_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')
}

fn is_serial_char(ch: char) -> bool {
    is_package_char(ch) || ch == ':'
}

/// Reject anything a shell or `cmd.exe` could interpret.
fn validate(value: &str, allowed: fn(char) -> bool, what: &'static str) -> Result<()> {
    if value.is_empty() || !value.chars().all(allowed) {
        return Err(UadError::InvalidIdentifier {
            identifier: value.to_string(),
            reason: what,
        });
    }
    Ok(())
}

/// `192.168.1.5:5555` -> `192.168.1.5_5555`.
fn directory_component(serial: &str) -> String {
    serial.replace(':', "_")
}

/// Script bodies for one device and package set, without touching disk.
#[must_use]
pub fn render_scripts(serial: &str, packages: &[String]) -> (String, String) {
    let mut shell = format!("#!/usr/bin/env bash\n# Restore script for device: {serial}\n");
    let mut batch = format!("@echo off\r\nREM Restore script for device: {serial}\r\n");
    for package in packages {
        let line = format!("adb -s {serial} shell pm enable {package}");
        shell.push_str(&line);
        shell.push('\n');
        batch.push_str(&line);
        batch.push_str("\r\n");
    }
    (shell, batch)
}

/// Writes restore scripts under one base directory.
#[derive(Debug, Clone)]
pub struct RestoreScriptGenerator {
    base_dir: PathBuf,
}

impl RestoreScriptGenerator {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write both scripts into a fresh directory and return it.
    pub fn generate(&self, serial: &str, packages: &[String]) -> Result<PathBuf> {
        self.generate_at(serial, packages, Local::now())
    }

    /// [`Self::generate`] with an explicit timestamp.
    pub fn generate_at(
        &self,
        serial: &str,
        packages: &[String],
        now: DateTime<Local>,
    ) -> Result<PathBuf> {
        validate(serial, is_serial_char, "device serial may only contain [A-Za-z0-9._:-]")?;
        for package in packages {
            validate(package, is_package_char, "package name may only contain [A-Za-z0-9._-]")?;
        }

        fs::create_dir_all(&self.base_dir).map_err(|e| UadError::io(&self.base_dir, e))?;
        let dir = self.create_fresh_dir(&format!(
            "{}-{}",
            now.format("%Y%m%d-%H%M%S"),
            directory_component(serial)
        ))?;

        let (shell, batch) = render_scripts(serial, packages);
        fill_fresh_dir(&dir, &shell, &batch)?;

        info!(
            dir = %dir.display(),
            serial,
            packages = packages.len(),
            "restore scripts written"
        );
        Ok(dir)
    }

    /// `create_dir` fails on an existing path, so two calls in the same second
    /// get `-1`, `-2`, ... instead of overwriting each other.
    fn create_fresh_dir(&self, stem: &str) -> Result<PathBuf> {
        for attempt in 0..=MAX_COLLISION_SUFFIX {
            let name = if attempt == 0 {
                stem.to_string()
            } else {
                format!("{stem}-{attempt}")
            };
            let candidate = self.base_dir.join(name);
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(UadError::io(&candidate, err)),
            }
        }
        Err(UadError::Runtime {
            details: format!("no free restore directory name for {stem}"),
        })
    }
}

/// Write both scripts into `dir`, removing `dir` if either write fails so no
/// half-populated restore directory is left behind.
fn fill_fresh_dir(dir: &Path, shell: &str, batch: &str) -> Result<()> {
    let written = write_script(&dir.join(SHELL_SCRIPT), shell, true)
        .and_then(|()| write_script(&dir.join(BATCH_SCRIPT), batch, false));
    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_dir_all(dir) {
            warn!(dir = %dir.display(), error = %cleanup, "could not remove incomplete restore directory");
        }
        return Err(err);
    }
    Ok(())
}

fn write_script(path: &Path, contents: &str, executable: bool) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| UadError::io(path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| UadError::io(path, e))?;
    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| UadError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = executable;
    Ok(())
}
