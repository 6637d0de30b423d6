//! Device discovery (`adb devices -l`) and per-device property profiling.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use super::runner::{CommandExecutor, argv};
use crate::core::errors::Result;

/// `<identifier> <whitespace> device [trailing fields]`; any other status
/// token (`unauthorized`, `offline`, `recovery`, ...) does not match.
static DEVICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+device(?:\s.*)?$").expect("device line pattern is valid")
});

/// Property read for the manufacturer.
pub const PROP_MANUFACTURER: &str = "ro.product.manufacturer";
/// Property read for the model.
pub const PROP_MODEL: &str = "ro.product.model";
/// Property read for the OS release string.
pub const PROP_OS_VERSION: &str = "ro.build.version.release";

/// Identifying properties of one attached device. Immutable once profiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Connection serial, stable for the lifetime of the connection.
    pub serial: String,
    /// Manufacturer as reported by the device; empty when the read failed.
    pub manufacturer: String,
    /// Model name; empty when the read failed.
    pub model: String,
    /// OS release; empty when the read failed.
    pub os_version: String,
}

impl DeviceIdentity {
    /// `"Samsung SM-G991B (R5CR1234)"`, with placeholders for unread fields.
    #[must_use]
    pub fn display_name(&self) -> String {
        let manufacturer = if self.manufacturer.trim().is_empty() {
            "Unknown".to_string()
        } else {
            capitalize(self.manufacturer.trim())
        };
        let model = if self.model.trim().is_empty() {
            "Device"
        } else {
            self.model.trim()
        };
        format!("{manufacturer} {model} ({})", self.serial)
    }
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Extract ready device identifiers from `adb devices -l` output.
#[must_use]
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices"))
        .filter_map(|line| {
            DEVICE_LINE
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|serial| serial.as_str().to_string())
        })
        .collect()
}

/// Lists attached devices that are ready for commands.
#[derive(Clone)]
pub struct DeviceDiscovery {
    executor: Arc<dyn CommandExecutor>,
}

impl DeviceDiscovery {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Ready device identifiers.
    ///
    /// A non-zero exit reads as "no devices"; only a launch failure is an error.
    pub fn list_devices(&self) -> Result<Vec<String>> {
        let result = self.executor.run(&argv(&["devices", "-l"]))?;
        if !result.is_success() {
            debug!(exit_code = result.exit_code, "device listing failed; reporting none");
            return Ok(Vec::new());
        }
        let serials = parse_device_list(&result.output);
        debug!(count = serials.len(), "devices listed");
        Ok(serials)
    }
}

/// Resolves manufacturer, model and OS version for one device.
///
/// Each property is a separate `getprop` call; batched property queries are
/// not reliable across vendor builds.
#[derive(Clone)]
pub struct DeviceProfiler {
    executor: Arc<dyn CommandExecutor>,
}

impl DeviceProfiler {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub fn profile(&self, serial: &str) -> Result<DeviceIdentity> {
        let identity = DeviceIdentity {
            serial: serial.to_string(),
            manufacturer: self.property(serial, PROP_MANUFACTURER)?,
            model: self.property(serial, PROP_MODEL)?,
            os_version: self.property(serial, PROP_OS_VERSION)?,
        };
        info!(
            serial,
            manufacturer = %identity.manufacturer,
            model = %identity.model,
            os_version = %identity.os_version,
            "device profiled"
        );
        Ok(identity)
    }

    /// Best-effort property read: failure or empty output yields `""`.
    pub fn property(&self, serial: &str, property: &str) -> Result<String> {
        let result = self
            .executor
            .run(&argv(&["-s", serial, "shell", "getprop", property]))?;
        if !result.is_success() {
            return Ok(String::new());
        }
        Ok(result.output.trim().to_string())
    }
}
