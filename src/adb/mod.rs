//! Device-management command layer: the executor seam, device discovery and
//! device profiling.

pub mod devices;
pub mod fake;
pub mod runner;

pub use devices::{DeviceDiscovery, DeviceIdentity, DeviceProfiler};
pub use runner::{AdbRunner, CommandExecutor, CommandOutput};
