//! Device enumeration.
//!
//! The sampling engine never talks to a GPU directly; it queries a
//! [`DeviceProvider`] for an instantaneous reading of every visible device.
//! The production implementation shells out to `nvidia-smi`
//! ([`NvidiaSmiProvider`]); tests substitute mocks or scripted providers.

mod nvidia;

pub use nvidia::NvidiaSmiProvider;

use async_trait::async_trait;

use crate::error::Result;

/// One instantaneous reading for a single device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReading {
    /// Stable device index as reported by the driver.
    pub id: u32,
    /// Device model name.
    pub name: String,
    /// Total device memory in MiB.
    pub memory_total: f64,
    /// Driver version string.
    pub driver: String,
    /// Engine load fraction in `[0, 1]`.
    pub load: f64,
    /// Memory utilization fraction in `[0, 1]` (used / total).
    pub memory_util: f64,
}

/// Source of instantaneous device readings.
///
/// Implementations may block for an unspecified time (subprocesses, driver
/// calls); callers must never hold the registry lock across this call. An
/// empty result is valid and means no devices were visible this instant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Enumerate all currently visible devices with their instantaneous
    /// load and memory utilization.
    async fn list_devices(&self) -> Result<Vec<DeviceReading>>;
}
