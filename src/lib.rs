//! GPX Monitor - GPU utilization monitoring with a web dashboard
//!
//! This crate continuously samples GPU engine and memory utilization for
//! every device visible on the host, keeps a bounded, exponentially
//! smoothed time-series per device, and serves the aggregated state as
//! JSON next to a static web dashboard.
//!
//! # Architecture
//!
//! - [`registry::DeviceRegistry`]: the single piece of shared state, a
//!   map of device id to metadata and bounded time-series, behind a
//!   read/write lock.
//! - [`sampler::SampleCollector`]: queries the device provider, smooths
//!   and appends samples, enforces the retention window.
//! - [`sampler::RepeatingTask`]: generic cancellable periodic executor
//!   that drives the collector (and any other [`sampler::PeriodicJob`]).
//! - [`provider::DeviceProvider`]: enumeration seam; the production
//!   implementation shells out to `nvidia-smi`.
//! - [`server::HttpServer`]: `POST /api` snapshot endpoint plus static
//!   dashboard files.
//!
//! The sampler writes and the API reads concurrently; they share only the
//! registry, and readers always copy out from behind the lock.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use gpx_monitor::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> gpx_monitor::Result<()> {
//!     let config = Config::default();
//!     let provider = Arc::new(NvidiaSmiProvider::new());
//!     let registry = Arc::new(DeviceRegistry::bootstrap(
//!         &provider.list_devices().await?,
//!     )?);
//!
//!     let collector = Arc::new(SampleCollector::new(provider, registry.clone(), &config));
//!     let calibration = collector.calibrate(config.sample_rate_hz).await?;
//!     let task = RepeatingTask::spawn(collector, calibration.sleep_interval);
//!
//!     // ... serve reads from `registry.snapshot()` ...
//!     task.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod provider;
pub mod registry;
pub mod sampler;
pub mod server;

pub use error::{Error, Result};

/// Re-export of the types most binaries need.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::provider::{DeviceProvider, DeviceReading, NvidiaSmiProvider};
    pub use crate::registry::{DeviceRegistry, DeviceSnapshot, RegistrySnapshot};
    pub use crate::sampler::{Calibration, PeriodicJob, RepeatingTask, SampleCollector};
    pub use crate::server::{ApiResponse, HttpServer};
}
