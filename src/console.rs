//! One-line-per-device console summary, driven as a periodic job.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::sampler::PeriodicJob;

/// Logs the latest engine and memory sample for every device.
///
/// Runs on its own [`RepeatingTask`](crate::sampler::RepeatingTask),
/// typically at a slower cadence than the sampler.
pub struct ConsoleReporter {
    registry: Arc<DeviceRegistry>,
}

impl ConsoleReporter {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PeriodicJob for ConsoleReporter {
    fn name(&self) -> &str {
        "console-reporter"
    }

    async fn run(&self) -> Result<()> {
        for (id, engine, memory) in self.registry.latest() {
            info!("id: {id}   GPU: {engine:.1}%   vRAM: {memory:.1}%");
        }
        Ok(())
    }
}
