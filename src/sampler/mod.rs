//! Sampling engine: the periodic collector and its period calibration.

mod task;

pub use task::{PeriodicJob, RepeatingTask};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::provider::DeviceProvider;
use crate::registry::DeviceRegistry;

/// Collects one sample per device per tick and feeds the registry.
///
/// The provider query runs without any lock held; only the resulting
/// append-and-trim touches the registry, under a single write lock, so a
/// slow or hanging provider stalls the sampler but never the read API.
pub struct SampleCollector {
    provider: Arc<dyn DeviceProvider>,
    registry: Arc<DeviceRegistry>,
    smoothing: f64,
    max_samples: usize,
}

impl SampleCollector {
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        registry: Arc<DeviceRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            registry,
            smoothing: config.smoothing,
            max_samples: config.max_samples,
        }
    }

    /// Run one sampling pass across all devices.
    ///
    /// Converts each reading's fractions to percentages rounded to one
    /// decimal place and applies them to the registry. An enumeration
    /// failure propagates as an error (the caller decides whether to log
    /// or escalate); an empty enumeration is a no-op, leaving the previous
    /// samples as the last-known state.
    pub async fn tick(&self) -> Result<()> {
        let readings = self.provider.list_devices().await?;
        if readings.is_empty() {
            debug!("enumeration returned no devices, skipping tick");
            return Ok(());
        }

        let samples: Vec<(u32, f64, f64)> = readings
            .iter()
            .map(|r| {
                (
                    r.id,
                    round1(r.load * 100.0),
                    round1(r.memory_util * 100.0),
                )
            })
            .collect();

        self.registry.apply(&samples, self.smoothing, self.max_samples);
        Ok(())
    }

    /// Measure one tick's latency and derive the sleep interval needed to
    /// hit `sample_rate_hz`. Run once, before the repeating loop starts;
    /// the measured tick also seeds the first sample of every series.
    pub async fn calibrate(&self, sample_rate_hz: f64) -> Result<Calibration> {
        let start = Instant::now();
        self.tick().await?;
        let read_latency = start.elapsed();

        Ok(Calibration::derive(sample_rate_hz, read_latency))
    }
}

#[async_trait]
impl PeriodicJob for SampleCollector {
    fn name(&self) -> &str {
        "gpu-sampler"
    }

    async fn run(&self) -> Result<()> {
        self.tick().await
    }
}

/// Result of measuring one collection pass against the target rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// How long one full collection pass took.
    pub read_latency: Duration,
    /// Sleep between passes so the realized cadence approaches the target
    /// frequency instead of drifting by `read_latency` every cycle.
    pub sleep_interval: Duration,
}

impl Calibration {
    /// `sleep = max(0, 1/f - read_latency)`.
    ///
    /// When collection takes longer than the whole target period, the loop
    /// runs back-to-back with no sleep. That is degraded cadence, not an
    /// error; the requested frequency simply cannot be met.
    pub fn derive(target_hz: f64, read_latency: Duration) -> Self {
        let target_period = Duration::from_secs_f64(1.0 / target_hz);
        let sleep_interval = target_period.saturating_sub(read_latency);

        if sleep_interval.is_zero() {
            warn!(
                ?read_latency,
                ?target_period,
                "collection latency exceeds the sampling period, running without sleep"
            );
        }

        Self {
            read_latency,
            sleep_interval,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
