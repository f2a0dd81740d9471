//! Shared device registry.
//!
//! The registry is the only state shared between the background sampler and
//! the concurrently-serving read API. It maps a stable device id to a
//! [`DeviceRecord`] holding immutable metadata plus two bounded time-series
//! (engine and memory utilization percentages).
//!
//! Concurrency contract: the sampler mutates records under a single short
//! write-lock section per tick (append plus trim, nothing else), and readers
//! copy the whole registry out from behind a read lock. Readers therefore
//! never observe a record mid-append, and the provider query is never made
//! while the lock is held.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::DeviceReading;

/// Per-device state: immutable metadata plus the two utilization series.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: u32,
    pub name: String,
    /// Total device memory in MiB.
    pub memory: f64,
    pub driver: String,
    engine_usage: VecDeque<f64>,
    memory_usage: VecDeque<f64>,
}

impl DeviceRecord {
    fn new(reading: &DeviceReading) -> Self {
        Self {
            id: reading.id,
            name: reading.name.clone(),
            memory: reading.memory_total,
            driver: reading.driver.clone(),
            engine_usage: VecDeque::new(),
            memory_usage: VecDeque::new(),
        }
    }

    /// Append one sample pair, smoothing against the previous value and
    /// trimming both series to the retention window.
    ///
    /// `engine` and `memory` are raw percentages; with `alpha > 0` and a
    /// non-empty series the stored value is
    /// `(1 - alpha) * raw + alpha * previous`. The first sample is always
    /// stored raw. Trimming drops from the front only, so chronological
    /// order of the retained suffix is preserved.
    fn append_sample(&mut self, engine: f64, memory: f64, alpha: f64, max_samples: usize) {
        let engine = smooth(engine, self.engine_usage.back().copied(), alpha);
        let memory = smooth(memory, self.memory_usage.back().copied(), alpha);

        self.engine_usage.push_back(engine);
        self.memory_usage.push_back(memory);

        while self.engine_usage.len() > max_samples {
            self.engine_usage.pop_front();
        }
        while self.memory_usage.len() > max_samples {
            self.memory_usage.pop_front();
        }
    }

    /// Most recent engine utilization sample, if any.
    pub fn last_engine(&self) -> Option<f64> {
        self.engine_usage.back().copied()
    }

    /// Most recent memory utilization sample, if any.
    pub fn last_memory(&self) -> Option<f64> {
        self.memory_usage.back().copied()
    }

    fn to_snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id,
            name: self.name.clone(),
            memory: self.memory,
            driver: self.driver.clone(),
            engine_usage: self.engine_usage.iter().copied().collect(),
            memory_usage: self.memory_usage.iter().copied().collect(),
        }
    }
}

fn smooth(raw: f64, previous: Option<f64>, alpha: f64) -> f64 {
    match previous {
        Some(prev) if alpha > 0.0 => (1.0 - alpha) * raw + alpha * prev,
        _ => raw,
    }
}

/// Owned, serializable copy of one device record.
///
/// The series field names match the wire format the dashboard reads
/// (`engine_usage_timeseries` / `memory_usage_timeseries`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub id: u32,
    pub name: String,
    pub memory: f64,
    pub driver: String,
    #[serde(rename = "engine_usage_timeseries")]
    pub engine_usage: Vec<f64>,
    #[serde(rename = "memory_usage_timeseries")]
    pub memory_usage: Vec<f64>,
}

/// Point-in-time copy of the whole registry, keyed by device id.
pub type RegistrySnapshot = BTreeMap<u32, DeviceSnapshot>;

/// Registry of all devices discovered at startup.
///
/// Built exactly once; entries are never added or removed afterward
/// (device hot-plug is out of scope). Only the time-series mutate.
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<u32, DeviceRecord>>,
}

impl DeviceRegistry {
    /// Build the registry from the initial enumeration pass.
    ///
    /// Fails with [`Error::NoDevices`] when the pass found nothing, since
    /// the monitor would have nothing meaningful to serve.
    pub fn bootstrap(readings: &[DeviceReading]) -> Result<Self> {
        if readings.is_empty() {
            return Err(Error::NoDevices);
        }

        let devices = readings
            .iter()
            .map(|reading| (reading.id, DeviceRecord::new(reading)))
            .collect();

        Ok(Self {
            devices: RwLock::new(devices),
        })
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Apply one tick's readings: smooth, append and trim every registered
    /// device present in `samples`, all under a single write lock so the
    /// whole tick appears atomic to concurrent readers.
    ///
    /// `samples` pairs a device id with raw (engine, memory) percentages.
    /// Readings for ids that were never registered are ignored; registered
    /// devices absent from `samples` keep their series unchanged this tick.
    pub fn apply(&self, samples: &[(u32, f64, f64)], alpha: f64, max_samples: usize) {
        let mut devices = self.devices.write();
        for &(id, engine, memory) in samples {
            match devices.get_mut(&id) {
                Some(record) => record.append_sample(engine, memory, alpha, max_samples),
                None => debug!(id, "reading for unregistered device, ignoring"),
            }
        }
    }

    /// Copy the full registry out for serialization. Pure read; holds the
    /// read lock only for the duration of the clone.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.devices
            .read()
            .values()
            .map(|record| (record.id, record.to_snapshot()))
            .collect()
    }

    /// Latest (engine, memory) sample per device, for console summaries.
    pub fn latest(&self) -> Vec<(u32, f64, f64)> {
        self.devices
            .read()
            .values()
            .map(|record| {
                (
                    record.id,
                    record.last_engine().unwrap_or(0.0),
                    record.last_memory().unwrap_or(0.0),
                )
            })
            .collect()
    }
}
