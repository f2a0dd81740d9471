//! Engine-level scenarios driving the collector through a scripted provider.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use gpx_monitor::config::Config;
use gpx_monitor::provider::{DeviceProvider, DeviceReading};
use gpx_monitor::registry::DeviceRegistry;
use gpx_monitor::sampler::{RepeatingTask, SampleCollector};
use gpx_monitor::{Error, Result};

fn reading(id: u32, load: f64, memory_util: f64) -> DeviceReading {
    DeviceReading {
        id,
        name: format!("Scripted GPU {id}"),
        memory_total: 16384.0,
        driver: "550.00".to_string(),
        load,
        memory_util,
    }
}

/// Replays a fixed sequence of enumeration results, one per tick. Once the
/// script is exhausted it keeps returning the final entry.
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Vec<DeviceReading>>>>,
    last: Mutex<Vec<DeviceReading>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<Vec<DeviceReading>>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DeviceProvider for ScriptedProvider {
    async fn list_devices(&self) -> Result<Vec<DeviceReading>> {
        match self.script.lock().pop_front() {
            Some(Ok(readings)) => {
                *self.last.lock() = readings.clone();
                Ok(readings)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().clone()),
        }
    }
}

fn config(smoothing: f64, max_samples: usize) -> Config {
    Config {
        smoothing,
        max_samples,
        ..Config::default()
    }
}

fn three_device_tick(load: f64) -> Vec<DeviceReading> {
    (0..3).map(|id| reading(id, load, load)).collect()
}

#[tokio::test]
async fn retention_window_keeps_the_last_five_samples() {
    // Three devices, max length 5, no smoothing: device 0 sees the raw
    // sequence 10..=60 and ends up with the last five values, in order.
    let loads = [0.10, 0.20, 0.30, 0.40, 0.50, 0.60];
    let script = loads.iter().map(|&l| Ok(three_device_tick(l))).collect();
    let provider = ScriptedProvider::new(script);

    let registry = Arc::new(DeviceRegistry::bootstrap(&three_device_tick(0.0)).unwrap());
    let collector = SampleCollector::new(provider, Arc::clone(&registry), &config(0.0, 5));

    for _ in 0..loads.len() {
        collector.tick().await.unwrap();
    }

    let snapshot = registry.snapshot();
    assert_eq!(
        snapshot[&0].engine_usage,
        vec![20.0, 30.0, 40.0, 50.0, 60.0]
    );
    for record in snapshot.values() {
        assert_eq!(record.engine_usage.len(), 5);
        assert_eq!(record.memory_usage.len(), 5);
    }
}

#[tokio::test]
async fn smoothing_halves_the_step_with_alpha_half() {
    let script = vec![
        Ok(vec![reading(0, 0.0, 0.0)]),
        Ok(vec![reading(0, 1.0, 1.0)]),
    ];
    let provider = ScriptedProvider::new(script);

    let registry = Arc::new(DeviceRegistry::bootstrap(&[reading(0, 0.0, 0.0)]).unwrap());
    let collector = SampleCollector::new(provider, Arc::clone(&registry), &config(0.5, 1000));

    collector.tick().await.unwrap();
    assert_eq!(registry.snapshot()[&0].engine_usage, vec![0.0]);

    collector.tick().await.unwrap();
    assert_eq!(registry.snapshot()[&0].engine_usage, vec![0.0, 50.0]);
}

#[tokio::test]
async fn empty_enumeration_skips_the_tick_and_sampling_resumes() {
    let script = vec![
        Ok(vec![reading(0, 0.25, 0.25)]),
        Ok(Vec::new()),
        Ok(vec![reading(0, 0.75, 0.75)]),
    ];
    let provider = ScriptedProvider::new(script);

    let registry = Arc::new(DeviceRegistry::bootstrap(&[reading(0, 0.0, 0.0)]).unwrap());
    let collector = SampleCollector::new(provider, Arc::clone(&registry), &config(0.0, 1000));

    collector.tick().await.unwrap();
    collector.tick().await.unwrap(); // empty: must be a no-op, not an error
    assert_eq!(registry.snapshot()[&0].engine_usage, vec![25.0]);

    collector.tick().await.unwrap();
    assert_eq!(registry.snapshot()[&0].engine_usage, vec![25.0, 75.0]);
}

#[tokio::test]
async fn enumeration_failure_leaves_previous_samples_intact() {
    let script = vec![
        Ok(vec![reading(0, 0.40, 0.40)]),
        Err(Error::Enumeration("driver went away".to_string())),
        Ok(vec![reading(0, 0.60, 0.60)]),
    ];
    let provider = ScriptedProvider::new(script);

    let registry = Arc::new(DeviceRegistry::bootstrap(&[reading(0, 0.0, 0.0)]).unwrap());
    let collector = SampleCollector::new(provider, Arc::clone(&registry), &config(0.0, 1000));

    collector.tick().await.unwrap();
    assert!(collector.tick().await.is_err());
    assert_eq!(registry.snapshot()[&0].engine_usage, vec![40.0]);

    collector.tick().await.unwrap();
    assert_eq!(registry.snapshot()[&0].engine_usage, vec![40.0, 60.0]);
}

#[tokio::test]
async fn snapshots_taken_during_ticks_are_internally_consistent() {
    // Both series of a device must always reflect the same number of
    // ticks, even while the sampler is appending concurrently.
    let provider = ScriptedProvider::new(vec![Ok(vec![reading(0, 0.5, 0.5)])]);
    let registry = Arc::new(DeviceRegistry::bootstrap(&[reading(0, 0.0, 0.0)]).unwrap());
    let collector = Arc::new(SampleCollector::new(
        provider,
        Arc::clone(&registry),
        &config(0.3, 50),
    ));

    let writer = {
        let collector = Arc::clone(&collector);
        tokio::spawn(async move {
            for _ in 0..500 {
                collector.tick().await.unwrap();
            }
        })
    };

    let reader = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..500 {
                for record in registry.snapshot().values() {
                    assert_eq!(
                        record.engine_usage.len(),
                        record.memory_usage.len(),
                        "snapshot saw a half-applied tick"
                    );
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test]
async fn repeating_task_drives_the_collector_end_to_end() {
    let provider = ScriptedProvider::new(vec![Ok(vec![reading(0, 0.5, 0.5)])]);
    let registry = Arc::new(DeviceRegistry::bootstrap(&[reading(0, 0.0, 0.0)]).unwrap());
    let collector = Arc::new(SampleCollector::new(
        provider,
        Arc::clone(&registry),
        &config(0.0, 1000),
    ));

    let task = RepeatingTask::spawn(collector, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    task.stop().await;

    let after_stop = registry.snapshot()[&0].engine_usage.len();
    assert!(after_stop >= 2, "expected several samples, got {after_stop}");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        registry.snapshot()[&0].engine_usage.len(),
        after_stop,
        "series must not grow after stop"
    );
}
