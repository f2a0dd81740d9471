use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use gpx_monitor::config::Config;
use gpx_monitor::console::ConsoleReporter;
use gpx_monitor::provider::{DeviceProvider, NvidiaSmiProvider};
use gpx_monitor::registry::DeviceRegistry;
use gpx_monitor::sampler::{RepeatingTask, SampleCollector};
use gpx_monitor::server::HttpServer;
use gpx_monitor::Result;

const CONSOLE_PERIOD: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let provider = Arc::new(NvidiaSmiProvider::new());

    // Initial discovery is the only fatal enumeration: with no devices at
    // all there is nothing to monitor or serve.
    let readings = provider.list_devices().await?;
    let registry = Arc::new(DeviceRegistry::bootstrap(&readings)?);
    info!(devices = registry.device_count(), "device registry initialized");

    let collector = Arc::new(SampleCollector::new(
        provider,
        Arc::clone(&registry),
        &config,
    ));
    let calibration = collector.calibrate(config.sample_rate_hz).await?;
    info!(
        read_latency_ms = calibration.read_latency.as_millis() as u64,
        sleep_ms = calibration.sleep_interval.as_millis() as u64,
        rate_hz = config.sample_rate_hz,
        "calibration complete"
    );

    let sampler = RepeatingTask::spawn(collector, calibration.sleep_interval);

    let reporter = std::env::var("GPX_CONSOLE")
        .map(|v| v == "1")
        .unwrap_or(false)
        .then(|| {
            RepeatingTask::spawn(
                Arc::new(ConsoleReporter::new(Arc::clone(&registry))),
                CONSOLE_PERIOD,
            )
        });

    let server = HttpServer::bind(
        &config.listen_addr,
        Arc::clone(&registry),
        config.static_dir.clone(),
    )?;
    info!("serving dashboard and API at http://{}", config.listen_addr);

    tokio::signal::ctrl_c().await?;
    info!(
        sampler_errors = sampler.error_count(),
        "shutdown requested"
    );

    sampler.stop().await;
    if let Some(reporter) = reporter {
        reporter.stop().await;
    }
    server.shutdown().await;

    Ok(())
}
