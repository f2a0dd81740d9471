//! Runtime configuration.
//!
//! Every knob has a compiled default and an environment-variable override,
//! so the binary runs usefully with zero configuration. Invalid or
//! out-of-range values fall back to the default with a warning rather than
//! aborting startup.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 10.0;
pub const DEFAULT_MAX_SAMPLES: usize = 1000;
pub const DEFAULT_SMOOTHING: f64 = 0.3;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Configuration consumed by the sampling engine and the HTTP layer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target sampling frequency in Hz.
    pub sample_rate_hz: f64,
    /// Retention window: maximum samples kept per time-series.
    pub max_samples: usize,
    /// Exponential-smoothing weight, `0.0 <= alpha < 1.0`. Zero disables
    /// smoothing entirely.
    pub smoothing: f64,
    /// Address the HTTP server binds to.
    pub listen_addr: String,
    /// Directory the dashboard assets are served from.
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            max_samples: DEFAULT_MAX_SAMPLES,
            smoothing: DEFAULT_SMOOTHING,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl Config {
    /// Build a configuration from process environment variables.
    ///
    /// Recognized variables: `GPX_SAMPLE_RATE_HZ`, `GPX_MAX_SAMPLES`,
    /// `GPX_SMOOTHING`, `GPX_LISTEN_ADDR`, `GPX_STATIC_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup. Split out
    /// from [`Config::from_env`] so tests never have to mutate the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(rate) = parse_var(&lookup, "GPX_SAMPLE_RATE_HZ") {
            config.sample_rate_hz = rate;
        }
        if let Some(max) = parse_var(&lookup, "GPX_MAX_SAMPLES") {
            config.max_samples = max;
        }
        if let Some(alpha) = parse_var(&lookup, "GPX_SMOOTHING") {
            config.smoothing = alpha;
        }
        if let Some(addr) = lookup("GPX_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(dir) = lookup("GPX_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        config.validate()
    }

    fn validate(mut self) -> Self {
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            warn!(
                value = self.sample_rate_hz,
                "sample rate must be positive, using default"
            );
            self.sample_rate_hz = DEFAULT_SAMPLE_RATE_HZ;
        }
        if self.max_samples == 0 {
            warn!("max samples must be at least 1, using default");
            self.max_samples = DEFAULT_MAX_SAMPLES;
        }
        if !self.smoothing.is_finite() || !(0.0..1.0).contains(&self.smoothing) {
            warn!(
                value = self.smoothing,
                "smoothing factor must be in [0, 1), using default"
            );
            self.smoothing = DEFAULT_SMOOTHING;
        }
        self
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "unparseable value, ignoring");
            None
        }
    }
}
