//! `nvidia-smi` backed device enumeration.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use super::{DeviceProvider, DeviceReading};
use crate::error::{Error, Result};

const QUERY_FIELDS: &str = "index,name,memory.total,memory.used,driver_version,utilization.gpu";

/// Enumerates devices by invoking `nvidia-smi` in CSV mode.
///
/// One subprocess per enumeration keeps the provider stateless; at typical
/// sampling rates the cost is dominated by the driver query itself.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProvider {
    binary: String,
}

impl NvidiaSmiProvider {
    pub fn new() -> Self {
        Self {
            binary: "nvidia-smi".to_string(),
        }
    }

    /// Use a different binary name or path, e.g. for wrapper scripts.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for NvidiaSmiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProvider for NvidiaSmiProvider {
    async fn list_devices(&self) -> Result<Vec<DeviceReading>> {
        let output = Command::new(&self.binary)
            .arg(format!("--query-gpu={QUERY_FIELDS}"))
            .arg("--format=csv,noheader,nounits")
            .output()
            .await
            .map_err(|e| Error::enumeration(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::enumeration(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_csv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `nvidia-smi --format=csv,noheader,nounits` output.
///
/// Malformed lines are dropped with a warning instead of failing the whole
/// enumeration; a partial reading is more useful than none.
fn parse_csv(text: &str) -> Vec<DeviceReading> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Some(reading) => Some(reading),
            None => {
                warn!(line, "skipping malformed nvidia-smi line");
                None
            }
        })
        .collect()
}

fn parse_line(line: &str) -> Option<DeviceReading> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != 6 {
        return None;
    }

    let id: u32 = parts[0].parse().ok()?;
    let name = parts[1].to_string();
    let memory_total: f64 = parts[2].parse().ok()?;
    let memory_used: f64 = parts[3].parse().ok()?;
    let driver = parts[4].to_string();
    let utilization: f64 = parts[5].parse().ok()?;

    let memory_util = if memory_total > 0.0 {
        (memory_used / memory_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(DeviceReading {
        id,
        name,
        memory_total,
        driver,
        load: (utilization / 100.0).clamp(0.0, 1.0),
        memory_util,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
0, NVIDIA GeForce RTX 3080, 10240, 2048, 535.154.05, 37
1, NVIDIA GeForce RTX 3080, 10240, 5120, 535.154.05, 93
";

    #[test]
    fn parses_well_formed_output() {
        let readings = parse_csv(SAMPLE);
        assert_eq!(readings.len(), 2);

        assert_eq!(readings[0].id, 0);
        assert_eq!(readings[0].name, "NVIDIA GeForce RTX 3080");
        assert_eq!(readings[0].memory_total, 10240.0);
        assert_eq!(readings[0].driver, "535.154.05");
        assert!((readings[0].load - 0.37).abs() < 1e-9);
        assert!((readings[0].memory_util - 0.2).abs() < 1e-9);

        assert_eq!(readings[1].id, 1);
        assert!((readings[1].load - 0.93).abs() < 1e-9);
        assert!((readings[1].memory_util - 0.5).abs() < 1e-9);
    }

    #[test]
    fn skips_malformed_lines() {
        let text = "garbage line\n0, GPU, 1024, 512, 1.0, 50\nnot,enough,fields\n";
        let readings = parse_csv(text);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, 0);
    }

    #[test]
    fn empty_output_yields_no_devices() {
        assert!(parse_csv("").is_empty());
        assert!(parse_csv("\n\n").is_empty());
    }

    #[test]
    fn fractions_are_clamped() {
        let text = "0, GPU, 1024, 2048, 1.0, 150";
        let readings = parse_csv(text);
        assert_eq!(readings[0].load, 1.0);
        assert_eq!(readings[0].memory_util, 1.0);
    }

    #[test]
    fn zero_total_memory_reports_zero_utilization() {
        let text = "0, GPU, 0, 0, 1.0, 10";
        let readings = parse_csv(text);
        assert_eq!(readings[0].memory_util, 0.0);
    }
}
