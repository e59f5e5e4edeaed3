// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The hardware-monitor worker (spec §4.8): one 800 ms tick publishing GPU
//! and CPU power/temperature/frequency readings plus the active PRIME mode
//! into the runtime snapshot.

use crate::sysfs;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

pub const TICK: Duration = Duration::from_millis(800);
const CPU_POWER_EVERY: u32 = 3;
const PRIME_EVERY: u32 = 12;

const RAPL_PACKAGE_DIR: &str = "/sys/class/powercap/intel-rapl:0";

#[derive(Clone, Copy, Debug)]
struct RaplSample {
    energy_uj: u64,
    at: Instant,
}

/// Samples `energy_uj` across calls and divides the delta by elapsed time,
/// handling counter wrap-around via `max_energy_range_uj`.
pub struct RaplMeter {
    dir: PathBuf,
    last: Option<RaplSample>,
}

impl RaplMeter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self { Self { dir: dir.as_ref().to_owned(), last: None } }

    fn energy_path(&self) -> PathBuf { self.dir.join("energy_uj") }

    fn max_range_path(&self) -> PathBuf { self.dir.join("max_energy_range_uj") }

    /// Average power in watts since the previous sample, or `None` on the
    /// first call (no baseline yet) or if the counter is unavailable.
    pub fn sample_watts(&mut self) -> Option<f64> {
        let energy_uj: u64 = sysfs::read(self.energy_path())?;
        let now = Instant::now();

        let watts = match self.last {
            None => None,
            Some(prev) => {
                let elapsed = now.duration_since(prev.at).as_micros().max(1) as f64;
                let delta = if energy_uj >= prev.energy_uj {
                    energy_uj - prev.energy_uj
                } else {
                    let max_range: u64 = sysfs::read(self.max_range_path()).unwrap_or(u64::MAX);
                    (max_range - prev.energy_uj) + energy_uj
                };
                Some(delta as f64 / elapsed)
            }
        };

        self.last = Some(RaplSample { energy_uj, at: now });
        watts
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CpuPowerReport {
    pub power_draw: Option<f64>,
    pub pl1: Option<f64>,
    pub pl2: Option<f64>,
    pub pl4: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GpuInfo {
    pub name: String,
    pub temperature: Option<f64>,
    pub frequency_mhz: Option<f64>,
    pub power_watts: Option<f64>,
    pub power_limit_watts: Option<f64>,
}

/// Parses a `nvidia-smi --query-gpu=... --format=csv,noheader,nounits`-style
/// line where fields may carry unit suffixes (`W`, `MHz`, `C`).
pub fn parse_metric(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    let numeric: String = trimmed.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-').collect();
    if numeric.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        return None;
    }
    numeric.parse().ok()
}

pub async fn query_nvidia_gpu() -> Option<GpuInfo> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name,temperature.gpu,clocks.gr,power.draw,power.limit", "--format=csv,noheader,nounits"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let line = String::from_utf8_lossy(&output.stdout);
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() < 5 {
        return None;
    }

    Some(GpuInfo {
        name: fields[0].to_owned(),
        temperature: parse_metric(fields[1]),
        frequency_mhz: parse_metric(fields[2]),
        power_watts: parse_metric(fields[3]),
        power_limit_watts: parse_metric(fields[4]),
    })
}

pub async fn query_prime_select() -> String {
    let output = Command::new("prime-select").arg("query").stdout(Stdio::piped()).stderr(Stdio::null()).output().await;

    match output {
        Ok(output) if output.status.success() => {
            let state = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
            match state.as_str() {
                "on-demand" | "nvidia" | "intel" | "hybrid" => state,
                _ => "unknown".to_owned(),
            }
        }
        _ => "unknown".to_owned(),
    }
}

/// Drives the fixed-cadence readings and hands the caller whatever changed
/// this tick; the caller (daemon main loop) publishes into the snapshot.
pub struct HardwareMonitor {
    tick_count: u32,
    rapl: RaplMeter,
}

#[derive(Debug, Default)]
pub struct MonitorTick {
    pub igpu_power_watts: Option<f64>,
    pub dgpu: Option<GpuInfo>,
    pub cpu_power: Option<CpuPowerReport>,
    pub prime_state: Option<String>,
}

impl HardwareMonitor {
    pub fn new() -> Self { Self { tick_count: 0, rapl: RaplMeter::new(RAPL_PACKAGE_DIR) } }

    pub async fn tick(&mut self) -> MonitorTick {
        self.tick_count = self.tick_count.wrapping_add(1);

        let igpu_power_watts = self.rapl.sample_watts();
        let dgpu = query_nvidia_gpu().await;

        let cpu_power = if self.tick_count % CPU_POWER_EVERY == 0 {
            Some(CpuPowerReport { power_draw: igpu_power_watts, pl1: None, pl2: None, pl4: None })
        } else {
            None
        };

        let prime_state = if self.tick_count % PRIME_EVERY == 0 { Some(query_prime_select().await) } else { None };

        MonitorTick { igpu_power_watts, dgpu, cpu_power, prime_state }
    }
}

impl Default for HardwareMonitor {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process;

    #[test]
    fn parse_metric_strips_units() {
        assert_eq!(parse_metric("45 W"), Some(45.0));
        assert_eq!(parse_metric("1200 MHz"), Some(1200.0));
        assert_eq!(parse_metric("62 C"), Some(62.0));
    }

    #[test]
    fn parse_metric_handles_not_available() {
        assert_eq!(parse_metric("[N/A]"), None);
    }

    #[test]
    fn rapl_meter_requires_baseline_before_reporting() {
        let dir = std::env::temp_dir().join(format!("uccd-rapl-test-{}", process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("energy_uj"), "1000000").unwrap();
        fs::write(dir.join("max_energy_range_uj"), "262143328850").unwrap();

        let mut meter = RaplMeter::new(&dir);
        assert_eq!(meter.sample_watts(), None);

        fs::write(dir.join("energy_uj"), "2000000").unwrap();
        assert!(meter.sample_watts().is_some());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cadence_fires_on_expected_ticks() {
        assert_eq!(3 % CPU_POWER_EVERY, 0);
        assert_eq!(12 % PRIME_EVERY, 0);
        assert_ne!(1 % CPU_POWER_EVERY, 0);
    }
}
