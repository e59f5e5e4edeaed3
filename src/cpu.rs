// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! CPU controller: discovers logical cores from sysfs and applies governor,
//! energy-performance preference, min/max scaling frequency, online-core
//! count and turbo boost.

use crate::sysfs;
use std::path::PathBuf;

const CPU_POSSIBLE: &str = "/sys/devices/system/cpu/possible";
const CPU_PRESENT: &str = "/sys/devices/system/cpu/present";
const NO_TURBO: &str = "/sys/devices/system/cpu/intel_pstate/no_turbo";
const BOOST: &str = "/sys/devices/system/cpu/cpufreq/boost";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalingDriver {
    AcpiCpufreq,
    IntelPstate,
    AmdPstate,
    AmdPstateEpp,
    Unknown,
}

impl ScalingDriver {
    fn classify(name: &str) -> Self {
        match name {
            "acpi-cpufreq" => Self::AcpiCpufreq,
            "intel_pstate" => Self::IntelPstate,
            "amd-pstate" => Self::AmdPstate,
            "amd-pstate-epp" => Self::AmdPstateEpp,
            _ => Self::Unknown,
        }
    }

    fn uses_epp_powersave_name(self) -> bool { matches!(self, Self::IntelPstate | Self::AmdPstateEpp) }
}

/// "reduced" max-frequency sentinel from `cpu.scalingMaxFrequency = -1`.
pub const MAX_FREQ_REDUCED: i64 = -1;
/// "set to hardware max" sentinel from `cpu.scalingMinFrequency = -2`.
pub const MIN_FREQ_TO_MAX: i64 = -2;

pub struct CpuController {
    cores: Vec<usize>,
}

fn parse_cpu_range(raw: &str) -> Vec<usize> {
    let mut cores = Vec::new();
    for part in raw.trim().split(',') {
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                cores.extend(start..=end);
            }
        } else if let Ok(n) = part.parse::<usize>() {
            cores.push(n);
        }
    }
    cores
}

impl CpuController {
    pub fn discover() -> Self {
        let possible: Vec<usize> = sysfs::read_string(CPU_POSSIBLE).map(|s| parse_cpu_range(&s)).unwrap_or_default();
        let present: Vec<usize> = sysfs::read_string(CPU_PRESENT).map(|s| parse_cpu_range(&s)).unwrap_or_default();

        let mut cores: Vec<usize> = possible.into_iter().filter(|c| present.contains(c)).collect();
        if cores.is_empty() {
            cores.push(0);
        }
        cores.sort_unstable();

        log::info!("cpu controller: discovered {} logical cores", cores.len());
        Self { cores }
    }

    pub fn core_count(&self) -> usize { self.cores.len() }

    fn core_path(core: usize, leaf: &str) -> PathBuf {
        PathBuf::from(format!("/sys/devices/system/cpu/cpu{}/cpufreq/{}", core, leaf))
    }

    fn online_path(core: usize) -> PathBuf { PathBuf::from(format!("/sys/devices/system/cpu/cpu{}/online", core)) }

    pub fn scaling_driver(&self, core: usize) -> Option<ScalingDriver> {
        sysfs::read_string(Self::core_path(core, "scaling_driver")).map(|s| ScalingDriver::classify(&s))
    }

    pub fn available_governors(&self, core: usize) -> Vec<String> {
        sysfs::read_string_list(Self::core_path(core, "scaling_available_governors")).unwrap_or_default()
    }

    pub fn available_epp(&self, core: usize) -> Vec<String> {
        sysfs::read_string_list(Self::core_path(core, "energy_performance_available_preferences")).unwrap_or_default()
    }

    pub fn cpuinfo_min_freq(&self, core: usize) -> Option<i64> { sysfs::read(Self::core_path(core, "cpuinfo_min_freq")) }

    pub fn cpuinfo_max_freq(&self, core: usize) -> Option<i64> { sysfs::read(Self::core_path(core, "cpuinfo_max_freq")) }

    pub fn scaling_min_freq(&self, core: usize) -> Option<i64> { sysfs::read(Self::core_path(core, "scaling_min_freq")) }

    pub fn scaling_max_freq(&self, core: usize) -> Option<i64> { sysfs::read(Self::core_path(core, "scaling_max_freq")) }

    pub fn governor(&self, core: usize) -> Option<String> { sysfs::read_string(Self::core_path(core, "scaling_governor")) }

    pub fn energy_performance_preference(&self, core: usize) -> Option<String> {
        sysfs::read_string(Self::core_path(core, "energy_performance_preference"))
    }

    pub fn no_turbo(&self) -> Option<bool> { sysfs::read::<u8, _>(NO_TURBO).map(|v| v != 0) }

    /// Online-flag bit for cores `1..n-1`; core 0 has no online switch.
    pub fn use_cores(&self, n: usize) {
        for &core in &self.cores {
            if core == 0 {
                continue;
            }
            let online = core < n;
            sysfs::write(Self::online_path(core), if online { 1 } else { 0 });
        }
    }

    pub fn set_governor(&self, name: &str) {
        for &core in &self.cores {
            if self.available_governors(core).iter().any(|g| g == name) {
                sysfs::write(Self::core_path(core, "scaling_governor"), name);
            } else {
                log::debug!("cpu{}: governor {} not in available list, skipping", core, name);
            }
        }
    }

    pub fn set_energy_performance_preference(&self, name: &str) {
        for &core in &self.cores {
            if self.available_epp(core).iter().any(|e| e == name) {
                sysfs::write(Self::core_path(core, "energy_performance_preference"), name);
            }
        }
    }

    /// Snap a requested frequency to the nearest entry in
    /// `scaling_available_frequencies` if that list is present, otherwise
    /// clamp it to `[cpuinfo_min, cpuinfo_max]`.
    fn snap_frequency(&self, core: usize, requested: i64) -> i64 {
        let min = self.cpuinfo_min_freq(core).unwrap_or(requested);
        let max = self.cpuinfo_max_freq(core).unwrap_or(requested);
        let clamped = requested.clamp(min, max);

        match sysfs::read_list::<i64, _>(Self::core_path(core, "scaling_available_frequencies")) {
            Some(available) if !available.is_empty() => {
                *available.iter().min_by_key(|f| (*f - clamped).abs()).unwrap_or(&clamped)
            }
            _ => clamped,
        }
    }

    pub fn set_scaling_min_frequency(&self, requested: i64) {
        for &core in &self.cores {
            let value = if requested == MIN_FREQ_TO_MAX {
                self.cpuinfo_max_freq(core).unwrap_or(requested)
            } else {
                self.snap_frequency(core, requested)
            };
            sysfs::write(Self::core_path(core, "scaling_min_freq"), value);
        }
    }

    pub fn set_scaling_max_frequency(&self, requested: i64) {
        let driver = self.scaling_driver(0);
        for &core in &self.cores {
            if requested == MAX_FREQ_REDUCED {
                let available = sysfs::read_list::<i64, _>(Self::core_path(core, "scaling_available_frequencies"));
                if let Some(mut freqs) = available {
                    freqs.sort_unstable();
                    let median = freqs[freqs.len() / 2];
                    sysfs::write(Self::core_path(core, "scaling_max_freq"), median);
                } else if driver == Some(ScalingDriver::AcpiCpufreq) && self.boost_supported() {
                    // Keep max at hardware max and drop turbo instead.
                    if let Some(hw_max) = self.cpuinfo_max_freq(core) {
                        sysfs::write(Self::core_path(core, "scaling_max_freq"), hw_max);
                    }
                    self.set_boost(false);
                }
                continue;
            }

            let value = self.snap_frequency(core, requested);
            sysfs::write(Self::core_path(core, "scaling_max_freq"), value);
        }
    }

    pub fn set_no_turbo(&self, no_turbo: bool) {
        if sysfs::is_available(NO_TURBO) {
            sysfs::write(NO_TURBO, if no_turbo { 1 } else { 0 });
        }
    }

    pub fn boost_supported(&self) -> bool { sysfs::is_available(BOOST) }

    pub fn set_boost(&self, enabled: bool) {
        if self.boost_supported() {
            sysfs::write(BOOST, if enabled { 1 } else { 0 });
        }
    }

    /// Kernel-mandated default governor name for the active scaling driver.
    pub fn default_governor(&self, performance: bool) -> &'static str {
        let driver = self.scaling_driver(0).unwrap_or(ScalingDriver::Unknown);

        if performance {
            if driver.uses_epp_powersave_name() {
                return "performance";
            }
            for candidate in ["performance"] {
                if self.available_governors(0).iter().any(|g| g == candidate) {
                    return candidate;
                }
            }
            return "performance";
        }

        if driver.uses_epp_powersave_name() {
            return "powersave";
        }

        for candidate in ["ondemand", "schedutil", "conservative"] {
            if self.available_governors(0).iter().any(|g| g == candidate) {
                return candidate;
            }
        }

        "powersave"
    }

    /// Re-reads live sysfs and reports whether it agrees with the expected
    /// governor/EPP/min/max/no_turbo values. Used by the 10s validator loop.
    pub fn matches(
        &self,
        governor: &str,
        epp: &str,
        min_freq: Option<i64>,
        max_freq: Option<i64>,
        no_turbo: Option<bool>,
    ) -> bool {
        if self.governor(0).as_deref() != Some(governor) {
            return false;
        }

        if !epp.is_empty() && self.energy_performance_preference(0).as_deref() != Some(epp) {
            return false;
        }

        if let Some(min_freq) = min_freq {
            if self.scaling_min_freq(0) != Some(self.snap_frequency(0, min_freq)) {
                return false;
            }
        }

        if let Some(max_freq) = max_freq {
            if max_freq != MAX_FREQ_REDUCED && self.scaling_max_freq(0) != Some(self.snap_frequency(0, max_freq)) {
                return false;
            }
        }

        if let Some(no_turbo) = no_turbo {
            if self.no_turbo().is_some() && self.no_turbo() != Some(no_turbo) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_contiguous_cpu_range() {
        assert_eq!(parse_cpu_range("0-7"), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn parses_single_cpu() {
        assert_eq!(parse_cpu_range("0"), vec![0]);
    }

    #[test]
    fn classifies_known_drivers() {
        assert_eq!(ScalingDriver::classify("intel_pstate"), ScalingDriver::IntelPstate);
        assert_eq!(ScalingDriver::classify("amd-pstate-epp"), ScalingDriver::AmdPstateEpp);
        assert_eq!(ScalingDriver::classify("acpi-cpufreq"), ScalingDriver::AcpiCpufreq);
        assert_eq!(ScalingDriver::classify("weird"), ScalingDriver::Unknown);
    }
}
