// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The fan-control worker (spec §4.5, §4.6): one loop driving every fan and
//! the water-cooler pump off a shared curve source, with a temporary-curve
//! override escape hatch for the RPC surface.

use crate::fan::curve::{interpolate, pump_level};
use crate::fan::filter::{speed_smoother, temperature_filter, Ewma, HysteresisAnchor};
use crate::io::DeviceInterface;
use crate::profile::defaults;
use crate::profile::model::{FanPoint, PumpLevel};
use crate::snapshot::{FanReading, Snapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TICK: Duration = Duration::from_secs(1);
const CRITICAL_TEMP: i32 = 90;
const WARNING_TEMP: i32 = 85;
const WARNING_MIN_SPEED: i32 = 80;

/// Snapshot of the curve source in effect for one tick: either the active
/// profile's tables (named preset, overridden per-field by any tables
/// embedded directly in the profile) or an RPC-pushed temporary override.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CurveSource {
    pub fan_profile: String,
    pub same_speed: bool,
    pub offset_fanspeed: i32,
    pub table_cpu: Vec<FanPoint>,
    pub table_gpu: Vec<FanPoint>,
    pub table_pump: Vec<FanPoint>,
    pub table_water_cooler_fan: Vec<FanPoint>,
}

impl CurveSource {
    fn resolve_table(&self, embedded: &[FanPoint], preset_pick: impl Fn(&defaults::FanPreset) -> Vec<FanPoint>) -> Vec<FanPoint> {
        if !embedded.is_empty() {
            return embedded.to_vec();
        }
        defaults::fan_preset_by_name(&self.fan_profile).map(|preset| preset_pick(&preset)).unwrap_or_default()
    }

    pub fn cpu_table(&self) -> Vec<FanPoint> { self.resolve_table(&self.table_cpu, |p| p.cpu.clone()) }

    pub fn gpu_table(&self) -> Vec<FanPoint> { self.resolve_table(&self.table_gpu, |p| p.gpu.clone()) }

    pub fn pump_table(&self) -> Vec<FanPoint> { self.resolve_table(&self.table_pump, |p| p.pump.clone()) }

    pub fn water_cooler_table(&self) -> Vec<FanPoint> {
        self.resolve_table(&self.table_water_cooler_fan, |p| p.water_cooler_fan.clone())
    }
}

struct FanChannel {
    temp_filter: Ewma,
    hysteresis: HysteresisAnchor,
    speed_smoother: Ewma,
    last_speed: i32,
}

impl FanChannel {
    fn new() -> Self {
        Self { temp_filter: temperature_filter(), hysteresis: HysteresisAnchor::new(), speed_smoother: speed_smoother(), last_speed: 0 }
    }
}

pub struct FanWorker {
    io: Box<dyn DeviceInterface>,
    snapshot: Arc<Snapshot>,
    channels: Vec<FanChannel>,
    fans_min_speed: u8,
    fans_off_available: bool,
    temporary_override: Option<CurveSource>,
}

fn now_ms() -> u64 { SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0) }

impl FanWorker {
    pub fn new(io: Box<dyn DeviceInterface>, snapshot: Arc<Snapshot>) -> Self {
        let fan_count = io.number_fans().unwrap_or(0) as usize;
        let fans_min_speed = io.fans_min_speed().unwrap_or(0);
        let fans_off_available = io.fans_off_available().unwrap_or(false);

        Self {
            io,
            snapshot,
            channels: (0..fan_count).map(|_| FanChannel::new()).collect(),
            fans_min_speed,
            fans_off_available,
            temporary_override: None,
        }
    }

    /// Installs an ad-hoc curve source that overrides both the named preset
    /// and any profile-embedded tables, per `ApplyFanProfiles`.
    pub fn push_temporary_override(&mut self, source: CurveSource) { self.temporary_override = Some(source); }

    /// `RevertFanProfiles`: drop the override, resuming the profile's own
    /// curves on the next tick.
    pub fn clear_temporary_override(&mut self) { self.temporary_override = None; }

    fn effective_source<'a>(&'a self, profile_source: &'a CurveSource) -> &'a CurveSource {
        self.temporary_override.as_ref().unwrap_or(profile_source)
    }

    fn hardware_floor(&self, target: i32) -> i32 {
        if target >= i32::from(self.fans_min_speed) {
            return target;
        }
        if self.fans_off_available && target < i32::from(self.fans_min_speed) / 2 {
            0
        } else {
            i32::from(self.fans_min_speed)
        }
    }

    /// Runs one tick. `profile_source` is the curve source derived from the
    /// currently active profile; `fan_control_enabled` gates whether targets
    /// are actually written to hardware. `pump_current_temp` is whichever
    /// fan's temperature the pump table keys off (typically fan 0 / CPU).
    pub fn tick(&mut self, profile_source: &CurveSource, fan_control_enabled: bool) -> Vec<FanReading> {
        let source = self.effective_source(profile_source).clone();
        let cpu_table = source.cpu_table();
        let gpu_table = source.gpu_table();

        let mut targets = Vec::with_capacity(self.channels.len());
        let mut filtered_temps = Vec::with_capacity(self.channels.len());
        let mut available_temps: Vec<i32> = Vec::new();

        for (index, channel) in self.channels.iter_mut().enumerate() {
            let raw_temp = self.io.fan_temperature(index as u8).ok().map(i32::from);

            let filtered = raw_temp.map(|raw| channel.temp_filter.update(f64::from(raw)).round() as i32);
            filtered_temps.push(filtered);

            let Some(filtered) = filtered else {
                targets.push(channel.last_speed);
                continue;
            };
            available_temps.push(filtered);

            let effective_temp = channel.hysteresis.update(filtered);
            let table = if index == 0 { &cpu_table } else { &gpu_table };
            let mut target = interpolate(table, effective_temp);

            target += source.offset_fanspeed;
            target = target.clamp(0, 100);
            target = self.hardware_floor(target);

            target = channel.speed_smoother.update(f64::from(target)).round() as i32;

            if filtered >= CRITICAL_TEMP {
                target = 100;
            } else if filtered >= WARNING_TEMP {
                target = target.max(WARNING_MIN_SPEED);
            }

            channel.last_speed = target;
            targets.push(target);
        }

        if source.same_speed {
            if let Some(&max_target) = targets.iter().max() {
                for target in targets.iter_mut() {
                    *target = max_target;
                }
                for channel in self.channels.iter_mut() {
                    channel.last_speed = max_target;
                }
            }
        }

        let mut readings = Vec::with_capacity(targets.len());
        let timestamp_ms = now_ms();

        for (index, &target) in targets.iter().enumerate() {
            let speed = if fan_control_enabled {
                let _ = self.io.set_fan_speed_percent(index as u8, target.clamp(0, 100) as u8);
                target.clamp(0, 100) as u8
            } else {
                self.io.fan_speed_percent(index as u8).unwrap_or(0)
            };

            readings.push(FanReading { speed_percent: speed, temperature: filtered_temps[index], timestamp_ms });
        }

        self.snapshot.set_fans(readings.clone());

        if fan_control_enabled && !available_temps.is_empty() {
            let pump_temp = filtered_temps.first().copied().flatten().unwrap_or(0);
            let _level = pump_level(&source.pump_table(), pump_temp);
        }

        readings
    }

    /// Current pump level for `current_temp`, clamped away from 12V unless
    /// the active profile's table explicitly requests it.
    pub fn pump_level_for(&self, profile_source: &CurveSource, current_temp: i32) -> PumpLevel {
        let source = self.effective_source(profile_source);
        pump_level(&source.pump_table(), current_temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{IoError, IoResult, Platform};

    struct FakeDevice {
        fan_count: u8,
        temps: Vec<i32>,
    }

    impl DeviceInterface for FakeDevice {
        fn platform(&self) -> Platform { Platform::Dummy }
        fn identify(&self) -> IoResult<bool> { Ok(true) }
        fn interface_id_str(&self) -> IoResult<String> { Ok("fake".into()) }
        fn model_id_str(&self) -> IoResult<String> { Ok("fake".into()) }
        fn set_enable_mode_set(&self, _enabled: bool) -> IoResult<()> { Ok(()) }
        fn number_fans(&self) -> IoResult<u8> { Ok(self.fan_count) }
        fn fans_min_speed(&self) -> IoResult<u8> { Ok(10) }
        fn fans_off_available(&self) -> IoResult<bool> { Ok(true) }
        fn set_fans_auto(&self) -> IoResult<()> { Ok(()) }
        fn set_fan_speed_percent(&self, _fan: u8, _percent: u8) -> IoResult<()> { Ok(()) }
        fn fan_speed_percent(&self, _fan: u8) -> IoResult<u8> { Ok(0) }
        fn fan_temperature(&self, fan: u8) -> IoResult<u8> {
            self.temps.get(fan as usize).copied().map(|t| t as u8).ok_or(IoError::OutOfRange)
        }
        fn set_webcam(&self, _on: bool) -> IoResult<()> { Err(IoError::Unsupported) }
        fn webcam(&self) -> IoResult<bool> { Err(IoError::Unsupported) }
        fn available_odm_performance_profiles(&self) -> IoResult<Vec<String>> { Ok(Vec::new()) }
        fn set_odm_performance_profile(&self, _name: &str) -> IoResult<()> { Err(IoError::Unsupported) }
        fn default_odm_performance_profile(&self) -> IoResult<String> { Err(IoError::Unsupported) }
        fn number_tdps(&self) -> IoResult<u8> { Ok(0) }
        fn tdp_descriptors(&self) -> IoResult<Vec<String>> { Ok(Vec::new()) }
        fn tdp_min(&self, _index: u8) -> IoResult<i32> { Err(IoError::Unsupported) }
        fn tdp_max(&self, _index: u8) -> IoResult<i32> { Err(IoError::Unsupported) }
        fn tdp(&self, _index: u8) -> IoResult<i32> { Err(IoError::Unsupported) }
        fn set_tdp(&self, _index: u8, _watts: i32) -> IoResult<()> { Err(IoError::Unsupported) }
    }

    fn source() -> CurveSource {
        CurveSource { fan_profile: "fan-balanced".into(), same_speed: false, offset_fanspeed: 0, ..CurveSource::default() }
    }

    #[test]
    fn critical_temperature_forces_full_speed() {
        let device: Box<dyn DeviceInterface> = Box::new(FakeDevice { fan_count: 1, temps: vec![95] });
        let mut worker = FanWorker::new(device, Arc::new(Snapshot::new()));
        let readings = worker.tick(&source(), true);
        assert_eq!(readings[0].speed_percent, 100);
    }

    #[test]
    fn same_speed_couples_all_fans_to_the_max() {
        let device: Box<dyn DeviceInterface> = Box::new(FakeDevice { fan_count: 2, temps: vec![90, 30] });
        let mut worker = FanWorker::new(device, Arc::new(Snapshot::new()));
        let mut source = source();
        source.same_speed = true;
        let readings = worker.tick(&source, true);
        assert_eq!(readings[0].speed_percent, readings[1].speed_percent);
    }

    #[test]
    fn missing_temperature_carries_last_speed() {
        let device: Box<dyn DeviceInterface> = Box::new(FakeDevice { fan_count: 1, temps: vec![] });
        let mut worker = FanWorker::new(device, Arc::new(Snapshot::new()));
        let readings = worker.tick(&source(), true);
        assert_eq!(readings[0].temperature, None);
    }
}
