// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Built-in profile catalog and fan-curve presets (spec §3.1, §4.4).

use super::model::{CpuSettings, DisplaySettings, FanPoint, FanSettings, KeyboardSettings, OdmPowerLimits, OdmProfile, NvidiaPowerCtrlProfile, Profile, WebcamSettings};

/// Sentinel ids for the 3 legacy fallback profiles, carried for devices not
/// present in the device-keyed table.
pub const LEGACY_BALANCED: &str = "__legacy_balanced";
pub const LEGACY_QUIET: &str = "__legacy_quiet";
pub const LEGACY_PERFORMANCE: &str = "__legacy_performance";

/// Id of the seed profile used by the "new custom profile" workflow and as
/// the rewrite target when a referenced custom profile is deleted.
pub const CUSTOM_TEMPLATE_ID: &str = "__custom_template";

#[derive(Clone, Debug)]
pub struct FanPreset {
    pub name: &'static str,
    pub cpu: Vec<FanPoint>,
    pub gpu: Vec<FanPoint>,
    pub pump: Vec<FanPoint>,
    pub water_cooler_fan: Vec<FanPoint>,
}

/// Builds a 17-point monotone non-decreasing curve from 20..100 °C (step 5):
/// flat at `min_speed` up to `knee`, linear ramp to `max_speed` by 80 °C,
/// flat at `max_speed` above that.
fn ramp_table(min_speed: i32, max_speed: i32, knee: i32) -> Vec<FanPoint> {
    (0..17)
        .map(|i| {
            let temp = 20 + 5 * i;
            let speed = if temp <= knee {
                min_speed
            } else if temp >= 80 {
                max_speed
            } else {
                min_speed + (max_speed - min_speed) * (temp - knee) / (80 - knee)
            };
            FanPoint { temp, speed }
        })
        .collect()
}

fn pump_table(low: i32, mid: i32, high: i32) -> Vec<FanPoint> {
    vec![FanPoint { temp: low, speed: 1 }, FanPoint { temp: mid, speed: 2 }, FanPoint { temp: high, speed: 3 }]
}

pub fn fan_presets() -> Vec<FanPreset> {
    vec![
        FanPreset {
            name: "fan-silent",
            cpu: ramp_table(0, 60, 55),
            gpu: ramp_table(0, 60, 60),
            pump: pump_table(50, 65, 80),
            water_cooler_fan: ramp_table(0, 55, 55),
        },
        FanPreset {
            name: "fan-quiet",
            cpu: ramp_table(10, 70, 50),
            gpu: ramp_table(10, 70, 55),
            pump: pump_table(45, 60, 75),
            water_cooler_fan: ramp_table(10, 65, 50),
        },
        FanPreset {
            name: "fan-balanced",
            cpu: ramp_table(20, 85, 45),
            gpu: ramp_table(20, 85, 50),
            pump: pump_table(40, 55, 70),
            water_cooler_fan: ramp_table(20, 80, 45),
        },
        FanPreset {
            name: "fan-cool",
            cpu: ramp_table(35, 95, 40),
            gpu: ramp_table(35, 95, 45),
            pump: pump_table(35, 50, 65),
            water_cooler_fan: ramp_table(35, 90, 40),
        },
        FanPreset {
            name: "fan-freezy",
            cpu: ramp_table(50, 100, 30),
            gpu: ramp_table(50, 100, 35),
            pump: pump_table(30, 45, 60),
            water_cooler_fan: ramp_table(50, 100, 30),
        },
    ]
}

pub fn fan_preset_by_name(name: &str) -> Option<FanPreset> {
    fan_presets().into_iter().find(|preset| preset.name == name || preset.name.trim_start_matches("fan-") == name)
}

fn base_profile(id: &str, name: &str, description: &str, fan_profile: &str, governor: &str, epp: &str) -> Profile {
    Profile {
        id: id.to_owned(),
        name: name.to_owned(),
        description: description.to_owned(),
        display: DisplaySettings::default(),
        cpu: CpuSettings { governor: governor.to_owned(), energy_performance_preference: epp.to_owned(), ..CpuSettings::default() },
        webcam: WebcamSettings::default(),
        fan: FanSettings { fan_profile: fan_profile.to_owned(), ..FanSettings::default() },
        odm_profile: OdmProfile::default(),
        odm_power_limits: OdmPowerLimits::default(),
        nvidia_power_ctrl_profile: NvidiaPowerCtrlProfile::default(),
        charging_profile: String::new(),
        charging_priority: String::new(),
        charge_type: String::new(),
        charge_start_threshold: -1,
        charge_end_threshold: -1,
        keyboard: KeyboardSettings::default(),
    }
}

/// 3 legacy profiles, used as a fallback when the active device model has
/// no entry in the device-keyed table.
pub fn legacy_profiles() -> Vec<Profile> {
    vec![
        base_profile(LEGACY_QUIET, "Quiet", "Low noise, reduced performance", "fan-quiet", "powersave", "power"),
        base_profile(LEGACY_BALANCED, "Balanced", "Balanced performance and noise", "fan-balanced", "powersave", "balance_performance"),
        base_profile(LEGACY_PERFORMANCE, "High Performance", "Maximum performance", "fan-cool", "performance", "performance"),
    ]
}

/// Device-keyed default profiles (MaxEnergySave / Quiet / Office /
/// HighPerformance variants). Devices absent from this table fall back to
/// [`legacy_profiles`].
pub fn device_profiles(device_id: &str) -> Vec<Profile> {
    let prefix = device_id.to_owned();
    vec![
        {
            let mut p = base_profile(
                &format!("{}-max-energy-save", prefix),
                "Max Energy Save",
                "Longest battery life",
                "fan-silent",
                "powersave",
                "power",
            );
            p.cpu.no_turbo = true;
            p.cpu.scaling_max_frequency = Some(crate::cpu::MAX_FREQ_REDUCED);
            p
        },
        base_profile(&format!("{}-quiet", prefix), "Quiet", "Low noise, reduced performance", "fan-quiet", "powersave", "power"),
        base_profile(&format!("{}-office", prefix), "Office", "Balanced for everyday use", "fan-balanced", "powersave", "balance_performance"),
        {
            let mut p = base_profile(
                &format!("{}-high-performance", prefix),
                "High Performance",
                "Maximum performance",
                "fan-freezy",
                "performance",
                "performance",
            );
            p.cpu.no_turbo = false;
            p
        },
    ]
}

/// Seed profile for the "new profile" workflow; also the rewrite target for
/// state-map entries that pointed at a since-deleted custom profile.
pub fn custom_template() -> Profile { base_profile(CUSTOM_TEMPLATE_ID, "Custom", "", "fan-balanced", "powersave", "balance_performance") }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_have_seventeen_points_each() {
        for preset in fan_presets() {
            assert_eq!(preset.cpu.len(), 17);
            assert_eq!(preset.gpu.len(), 17);
            assert_eq!(preset.water_cooler_fan.len(), 17);
            assert_eq!(preset.pump.len(), 3);
        }
    }

    #[test]
    fn presets_are_monotone() {
        for preset in fan_presets() {
            for table in [&preset.cpu, &preset.gpu, &preset.water_cooler_fan] {
                assert!(table.windows(2).all(|w| w[0].temp < w[1].temp && w[0].speed <= w[1].speed));
            }
            assert!(preset.pump.windows(2).all(|w| w[0].temp < w[1].temp));
        }
    }

    #[test]
    fn legacy_and_device_profiles_are_valid() {
        for profile in legacy_profiles().into_iter().chain(device_profiles("nuc").into_iter()).chain(std::iter::once(custom_template())) {
            assert!(profile.is_valid());
        }
    }
}
