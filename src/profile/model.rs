// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The profile schema (spec §3.1). JSON (de)serialization is lenient:
//! missing fields default per-field, unknown fields are ignored (serde's
//! default behaviour already does both).

use serde::{Deserialize, Serialize};

fn default_description() -> String { String::new() }
fn default_display_brightness() -> u8 { 100 }
fn default_true() -> bool { true }
fn default_governor() -> String { "powersave".to_owned() }
fn default_epp() -> String { "balance_performance".to_owned() }
fn default_fan_profile() -> String { "fan-balanced".to_owned() }
fn neg_one() -> i32 { -1 }
fn empty_json() -> String { "{}".to_owned() }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub cpu: CpuSettings,
    #[serde(default)]
    pub webcam: WebcamSettings,
    #[serde(default)]
    pub fan: FanSettings,
    #[serde(default)]
    pub odm_profile: OdmProfile,
    #[serde(default)]
    pub odm_power_limits: OdmPowerLimits,
    #[serde(default)]
    pub nvidia_power_ctrl_profile: NvidiaPowerCtrlProfile,
    #[serde(default)]
    pub charging_profile: String,
    #[serde(default)]
    pub charging_priority: String,
    #[serde(default)]
    pub charge_type: String,
    #[serde(default = "neg_one")]
    pub charge_start_threshold: i32,
    #[serde(default = "neg_one")]
    pub charge_end_threshold: i32,
    #[serde(default)]
    pub keyboard: KeyboardSettings,
}

impl Profile {
    /// Fills any field that is still at its *zero value* with the matching
    /// field from `template`. Used when migrating legacy custom profiles
    /// that predate a newly added field.
    pub fn fill_from_default(&mut self, template: &Profile) {
        if self.description.is_empty() {
            self.description = template.description.clone();
        }
        if self.cpu.governor.is_empty() {
            self.cpu.governor = template.cpu.governor.clone();
        }
        if self.cpu.energy_performance_preference.is_empty() {
            self.cpu.energy_performance_preference = template.cpu.energy_performance_preference.clone();
        }
        if self.fan.fan_profile.is_empty() {
            self.fan.fan_profile = template.fan.fan_profile.clone();
        }
        if self.keyboard.keyboard_profile_data.is_empty() || self.keyboard.keyboard_profile_data == "{}" {
            self.keyboard.keyboard_profile_data = template.keyboard.keyboard_profile_data.clone();
        }
    }

    /// §3.1 invariant: fan curves monotone, pump table bounded, threshold
    /// ordering. Returns `false` when the profile is structurally invalid
    /// (used by `ApplyProfile`/`AddCustomProfile` argument validation).
    pub fn is_valid(&self) -> bool {
        if self.charge_start_threshold >= 0
            && self.charge_end_threshold >= 0
            && self.charge_start_threshold > self.charge_end_threshold
        {
            return false;
        }

        if self.fan.table_pump.len() > 3 {
            return false;
        }

        for table in [&self.fan.table_cpu, &self.fan.table_gpu, &self.fan.table_water_cooler_fan] {
            if !is_monotone(table) {
                return false;
            }
        }

        if !is_strictly_increasing_temp(&self.fan.table_pump) {
            return false;
        }

        true
    }
}

fn is_monotone(points: &[FanPoint]) -> bool {
    points.windows(2).all(|w| w[0].temp <= w[1].temp && w[0].speed <= w[1].speed)
}

fn is_strictly_increasing_temp(points: &[FanPoint]) -> bool { points.windows(2).all(|w| w[0].temp < w[1].temp) }

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_display_brightness")]
    pub brightness: u8,
    #[serde(default)]
    pub use_brightness: bool,
    #[serde(default)]
    pub refresh_rate: u32,
    #[serde(default)]
    pub use_ref_rate: bool,
    #[serde(default)]
    pub x_resolution: u32,
    #[serde(default)]
    pub y_resolution: u32,
    #[serde(default)]
    pub use_resolution: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSettings {
    #[serde(default)]
    pub online_cores: Option<u32>,
    #[serde(default)]
    pub scaling_min_frequency: Option<i64>,
    #[serde(default)]
    pub scaling_max_frequency: Option<i64>,
    #[serde(default = "default_governor")]
    pub governor: String,
    #[serde(default = "default_epp")]
    pub energy_performance_preference: String,
    #[serde(default)]
    pub no_turbo: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebcamSettings {
    #[serde(default = "default_true")]
    pub status: bool,
    #[serde(default = "default_true")]
    pub use_status: bool,
}

impl Default for WebcamSettings {
    fn default() -> Self { Self { status: true, use_status: true } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FanSettings {
    #[serde(default = "default_true")]
    pub use_control: bool,
    #[serde(default = "default_fan_profile")]
    pub fan_profile: String,
    #[serde(default)]
    pub offset_fanspeed: i32,
    #[serde(default = "default_true")]
    pub same_speed: bool,
    #[serde(default = "default_true")]
    pub auto_control_wc: bool,
    #[serde(default)]
    pub table_cpu: Vec<FanPoint>,
    #[serde(default)]
    pub table_gpu: Vec<FanPoint>,
    #[serde(default)]
    pub table_pump: Vec<FanPoint>,
    #[serde(default)]
    pub table_water_cooler_fan: Vec<FanPoint>,
}

impl Default for FanSettings {
    fn default() -> Self {
        Self {
            use_control: true,
            fan_profile: default_fan_profile(),
            offset_fanspeed: 0,
            same_speed: true,
            auto_control_wc: true,
            table_cpu: Vec::new(),
            table_gpu: Vec::new(),
            table_pump: Vec::new(),
            table_water_cooler_fan: Vec::new(),
        }
    }
}

/// A single fan-curve point. For pump tables `speed` is a discrete level
/// 0..4 meaning {Off, 7V, 8V, 11V, 12V}; callers must clamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanPoint {
    pub temp: i32,
    pub speed: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OdmProfile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OdmPowerLimits {
    #[serde(default)]
    pub tdp_values: Vec<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NvidiaPowerCtrlProfile {
    #[serde(default)]
    pub c_tgp_offset: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardSettings {
    #[serde(default = "empty_json")]
    pub keyboard_profile_data: String,
    #[serde(default)]
    pub keyboard_profile_name: String,
}

/// Pump voltage levels; the GUI is expected never to emit `FullSpeed`, but
/// the daemon must still clamp an out-of-range request down to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PumpLevel {
    Off = 0,
    V7 = 1,
    V8 = 2,
    V11 = 3,
    FullSpeed = 4,
}

impl PumpLevel {
    pub fn from_raw(value: i32) -> Self {
        match value.clamp(0, 4) {
            0 => Self::Off,
            1 => Self::V7,
            2 => Self::V8,
            3 => Self::V11,
            _ => Self::FullSpeed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_profile() -> Profile {
        Profile {
            id: "custom-1".into(),
            name: "Test".into(),
            description: String::new(),
            display: DisplaySettings::default(),
            cpu: CpuSettings::default(),
            webcam: WebcamSettings::default(),
            fan: FanSettings::default(),
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

    #[test]
    fn round_trips_through_json() {
        let mut profile = minimal_profile();
        profile.fan.table_cpu = vec![FanPoint { temp: 40, speed: 10 }, FanPoint { temp: 60, speed: 50 }];
        profile.cpu.scaling_min_frequency = Some(800_000);

        let json = serde_json::to_string(&profile).unwrap();
        let reloaded: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, reloaded);
    }

    #[test]
    fn missing_fields_fill_with_defaults() {
        let profile: Profile = serde_json::from_str(r#"{"id":"x","name":"X"}"#).unwrap();
        assert_eq!(profile.cpu.governor, "powersave");
        assert_eq!(profile.fan.fan_profile, "fan-balanced");
        assert!(profile.webcam.use_status);
        assert_eq!(profile.charge_start_threshold, -1);
    }

    #[test]
    fn rejects_threshold_order_violation() {
        let mut profile = minimal_profile();
        profile.charge_start_threshold = 80;
        profile.charge_end_threshold = 50;
        assert!(!profile.is_valid());
    }

    #[test]
    fn rejects_non_monotone_cpu_table() {
        let mut profile = minimal_profile();
        profile.fan.table_cpu = vec![FanPoint { temp: 40, speed: 50 }, FanPoint { temp: 60, speed: 10 }];
        assert!(!profile.is_valid());
    }

    #[test]
    fn rejects_pump_table_over_three_entries() {
        let mut profile = minimal_profile();
        profile.fan.table_pump = vec![
            FanPoint { temp: 40, speed: 1 },
            FanPoint { temp: 50, speed: 2 },
            FanPoint { temp: 60, speed: 3 },
            FanPoint { temp: 70, speed: 4 },
        ];
        assert!(!profile.is_valid());
    }

    #[test]
    fn pump_level_clamps_above_range() {
        assert_eq!(PumpLevel::from_raw(99), PumpLevel::FullSpeed);
        assert_eq!(PumpLevel::from_raw(-5), PumpLevel::Off);
    }
}
