// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Charging control: numeric start/end thresholds via the kernel's generic
//! `charge_control_{start,end}_threshold` battery attributes, plus the
//! firmware-level `chargingProfile` / `chargingPriority` / `chargeType`
//! string modes (spec §3.1, §4.10).

use crate::sysfs;
use std::path::PathBuf;

const START_THRESHOLD: &str = "/sys/class/power_supply/BAT0/charge_control_start_threshold";
const END_THRESHOLD: &str = "/sys/class/power_supply/BAT0/charge_control_end_threshold";
const CHARGING_PROFILE_PATH: &str = "/sys/devices/platform/uniwill_wmi/charging_profile";
const CHARGING_PRIORITY_PATH: &str = "/sys/devices/platform/uniwill_wmi/charging_priority";
const CHARGE_TYPE_PATH: &str = "/sys/devices/platform/uniwill_wmi/charge_type";

#[derive(Debug, thiserror::Error)]
pub enum ChargingError {
    #[error("charge threshold control is not available on this device")]
    Unsupported,
    #[error("charge threshold out of range (0..100)")]
    OutOfRange,
    #[error("charge end threshold must be greater than start")]
    Order,
}

pub fn thresholds_supported() -> bool { sysfs::is_available(START_THRESHOLD) && sysfs::is_available(END_THRESHOLD) }

pub fn get_thresholds() -> Result<(u8, u8), ChargingError> {
    if !thresholds_supported() {
        return Err(ChargingError::Unsupported);
    }
    let start: u8 = sysfs::read(START_THRESHOLD).ok_or(ChargingError::Unsupported)?;
    let end: u8 = sysfs::read(END_THRESHOLD).ok_or(ChargingError::Unsupported)?;
    Ok((start, end))
}

fn validate_thresholds(start: u8, end: u8) -> Result<(), ChargingError> {
    if start > 100 || end > 100 {
        return Err(ChargingError::OutOfRange);
    }
    if end <= start {
        return Err(ChargingError::Order);
    }
    Ok(())
}

/// Sets start and end together: the end threshold is bumped to 100 first so
/// a lower start never momentarily exceeds it (mirrors the kernel's
/// load-bearing write order for this attribute pair).
pub fn set_thresholds(start: u8, end: u8) -> Result<(), ChargingError> {
    validate_thresholds(start, end)?;
    if !thresholds_supported() {
        return Err(ChargingError::Unsupported);
    }

    sysfs::write(END_THRESHOLD, 100u8);
    sysfs::write(START_THRESHOLD, start);
    sysfs::write(END_THRESHOLD, end);
    Ok(())
}

pub fn set_start_threshold(start: u8) -> Result<(), ChargingError> {
    let (_, end) = get_thresholds().unwrap_or((0, 100));
    set_thresholds(start, end.max(start + 1))
}

pub fn set_end_threshold(end: u8) -> Result<(), ChargingError> {
    let (start, _) = get_thresholds().unwrap_or((0, 100));
    set_thresholds(start.min(end.saturating_sub(1)), end)
}

/// Firmware-level charging profiles: each pairs a `start`/`end` threshold
/// with a human description, matching what the teacher ships for System76
/// hardware but keyed under this device's own ids.
pub struct ChargingProfileDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub start: u8,
    pub end: u8,
}

pub fn charging_profiles() -> Vec<ChargingProfileDescriptor> {
    vec![
        ChargingProfileDescriptor {
            id: "full_charge",
            title: "Full Charge",
            description: "Charges to full capacity for the longest possible runtime on battery.",
            start: 90,
            end: 100,
        },
        ChargingProfileDescriptor {
            id: "balanced",
            title: "Balanced",
            description: "Stops charging at 90% and resumes below 85%.",
            start: 85,
            end: 90,
        },
        ChargingProfileDescriptor {
            id: "max_lifespan",
            title: "Maximum Lifespan",
            description: "Stops charging at 60% and resumes below 50%, for systems rarely run on battery.",
            start: 50,
            end: 60,
        },
    ]
}

pub fn charging_priorities() -> Vec<&'static str> { vec!["performance", "balanced", "battery_life"] }

pub fn charge_types() -> Vec<&'static str> { vec!["standard", "express", "battery_care"] }

fn string_sysfs(path: &str) -> Option<String> { sysfs::read_string(PathBuf::from(path)) }

pub fn get_charging_profile() -> Option<String> { string_sysfs(CHARGING_PROFILE_PATH) }

pub fn set_charging_profile(id: &str) -> bool { sysfs::write(CHARGING_PROFILE_PATH, id) }

pub fn get_charging_priority() -> Option<String> { string_sysfs(CHARGING_PRIORITY_PATH) }

pub fn set_charging_priority(id: &str) -> bool { sysfs::write(CHARGING_PRIORITY_PATH, id) }

pub fn get_charge_type() -> Option<String> { string_sysfs(CHARGE_TYPE_PATH) }

pub fn set_charge_type(id: &str) -> bool { sysfs::write(CHARGE_TYPE_PATH, id) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(matches!(validate_thresholds(50, 150), Err(ChargingError::OutOfRange)));
    }

    #[test]
    fn rejects_end_not_greater_than_start() {
        assert!(matches!(validate_thresholds(80, 80), Err(ChargingError::Order)));
    }

    #[test]
    fn profile_catalog_has_ascending_start_end() {
        for profile in charging_profiles() {
            assert!(profile.start < profile.end);
        }
    }
}
