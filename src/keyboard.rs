// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Keyboard-backlight listener (spec §4.9): detects which LED class variant
//! is present and applies zone state through it.

use crate::sysfs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const WHITE_PATH: &str = "/sys/devices/platform/tuxedo_keyboard/leds/white:kbd_backlight";
const WHITE_NB05_PATH: &str = "/sys/devices/platform/tuxedo_keyboard/leds/white:kbd_backlight_1";
const RGB_ZONE_PATHS: [&str; 3] = [
    "/sys/devices/platform/tuxedo_keyboard/leds/rgb:kbd_backlight",
    "/sys/devices/platform/tuxedo_keyboard/leds/rgb:kbd_backlight_1",
    "/sys/devices/platform/tuxedo_keyboard/leds/rgb:kbd_backlight_2",
];
const PER_KEY_GLOB_DIR: &str = "/sys/class/leds";
const PER_KEY_PREFIX: &str = "rgb:kbd_backlight";

const MAX_CHANNEL: u8 = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    None,
    White,
    Rgb,
    PerKeyRgb,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub zones: u32,
    pub max_brightness: u32,
    pub max_red: u8,
    pub max_green: u8,
    pub max_blue: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    pub brightness: u32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub struct KeyboardBacklight {
    variant: Variant,
    zone_paths: Vec<PathBuf>,
    capabilities: Capabilities,
    zones: Vec<ZoneState>,
    control_enabled: bool,
}

fn sort_by_trailing_number(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_by_key(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.rsplit('_').next())
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .unwrap_or(0)
    });
    paths
}

fn discover_per_key_zones() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(PER_KEY_GLOB_DIR) else { return Vec::new() };
    let matches = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.file_name().and_then(|n| n.to_str()).map(|n| n.starts_with(PER_KEY_PREFIX)).unwrap_or(false))
        .collect();
    sort_by_trailing_number(matches)
}

impl KeyboardBacklight {
    /// Probes the fixed sysfs layout for whichever keyboard-backlight
    /// variant is present, preferring per-key RGB, then zoned RGB, then
    /// white-only, matching the detection order in §4.9.
    pub fn detect() -> Self {
        let per_key = discover_per_key_zones();
        if per_key.len() > 1 {
            let capabilities = Capabilities {
                zones: per_key.len() as u32,
                max_brightness: Self::read_max_brightness(&per_key[0]),
                max_red: MAX_CHANNEL,
                max_green: MAX_CHANNEL,
                max_blue: MAX_CHANNEL,
            };
            return Self::new(Variant::PerKeyRgb, per_key, capabilities);
        }

        let rgb_zones: Vec<PathBuf> = RGB_ZONE_PATHS.iter().map(PathBuf::from).filter(|p| sysfs::is_available(p)).collect();
        if !rgb_zones.is_empty() {
            let capabilities = Capabilities {
                zones: rgb_zones.len() as u32,
                max_brightness: Self::read_max_brightness(&rgb_zones[0]),
                max_red: MAX_CHANNEL,
                max_green: MAX_CHANNEL,
                max_blue: MAX_CHANNEL,
            };
            return Self::new(Variant::Rgb, rgb_zones, capabilities);
        }

        for white_path in [WHITE_PATH, WHITE_NB05_PATH] {
            let path = PathBuf::from(white_path);
            if sysfs::is_available(&path) {
                let capabilities = Capabilities { zones: 1, max_brightness: Self::read_max_brightness(&path), ..Capabilities::default() };
                return Self::new(Variant::White, vec![path], capabilities);
            }
        }

        Self::new(Variant::None, Vec::new(), Capabilities::default())
    }

    fn new(variant: Variant, zone_paths: Vec<PathBuf>, capabilities: Capabilities) -> Self {
        let zones = vec![ZoneState::default(); zone_paths.len()];
        Self { variant, zone_paths, capabilities, zones, control_enabled: true }
    }

    fn read_max_brightness(zone_path: &Path) -> u32 { sysfs::read(zone_path.join("max_brightness")).unwrap_or(MAX_CHANNEL as u32) }

    pub fn variant(&self) -> Variant { self.variant }

    pub fn capabilities(&self) -> &Capabilities { &self.capabilities }

    pub fn set_control_enabled(&mut self, enabled: bool) { self.control_enabled = enabled; }

    /// Applies `zones` to hardware unless control is disabled, in which
    /// case the incoming state is still recorded for state reads but never
    /// written.
    pub fn apply(&mut self, zones: Vec<ZoneState>) {
        self.zones = zones.clone();
        if !self.control_enabled || self.variant == Variant::None {
            return;
        }

        if let Some(zone0) = zones.first() {
            for zone_path in &self.zone_paths {
                sysfs::write(zone_path.join("brightness"), zone0.brightness);
            }
        }

        if matches!(self.variant, Variant::Rgb | Variant::PerKeyRgb) {
            for (zone_path, zone) in self.zone_paths.iter().zip(zones.iter()) {
                let buffer_input = zone_path.join("device/controls/buffer_input");
                sysfs::write(&buffer_input, 1u8);
                sysfs::write(zone_path.join("multi_intensity"), format!("{} {} {}", zone.r, zone.g, zone.b));
                sysfs::write(&buffer_input, 0u8);
            }
        }
    }

    pub fn zones(&self) -> &[ZoneState] { &self.zones }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_per_key_paths_by_trailing_number() {
        let paths = vec![
            PathBuf::from("/sys/class/leds/rgb:kbd_backlight_10"),
            PathBuf::from("/sys/class/leds/rgb:kbd_backlight_2"),
            PathBuf::from("/sys/class/leds/rgb:kbd_backlight_1"),
        ];
        let sorted = sort_by_trailing_number(paths);
        assert_eq!(sorted[0].file_name().unwrap(), "rgb:kbd_backlight_1");
        assert_eq!(sorted[2].file_name().unwrap(), "rgb:kbd_backlight_10");
    }

    #[test]
    fn apply_records_state_even_when_control_disabled() {
        let mut backlight = KeyboardBacklight::new(Variant::None, Vec::new(), Capabilities::default());
        backlight.set_control_enabled(false);
        backlight.apply(vec![ZoneState { brightness: 50, r: 1, g: 2, b: 3 }]);
        assert_eq!(backlight.zones()[0].brightness, 50);
    }
}
