// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Clevo ioctl target: 3 fans, raw speed encoded 0..0xff, one 32-bit word
//! packs all three fan raw values so changing one fan requires re-reading
//! the other two's current raw bytes first.

use super::{DeviceInterface, IoError, IoResult, Platform, RawDevice};

const MAGIC: u64 = 0xEC00;
const R_HW_IF_STR: u64 = MAGIC | 0x01;
const R_MODEL_ID_STR: u64 = MAGIC | 0x02;
const W_MODE_ENABLE: u64 = MAGIC | 0x03;
const R_FANINFO1: u64 = MAGIC | 0x10;
const R_FANINFO2: u64 = MAGIC | 0x11;
const R_FANINFO3: u64 = MAGIC | 0x12;
const W_FANSPEED: u64 = MAGIC | 0x13;
const W_FANAUTO: u64 = MAGIC | 0x14;
const R_WEBCAM_SW: u64 = MAGIC | 0x20;
const W_WEBCAM_SW: u64 = MAGIC | 0x21;
const W_PERF_PROFILE: u64 = MAGIC | 0x30;
const R_IDENTIFY: u64 = MAGIC | 0xFF;

pub struct ClevoDevice {
    io: RawDevice,
}

/// `FANINFOx`: bits 0..15 temperature (C), bits 16..23 raw speed (0..0xff),
/// bit 24 set when the sensor for that fan is missing.
struct FanInfo {
    temp: u8,
    raw_speed: u8,
}

fn decode_faninfo(word: i32) -> FanInfo {
    let word = word as u32;
    FanInfo { temp: (word & 0xff) as u8, raw_speed: ((word >> 16) & 0xff) as u8 }
}

impl ClevoDevice {
    pub fn new() -> Self { Self { io: RawDevice::open() } }

    fn faninfo(&self, fan: u8) -> IoResult<FanInfo> {
        let request = match fan {
            0 => R_FANINFO1,
            1 => R_FANINFO2,
            2 => R_FANINFO3,
            _ => return Err(IoError::OutOfRange),
        };
        self.io.read_i32(request).map(decode_faninfo)
    }
}

impl DeviceInterface for ClevoDevice {
    fn platform(&self) -> Platform { Platform::Clevo }

    fn identify(&self) -> IoResult<bool> {
        if !self.io.is_available() {
            return Err(IoError::Unsupported);
        }
        Ok(self.io.call(R_IDENTIFY))
    }

    fn interface_id_str(&self) -> IoResult<String> {
        self.io.read_i32(R_HW_IF_STR).map(|_| "clevo".to_owned())
    }

    fn model_id_str(&self) -> IoResult<String> {
        self.io.read_i32(R_MODEL_ID_STR).map(|v| format!("clevo-{:x}", v))
    }

    fn set_enable_mode_set(&self, enabled: bool) -> IoResult<()> {
        self.io.write_i32(W_MODE_ENABLE, enabled as i32)
    }

    fn number_fans(&self) -> IoResult<u8> { Ok(3) }

    fn fans_min_speed(&self) -> IoResult<u8> { Ok(20) }

    fn fans_off_available(&self) -> IoResult<bool> { Ok(true) }

    fn set_fans_auto(&self) -> IoResult<()> { self.io.write_i32(W_FANAUTO, 1) }

    fn set_fan_speed_percent(&self, fan: u8, percent: u8) -> IoResult<()> {
        if fan >= 3 || percent > 100 {
            return Err(IoError::OutOfRange);
        }

        // The kernel module packs all three raw fan bytes into one 32-bit
        // word; changing one fan requires re-reading the other two first.
        let mut raw = [0u8; 3];
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = if i as u8 == fan {
                ((u32::from(percent) * 0xff) / 100) as u8
            } else {
                self.faninfo(i as u8).map(|info| info.raw_speed).unwrap_or(0)
            };
        }

        let packed = (raw[0] as i32) | ((raw[1] as i32) << 8) | ((raw[2] as i32) << 16);
        self.io.write_i32(W_FANSPEED, packed)
    }

    fn fan_speed_percent(&self, fan: u8) -> IoResult<u8> {
        let info = self.faninfo(fan)?;
        // Ceiling rounding for nonzero raw speeds so a barely-spinning fan
        // doesn't report 0%.
        let pct = if info.raw_speed == 0 { 0 } else { ((u32::from(info.raw_speed) * 100 + 0xfe) / 0xff) as u8 };
        Ok(pct)
    }

    fn fan_temperature(&self, fan: u8) -> IoResult<u8> {
        let info = self.faninfo(fan)?;
        if info.temp <= 1 {
            return Err(IoError::Unsupported);
        }
        Ok(info.temp)
    }

    fn set_webcam(&self, on: bool) -> IoResult<()> { self.io.write_i32(W_WEBCAM_SW, on as i32) }

    fn webcam(&self) -> IoResult<bool> { self.io.read_i32(R_WEBCAM_SW).map(|v| v != 0) }

    fn available_odm_performance_profiles(&self) -> IoResult<Vec<String>> {
        Ok(vec!["quiet".into(), "power_save".into(), "enthusiast".into(), "overboost".into()])
    }

    fn set_odm_performance_profile(&self, name: &str) -> IoResult<()> {
        let index = match name {
            "quiet" => 0,
            "power_save" => 1,
            "enthusiast" => 2,
            "overboost" => 3,
            _ => return Err(IoError::OutOfRange),
        };
        self.io.write_i32(W_PERF_PROFILE, index)
    }

    fn default_odm_performance_profile(&self) -> IoResult<String> { Ok("enthusiast".to_owned()) }

    fn number_tdps(&self) -> IoResult<u8> { Err(IoError::Unsupported) }

    fn tdp_descriptors(&self) -> IoResult<Vec<String>> { Err(IoError::Unsupported) }

    fn tdp_min(&self, _index: u8) -> IoResult<i32> { Err(IoError::Unsupported) }

    fn tdp_max(&self, _index: u8) -> IoResult<i32> { Err(IoError::Unsupported) }

    fn tdp(&self, _index: u8) -> IoResult<i32> { Err(IoError::Unsupported) }

    fn set_tdp(&self, _index: u8, _watts: i32) -> IoResult<()> { Err(IoError::Unsupported) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faninfo_decodes_temp_and_speed() {
        let word = 0x00_42_00_37u32 as i32; // raw speed 0x42, temp 0x37
        let info = decode_faninfo(word);
        assert_eq!(info.temp, 0x37);
        assert_eq!(info.raw_speed, 0x42);
    }
}
