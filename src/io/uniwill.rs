// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Uniwill ioctl target: 2 fans, one ioctl per fan, raw speed on a 0..0xc8
//! scale. Supports up to 3 TDP power limits (PL1/PL2/PL4-like).

use super::{DeviceInterface, IoError, IoResult, Platform, RawDevice};

const MAGIC: u64 = 0xEF00;
const R_MODEL_ID: u64 = MAGIC | 0x01;
const W_MODE_ENABLE: u64 = MAGIC | 0x02;
const R_FANS_MIN_SPEED: u64 = MAGIC | 0x03;
const R_FANS_OFF_AVAILABLE: u64 = MAGIC | 0x04;
const W_FANAUTO: u64 = MAGIC | 0x05;
const W_FANSPEED: u64 = MAGIC | 0x06;
const W_FANSPEED2: u64 = MAGIC | 0x07;
const R_FANSPEED: u64 = MAGIC | 0x08;
const R_FANSPEED2: u64 = MAGIC | 0x09;
const R_FAN_TEMP: u64 = MAGIC | 0x0A;
const R_FAN_TEMP2: u64 = MAGIC | 0x0B;
const R_WEBCAM_SW: u64 = MAGIC | 0x20;
const W_WEBCAM_SW: u64 = MAGIC | 0x21;
const R_PROFS_AVAILABLE: u64 = MAGIC | 0x30;
const W_PERF_PROF: u64 = MAGIC | 0x31;
const R_TDP0_MIN: u64 = MAGIC | 0x40;
const R_TDP1_MIN: u64 = MAGIC | 0x41;
const R_TDP2_MIN: u64 = MAGIC | 0x42;
const R_TDP0_MAX: u64 = MAGIC | 0x43;
const R_TDP1_MAX: u64 = MAGIC | 0x44;
const R_TDP2_MAX: u64 = MAGIC | 0x45;
const R_TDP0: u64 = MAGIC | 0x46;
const R_TDP1: u64 = MAGIC | 0x47;
const R_TDP2: u64 = MAGIC | 0x48;
const W_TDP0: u64 = MAGIC | 0x49;
const W_TDP1: u64 = MAGIC | 0x4A;
const W_TDP2: u64 = MAGIC | 0x4B;

const RAW_MAX: i32 = 0xc8;

pub struct UniwillDevice {
    io: RawDevice,
}

impl UniwillDevice {
    pub fn new() -> Self { Self { io: RawDevice::open() } }

    fn fanspeed_request(fan: u8) -> IoResult<(u64, u64, u64)> {
        match fan {
            0 => Ok((W_FANSPEED, R_FANSPEED, R_FAN_TEMP)),
            1 => Ok((W_FANSPEED2, R_FANSPEED2, R_FAN_TEMP2)),
            _ => Err(IoError::OutOfRange),
        }
    }

    fn tdp_requests(index: u8) -> IoResult<(u64, u64, u64, u64)> {
        match index {
            0 => Ok((R_TDP0_MIN, R_TDP0_MAX, R_TDP0, W_TDP0)),
            1 => Ok((R_TDP1_MIN, R_TDP1_MAX, R_TDP1, W_TDP1)),
            2 => Ok((R_TDP2_MIN, R_TDP2_MAX, R_TDP2, W_TDP2)),
            _ => Err(IoError::OutOfRange),
        }
    }
}

impl DeviceInterface for UniwillDevice {
    fn platform(&self) -> Platform { Platform::Uniwill }

    fn identify(&self) -> IoResult<bool> {
        if !self.io.is_available() {
            return Err(IoError::Unsupported);
        }
        self.io.read_i32(R_MODEL_ID).map(|id| id != 0)
    }

    fn interface_id_str(&self) -> IoResult<String> { Ok("uniwill".to_owned()) }

    fn model_id_str(&self) -> IoResult<String> { self.io.read_i32(R_MODEL_ID).map(|v| format!("uniwill-{:x}", v)) }

    fn set_enable_mode_set(&self, enabled: bool) -> IoResult<()> {
        self.io.write_i32(W_MODE_ENABLE, enabled as i32)
    }

    fn number_fans(&self) -> IoResult<u8> { Ok(2) }

    fn fans_min_speed(&self) -> IoResult<u8> {
        self.io.read_i32(R_FANS_MIN_SPEED).map(|v| v.clamp(0, 100) as u8)
    }

    fn fans_off_available(&self) -> IoResult<bool> { self.io.read_i32(R_FANS_OFF_AVAILABLE).map(|v| v != 0) }

    fn set_fans_auto(&self) -> IoResult<()> { self.io.write_i32(W_FANAUTO, 1) }

    fn set_fan_speed_percent(&self, fan: u8, percent: u8) -> IoResult<()> {
        if percent > 100 {
            return Err(IoError::OutOfRange);
        }
        let (write_req, ..) = Self::fanspeed_request(fan)?;
        let raw = (i32::from(percent) * RAW_MAX) / 100;
        self.io.write_i32(write_req, raw)
    }

    fn fan_speed_percent(&self, fan: u8) -> IoResult<u8> {
        let (_, read_req, _) = Self::fanspeed_request(fan)?;
        let raw = self.io.read_i32(read_req)?.clamp(0, RAW_MAX);
        let pct = if raw == 0 { 0 } else { ((raw * 100 + RAW_MAX - 1) / RAW_MAX) as u8 };
        Ok(pct)
    }

    fn fan_temperature(&self, fan: u8) -> IoResult<u8> {
        let (.., temp_req) = Self::fanspeed_request(fan)?;
        let temp = self.io.read_i32(temp_req)?;
        if temp <= 1 {
            return Err(IoError::Unsupported);
        }
        Ok(temp as u8)
    }

    fn set_webcam(&self, on: bool) -> IoResult<()> { self.io.write_i32(W_WEBCAM_SW, on as i32) }

    fn webcam(&self) -> IoResult<bool> { self.io.read_i32(R_WEBCAM_SW).map(|v| v != 0) }

    fn available_odm_performance_profiles(&self) -> IoResult<Vec<String>> {
        let count = self.io.read_i32(R_PROFS_AVAILABLE)?;
        const NAMES: [&str; 4] = ["quiet", "balanced", "enthusiast", "overboost"];
        Ok(NAMES.iter().take(count.max(0) as usize).map(|s| s.to_string()).collect())
    }

    fn set_odm_performance_profile(&self, name: &str) -> IoResult<()> {
        let index = match name {
            "quiet" => 0,
            "balanced" => 1,
            "enthusiast" => 2,
            "overboost" => 3,
            _ => return Err(IoError::OutOfRange),
        };
        self.io.write_i32(W_PERF_PROF, index)
    }

    fn default_odm_performance_profile(&self) -> IoResult<String> { Ok("balanced".to_owned()) }

    fn number_tdps(&self) -> IoResult<u8> {
        for index in 0..3 {
            if self.tdp(index).is_err() {
                return Ok(index);
            }
        }
        Ok(3)
    }

    fn tdp_descriptors(&self) -> IoResult<Vec<String>> {
        const NAMES: [&str; 3] = ["pl1", "pl2", "pl4"];
        let n = self.number_tdps()? as usize;
        Ok(NAMES.iter().take(n).map(|s| s.to_string()).collect())
    }

    fn tdp_min(&self, index: u8) -> IoResult<i32> {
        let (min_req, ..) = Self::tdp_requests(index)?;
        self.io.read_i32(min_req)
    }

    fn tdp_max(&self, index: u8) -> IoResult<i32> {
        let (_, max_req, ..) = Self::tdp_requests(index)?;
        self.io.read_i32(max_req)
    }

    fn tdp(&self, index: u8) -> IoResult<i32> {
        let (_, _, get_req, _) = Self::tdp_requests(index)?;
        self.io.read_i32(get_req)
    }

    fn set_tdp(&self, index: u8, watts: i32) -> IoResult<()> {
        let (min, max) = (self.tdp_min(index)?, self.tdp_max(index)?);
        if watts < min || watts > max {
            return Err(IoError::OutOfRange);
        }
        let (.., write_req) = Self::tdp_requests(index)?;
        self.io.write_i32(write_req, watts)
    }
}
