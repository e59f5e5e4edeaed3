// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Null [`DeviceInterface`] installed when neither a Clevo nor a Uniwill
//! identifier responds. Every operation fails with [`IoError::Unsupported`]
//! so the rest of the daemon degrades gracefully rather than branching on
//! "is hardware present".

use super::{DeviceInterface, IoError, IoResult, Platform};

pub struct DummyDevice;

impl DummyDevice {
    pub fn new() -> Self { Self }
}

impl DeviceInterface for DummyDevice {
    fn platform(&self) -> Platform { Platform::Dummy }

    fn identify(&self) -> IoResult<bool> { Ok(false) }

    fn interface_id_str(&self) -> IoResult<String> { Err(IoError::Unsupported) }

    fn model_id_str(&self) -> IoResult<String> { Err(IoError::Unsupported) }

    fn set_enable_mode_set(&self, _enabled: bool) -> IoResult<()> { Err(IoError::Unsupported) }

    fn number_fans(&self) -> IoResult<u8> { Ok(0) }

    fn fans_min_speed(&self) -> IoResult<u8> { Err(IoError::Unsupported) }

    fn fans_off_available(&self) -> IoResult<bool> { Ok(false) }

    fn set_fans_auto(&self) -> IoResult<()> { Err(IoError::Unsupported) }

    fn set_fan_speed_percent(&self, _fan: u8, _percent: u8) -> IoResult<()> { Err(IoError::Unsupported) }

    fn fan_speed_percent(&self, _fan: u8) -> IoResult<u8> { Err(IoError::Unsupported) }

    fn fan_temperature(&self, _fan: u8) -> IoResult<u8> { Err(IoError::Unsupported) }

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
