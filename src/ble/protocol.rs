// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Nordic UART wire protocol for the water-cooler peripheral (spec §4.7).

use crate::profile::model::PumpLevel;

pub const UART_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";
pub const UART_TX_CHARACTERISTIC_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";
pub const UART_RX_CHARACTERISTIC_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// The 0x2902 Client Characteristic Configuration descriptor; writing
/// `0x0100` to it enables notifications on RX.
pub const CCCD_UUID: &str = "00002902-0000-1000-8000-00805f9b34fb";
pub const CCCD_ENABLE_NOTIFY: [u8; 2] = [0x01, 0x00];

const FRAME_START: u8 = 0xFE;
const FRAME_END: u8 = 0xEF;

const CMD_RESET: u8 = 0x19;
const CMD_FAN: u8 = 0x1B;
const CMD_PUMP: u8 = 0x1C;
const CMD_RGB: u8 = 0x1E;

const PUMP_FIXED_DUTY: u8 = 60;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RgbMode {
    Static = 0,
    Breathe = 1,
    Colorful = 2,
    BreatheColor = 3,
}

impl RgbMode {
    /// The daemon has no "Temperature" mode concept on the wire; callers
    /// that surface one in the UI map it down to `Static`.
    pub fn from_ui_mode(name: &str) -> Self {
        match name {
            "breathe" => Self::Breathe,
            "colorful" => Self::Colorful,
            "breathe_color" => Self::BreatheColor,
            _ => Self::Static,
        }
    }
}

fn frame(cmd: u8, enable: bool, p1: u8, p2: u8, p3: u8, p4: u8) -> [u8; 8] {
    [FRAME_START, cmd, enable as u8, p1, p2, p3, p4, FRAME_END]
}

pub fn reset_frame() -> [u8; 8] { frame(CMD_RESET, true, 0, 0, 0, 0) }

pub fn fan_frame(duty_percent: Option<u8>) -> [u8; 8] {
    match duty_percent {
        Some(duty) => frame(CMD_FAN, true, duty.min(100), 0, 0, 0),
        None => frame(CMD_FAN, false, 0, 0, 0, 0),
    }
}

pub fn pump_frame(level: Option<PumpLevel>) -> [u8; 8] {
    match level {
        Some(level) => frame(CMD_PUMP, true, PUMP_FIXED_DUTY, level as u8, 0, 0),
        None => frame(CMD_PUMP, false, 0, 0, 0, 0),
    }
}

pub fn rgb_frame(color: Option<(u8, u8, u8, RgbMode)>) -> [u8; 8] {
    match color {
        Some((r, g, b, mode)) => frame(CMD_RGB, true, r, g, b, mode as u8),
        None => frame(CMD_RGB, false, 0, 0, 0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_frame_encodes_duty_in_p1() {
        assert_eq!(fan_frame(Some(42)), [0xFE, 0x1B, 1, 42, 0, 0, 0, 0xEF]);
    }

    #[test]
    fn fan_frame_off_clears_enable_and_duty() {
        assert_eq!(fan_frame(None), [0xFE, 0x1B, 0, 0, 0, 0, 0, 0xEF]);
    }

    #[test]
    fn pump_frame_uses_fixed_duty_and_voltage_enum() {
        assert_eq!(pump_frame(Some(PumpLevel::V8)), [0xFE, 0x1C, 1, 60, PumpLevel::V8 as u8, 0, 0, 0xEF]);
    }

    #[test]
    fn rgb_frame_encodes_channels_and_mode() {
        assert_eq!(rgb_frame(Some((10, 20, 30, RgbMode::Colorful))), [0xFE, 0x1E, 1, 10, 20, 30, RgbMode::Colorful as u8, 0xEF]);
    }

    #[test]
    fn ui_temperature_mode_maps_to_static() {
        assert_eq!(RgbMode::from_ui_mode("temperature"), RgbMode::Static);
    }
}
