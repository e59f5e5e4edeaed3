// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Curve lookups used by the fan-control loop (spec §4.5, §4.6): piecewise
//! linear interpolation for CPU/GPU/water-cooler-fan tables, and a
//! step-function floor lookup for the pump table.

use crate::profile::model::{FanPoint, PumpLevel};

/// Piecewise-linear interpolation between adjacent table points. Clamps to
/// the first/last entry's speed when `temp` falls outside the table. An
/// empty table yields 0.
pub fn interpolate(table: &[FanPoint], temp: i32) -> i32 {
    if table.is_empty() {
        return 0;
    }
    if temp <= table[0].temp {
        return table[0].speed;
    }
    if let Some(last) = table.last() {
        if temp >= last.temp {
            return last.speed;
        }
    }

    for window in table.windows(2) {
        let (lo, hi) = (window[0], window[1]);
        if temp >= lo.temp && temp <= hi.temp {
            if hi.temp == lo.temp {
                return hi.speed;
            }
            let span = (hi.temp - lo.temp) as f64;
            let frac = (temp - lo.temp) as f64 / span;
            return (lo.speed as f64 + frac * (hi.speed - lo.speed) as f64).round() as i32;
        }
    }

    table.last().map(|p| p.speed).unwrap_or(0)
}

/// Step-function floor lookup for the pump table: the level of the last
/// entry whose `temp <= current_temp`, or `Off` if `current_temp` is below
/// every entry.
pub fn pump_level(table: &[FanPoint], current_temp: i32) -> PumpLevel {
    table
        .iter()
        .filter(|point| point.temp <= current_temp)
        .last()
        .map(|point| PumpLevel::from_raw(point.speed))
        .unwrap_or(PumpLevel::Off)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<FanPoint> {
        vec![FanPoint { temp: 40, speed: 20 }, FanPoint { temp: 60, speed: 40 }, FanPoint { temp: 80, speed: 100 }]
    }

    #[test]
    fn interpolates_between_points() {
        assert_eq!(interpolate(&table(), 50), 30);
    }

    #[test]
    fn clamps_below_first_point() {
        assert_eq!(interpolate(&table(), 10), 20);
    }

    #[test]
    fn clamps_above_last_point() {
        assert_eq!(interpolate(&table(), 120), 100);
    }

    #[test]
    fn empty_table_yields_zero() {
        assert_eq!(interpolate(&[], 50), 0);
    }

    #[test]
    fn pump_level_is_floor_lookup() {
        let pump = vec![FanPoint { temp: 40, speed: 1 }, FanPoint { temp: 60, speed: 2 }, FanPoint { temp: 80, speed: 3 }];
        assert_eq!(pump_level(&pump, 30), PumpLevel::Off);
        assert_eq!(pump_level(&pump, 45), PumpLevel::V7);
        assert_eq!(pump_level(&pump, 100), PumpLevel::V11);
    }
}
