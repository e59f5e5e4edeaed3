// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! EWMA filters used by the fan-control loop (spec §4.5): asymmetric
//! temperature smoothing (rises fast, falls slow) and output-speed
//! smoothing (rises faster than it falls, to avoid audible flutter).

/// Exponentially weighted moving average with distinct rising/falling alpha.
/// The first sample initializes the state directly; `state()` is `None`
/// until then.
#[derive(Clone, Copy, Debug)]
pub struct Ewma {
    state: Option<f64>,
    alpha_rising: f64,
    alpha_falling: f64,
}

impl Ewma {
    pub fn new(alpha_rising: f64, alpha_falling: f64) -> Self { Self { state: None, alpha_rising, alpha_falling } }

    pub fn update(&mut self, raw: f64) -> f64 {
        let next = match self.state {
            None => raw,
            Some(state) => {
                let alpha = if raw >= state { self.alpha_rising } else { self.alpha_falling };
                state + alpha * (raw - state)
            }
        };
        self.state = Some(next);
        next
    }

    /// Rounded current state, or `-1` if no sample has been fed yet.
    pub fn rounded(&self) -> i32 { self.state.map(|s| s.round() as i32).unwrap_or(-1) }
}

pub fn temperature_filter() -> Ewma { Ewma::new(0.5, 0.15) }

pub fn speed_smoother() -> Ewma { Ewma::new(0.4, 0.08) }

/// Hysteresis anchor (spec §4.5): on rising/equal filtered temperature, the
/// effective temperature tracks it immediately. On falling temperature it
/// decays by at most 1 °C per cycle and never drops below
/// `filtered + HYSTERESIS_DEG`.
pub const HYSTERESIS_DEG: i32 = 3;

#[derive(Clone, Copy, Debug, Default)]
pub struct HysteresisAnchor {
    effective: Option<i32>,
}

impl HysteresisAnchor {
    pub fn new() -> Self { Self { effective: None } }

    pub fn update(&mut self, filtered: i32) -> i32 {
        let next = match self.effective {
            None => filtered,
            Some(prev) if filtered >= prev => filtered,
            Some(prev) => (prev - 1).max(filtered + HYSTERESIS_DEG),
        };
        self.effective = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_initializes_directly() {
        let mut ewma = temperature_filter();
        assert_eq!(ewma.rounded(), -1);
        ewma.update(50.0);
        assert_eq!(ewma.rounded(), 50);
    }

    #[test]
    fn rising_uses_faster_alpha_than_falling() {
        let mut rising = temperature_filter();
        rising.update(50.0);
        let after_rise = rising.update(70.0);

        let mut falling = temperature_filter();
        falling.update(50.0);
        let after_fall = falling.update(30.0);

        assert!((after_rise - 50.0).abs() > (after_fall - 50.0).abs());
    }

    #[test]
    fn hysteresis_tracks_rises_immediately() {
        let mut anchor = HysteresisAnchor::new();
        assert_eq!(anchor.update(40), 40);
        assert_eq!(anchor.update(60), 60);
    }

    #[test]
    fn hysteresis_decays_slowly_on_fall() {
        let mut anchor = HysteresisAnchor::new();
        anchor.update(60);
        let next = anchor.update(40);
        assert_eq!(next, 59);
        assert!(next >= 40 + HYSTERESIS_DEG);
    }
}
