// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The profile-apply orchestrator (spec §4.10). Owns nothing workers don't
//! also need directly; it resolves power state, decides which profile
//! applies, and drives every subsystem in sequence. Workers never call back
//! into it — they read the curve source it publishes and report state
//! through the snapshot, the orchestrator polls.

use crate::charging;
use crate::cpu::CpuController;
use crate::fan::CurveSource;
use crate::io::DeviceInterface;
use crate::keyboard::{KeyboardBacklight, ZoneState};
use crate::profile::Profile;
use std::time::{Duration, Instant};

pub const MAX_REAPPLY_ATTEMPTS: u32 = 3;
const WC_CONNECT_DEBOUNCE: Duration = Duration::from_secs(3);
const WC_DISCONNECT_DEBOUNCE: Duration = Duration::from_secs(10);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerState {
    Ac,
    Battery,
    WaterCooler,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ac => "power_ac",
            Self::Battery => "power_bat",
            Self::WaterCooler => "power_wc",
        }
    }
}

/// Event the orchestrator wants emitted as a D-Bus signal; the daemon's RPC
/// layer drains these and fires the actual signal (the orchestrator has no
/// zbus dependency of its own).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestratorEvent {
    ProfileChanged(String),
    PowerStateChanged(&'static str),
}

/// Debounces the raw water-cooler-connected signal: connect must hold for
/// [`WC_CONNECT_DEBOUNCE`], disconnect for [`WC_DISCONNECT_DEBOUNCE`],
/// before either is accepted.
#[derive(Debug)]
struct WcDebounce {
    accepted: bool,
    pending_since: Option<Instant>,
}

impl WcDebounce {
    fn new() -> Self { Self { accepted: false, pending_since: None } }

    fn update(&mut self, raw_connected: bool, now: Instant) -> bool {
        if raw_connected == self.accepted {
            self.pending_since = None;
            return self.accepted;
        }

        let since = *self.pending_since.get_or_insert(now);
        let required = if raw_connected { WC_CONNECT_DEBOUNCE } else { WC_DISCONNECT_DEBOUNCE };
        if now.duration_since(since) >= required {
            self.accepted = raw_connected;
            self.pending_since = None;
        }
        self.accepted
    }
}

/// The CPU worker's 10 s revalidation loop (spec §4.10 last paragraph):
/// gives up after [`MAX_REAPPLY_ATTEMPTS`] consecutive failed reapplies and
/// re-arms the moment a validation succeeds.
pub struct CpuReapplyLoop {
    consecutive_failures: u32,
    given_up: bool,
}

impl CpuReapplyLoop {
    pub fn new() -> Self { Self { consecutive_failures: 0, given_up: false } }

    /// Call once per 10 s tick with the live-sysfs-agrees result. Returns
    /// `true` if the caller should reapply the profile this tick.
    pub fn observe(&mut self, matches_expected: bool) -> bool {
        if matches_expected {
            self.consecutive_failures = 0;
            self.given_up = false;
            return false;
        }

        if self.given_up {
            return false;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_REAPPLY_ATTEMPTS {
            log::warn!("cpu: giving up reapply after {} consecutive validation failures", self.consecutive_failures);
            self.given_up = true;
            return true;
        }

        true
    }
}

impl Default for CpuReapplyLoop {
    fn default() -> Self { Self::new() }
}

/// Derives the current power state from raw inputs, applying the
/// water-cooler debounce. `mains_plugged` and `wc_raw_connected` are the
/// latest polled values; `wc_auto_control` is the active profile's
/// `autoControlWC` flag.
pub struct PowerStateResolver {
    debounce: WcDebounce,
}

impl PowerStateResolver {
    pub fn new() -> Self { Self { debounce: WcDebounce::new() } }

    pub fn resolve(&mut self, mains_plugged: bool, wc_raw_connected: bool, wc_auto_control: bool, now: Instant) -> PowerState {
        let wc_connected = self.debounce.update(wc_raw_connected && wc_auto_control, now);
        if wc_connected {
            PowerState::WaterCooler
        } else if mains_plugged {
            PowerState::Ac
        } else {
            PowerState::Battery
        }
    }
}

impl Default for PowerStateResolver {
    fn default() -> Self { Self::new() }
}

/// Applies one profile across every subsystem, in the order spec'd in
/// §4.10. Each step absorbs its own hardware failures (logged, not
/// propagated) so a single unsupported subsystem never blocks the rest.
pub struct ProfileApplier<'a> {
    pub cpu: &'a CpuController,
    pub io: &'a dyn DeviceInterface,
    pub keyboard: &'a mut KeyboardBacklight,
}

impl<'a> ProfileApplier<'a> {
    /// Returns the [`CurveSource`] the fan worker should pick up on its next
    /// tick (step 2 of §4.10); the fan worker itself is not touched here.
    pub fn apply(&mut self, profile: &Profile) -> CurveSource {
        self.apply_cpu(profile);
        let curve_source = Self::curve_source_for(profile);
        self.apply_odm(profile);
        self.apply_webcam(profile);
        self.apply_charging(profile);
        self.apply_keyboard(profile);
        curve_source
    }

    /// Applies only the CPU half of a profile; exposed separately so the
    /// 10 s validator can reapply without touching fans/ODM/keyboard.
    pub fn apply_cpu(&self, profile: &Profile) {
        self.cpu.set_governor(&profile.cpu.governor);
        if !profile.cpu.energy_performance_preference.is_empty() {
            self.cpu.set_energy_performance_preference(&profile.cpu.energy_performance_preference);
        }
        if let Some(min) = profile.cpu.scaling_min_frequency {
            self.cpu.set_scaling_min_frequency(min);
        }
        if let Some(max) = profile.cpu.scaling_max_frequency {
            self.cpu.set_scaling_max_frequency(max);
        }
        if let Some(online) = profile.cpu.online_cores {
            self.cpu.use_cores(online as usize);
        }
        self.cpu.set_no_turbo(profile.cpu.no_turbo);
    }

    fn curve_source_for(profile: &Profile) -> CurveSource {
        CurveSource {
            fan_profile: profile.fan.fan_profile.clone(),
            same_speed: profile.fan.same_speed,
            offset_fanspeed: profile.fan.offset_fanspeed,
            table_cpu: profile.fan.table_cpu.clone(),
            table_gpu: profile.fan.table_gpu.clone(),
            table_pump: profile.fan.table_pump.clone(),
            table_water_cooler_fan: profile.fan.table_water_cooler_fan.clone(),
        }
    }

    fn apply_odm(&self, profile: &Profile) {
        if let Some(name) = &profile.odm_profile.name {
            if let Err(why) = self.io.set_odm_performance_profile(name) {
                log::debug!("orchestrator: setODMPerformanceProfile({}) failed: {}", name, why);
            }
        }
        for (index, &watts) in profile.odm_power_limits.tdp_values.iter().enumerate() {
            if let Err(why) = self.io.set_tdp(index as u8, watts) {
                log::debug!("orchestrator: setTdp({}, {}) failed: {}", index, watts, why);
            }
        }
    }

    fn apply_webcam(&self, profile: &Profile) {
        if profile.webcam.use_status {
            if let Err(why) = self.io.set_webcam(profile.webcam.status) {
                log::debug!("orchestrator: setWebcam failed: {}", why);
            }
        }
    }

    fn apply_charging(&self, profile: &Profile) {
        if !profile.charging_profile.is_empty() {
            charging::set_charging_profile(&profile.charging_profile);
        }
        if !profile.charging_priority.is_empty() {
            charging::set_charging_priority(&profile.charging_priority);
        }
        if !profile.charge_type.is_empty() {
            charging::set_charge_type(&profile.charge_type);
        }
        if profile.charge_start_threshold >= 0 && profile.charge_end_threshold >= 0 {
            let _ = charging::set_thresholds(profile.charge_start_threshold as u8, profile.charge_end_threshold as u8);
        }
    }

    fn apply_keyboard(&mut self, profile: &Profile) {
        if profile.keyboard.keyboard_profile_name.is_empty() {
            return;
        }
        if let Ok(zones) = serde_json::from_str::<Vec<ZoneState>>(&profile.keyboard.keyboard_profile_data) {
            self.keyboard.apply(zones);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wc_connect_requires_debounce_hold() {
        let mut debounce = WcDebounce::new();
        let t0 = Instant::now();
        assert!(!debounce.update(true, t0));
        assert!(!debounce.update(true, t0 + Duration::from_millis(500)));
        assert!(debounce.update(true, t0 + WC_CONNECT_DEBOUNCE + Duration::from_millis(1)));
    }

    #[test]
    fn wc_disconnect_requires_longer_debounce_hold() {
        let mut debounce = WcDebounce::new();
        let t0 = Instant::now();
        debounce.update(true, t0);
        debounce.update(true, t0 + WC_CONNECT_DEBOUNCE + Duration::from_millis(1));
        assert!(debounce.accepted);

        assert!(debounce.update(false, t0 + WC_CONNECT_DEBOUNCE + Duration::from_secs(5)));
        assert!(!debounce.update(false, t0 + WC_CONNECT_DEBOUNCE + WC_DISCONNECT_DEBOUNCE + Duration::from_millis(1)));
    }

    #[test]
    fn power_state_prefers_water_cooler_then_ac_then_battery() {
        let mut resolver = PowerStateResolver::new();
        let t0 = Instant::now();
        assert_eq!(resolver.resolve(true, false, true, t0), PowerState::Ac);
        assert_eq!(resolver.resolve(false, false, true, t0), PowerState::Battery);
    }

    #[test]
    fn cpu_reapply_gives_up_after_three_failures() {
        let mut loop_ = CpuReapplyLoop::new();
        assert!(loop_.observe(false));
        assert!(loop_.observe(false));
        assert!(loop_.observe(false));
        assert!(!loop_.observe(false));
        assert!(loop_.observe(true) == false);
    }
}
