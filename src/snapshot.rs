// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The runtime snapshot (spec §3.4): the single mutex-protected struct every
//! worker publishes into and every RPC getter reads from. Scalars live in
//! atomics so a hot RPC read never blocks on a worker mid-tick.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

/// One fan's last-published reading.
#[derive(Clone, Copy, Debug, Default)]
pub struct FanReading {
    pub speed_percent: u8,
    pub temperature: Option<i32>,
    pub timestamp_ms: u64,
}

#[derive(Default)]
struct SnapshotInner {
    device_name: String,
    display_modes_json: String,
    fans: Vec<FanReading>,
    gpu_info_json: String,
    cpu_power_json: String,
    prime_state: String,
    active_profile_json: String,
    profiles_json: String,
    settings_json: String,
    odm_power_limits_json: String,
}

/// Scalars read far more often than they're written; keep them outside the
/// mutex.
#[derive(Default)]
struct SnapshotAtomics {
    webcam_on: AtomicBool,
    charging_start_threshold: AtomicI64,
    charging_end_threshold: AtomicI64,
    fn_lock: AtomicBool,
    wc_available: AtomicBool,
    wc_connected: AtomicBool,
    wc_scanning_enabled: AtomicBool,
    has_nvidia: AtomicBool,
    has_tdp: AtomicBool,
    last_update_ms: AtomicU64,
}

pub struct Snapshot {
    inner: Mutex<SnapshotInner>,
    atomics: SnapshotAtomics,
}

impl Snapshot {
    pub fn new() -> Self {
        Self { inner: Mutex::new(SnapshotInner::default()), atomics: SnapshotAtomics::default() }
    }

    pub fn set_device_name(&self, name: String) { self.inner.lock().unwrap().device_name = name; }

    pub fn device_name(&self) -> String { self.inner.lock().unwrap().device_name.clone() }

    pub fn set_display_modes_json(&self, json: String) { self.inner.lock().unwrap().display_modes_json = json; }

    pub fn display_modes_json(&self) -> String { self.inner.lock().unwrap().display_modes_json.clone() }

    pub fn set_fans(&self, fans: Vec<FanReading>) { self.inner.lock().unwrap().fans = fans; }

    pub fn fans(&self) -> Vec<FanReading> { self.inner.lock().unwrap().fans.clone() }

    pub fn set_gpu_info_json(&self, json: String) { self.inner.lock().unwrap().gpu_info_json = json; }

    pub fn gpu_info_json(&self) -> String { self.inner.lock().unwrap().gpu_info_json.clone() }

    pub fn set_cpu_power_json(&self, json: String) { self.inner.lock().unwrap().cpu_power_json = json; }

    pub fn cpu_power_json(&self) -> String { self.inner.lock().unwrap().cpu_power_json.clone() }

    pub fn set_prime_state(&self, state: String) { self.inner.lock().unwrap().prime_state = state; }

    pub fn prime_state(&self) -> String { self.inner.lock().unwrap().prime_state.clone() }

    pub fn set_active_profile_json(&self, json: String) { self.inner.lock().unwrap().active_profile_json = json; }

    pub fn active_profile_json(&self) -> String { self.inner.lock().unwrap().active_profile_json.clone() }

    pub fn set_profiles_json(&self, json: String) { self.inner.lock().unwrap().profiles_json = json; }

    pub fn profiles_json(&self) -> String { self.inner.lock().unwrap().profiles_json.clone() }

    pub fn set_settings_json(&self, json: String) { self.inner.lock().unwrap().settings_json = json; }

    pub fn settings_json(&self) -> String { self.inner.lock().unwrap().settings_json.clone() }

    pub fn set_odm_power_limits_json(&self, json: String) { self.inner.lock().unwrap().odm_power_limits_json = json; }

    pub fn odm_power_limits_json(&self) -> String { self.inner.lock().unwrap().odm_power_limits_json.clone() }

    pub fn set_webcam_on(&self, on: bool) { self.atomics.webcam_on.store(on, Ordering::Relaxed); }

    pub fn webcam_on(&self) -> bool { self.atomics.webcam_on.load(Ordering::Relaxed) }

    pub fn set_charge_thresholds(&self, start: i32, end: i32) {
        self.atomics.charging_start_threshold.store(start as i64, Ordering::Relaxed);
        self.atomics.charging_end_threshold.store(end as i64, Ordering::Relaxed);
    }

    pub fn charge_thresholds(&self) -> (i32, i32) {
        (
            self.atomics.charging_start_threshold.load(Ordering::Relaxed) as i32,
            self.atomics.charging_end_threshold.load(Ordering::Relaxed) as i32,
        )
    }

    pub fn set_fn_lock(&self, on: bool) { self.atomics.fn_lock.store(on, Ordering::Relaxed); }

    pub fn fn_lock(&self) -> bool { self.atomics.fn_lock.load(Ordering::Relaxed) }

    pub fn set_wc_available(&self, available: bool) { self.atomics.wc_available.store(available, Ordering::Relaxed); }

    pub fn wc_available(&self) -> bool { self.atomics.wc_available.load(Ordering::Relaxed) }

    pub fn set_wc_connected(&self, connected: bool) { self.atomics.wc_connected.store(connected, Ordering::Relaxed); }

    pub fn wc_connected(&self) -> bool { self.atomics.wc_connected.load(Ordering::Relaxed) }

    pub fn set_wc_scanning_enabled(&self, enabled: bool) { self.atomics.wc_scanning_enabled.store(enabled, Ordering::Relaxed); }

    pub fn wc_scanning_enabled(&self) -> bool { self.atomics.wc_scanning_enabled.load(Ordering::Relaxed) }

    pub fn set_has_nvidia(&self, has: bool) { self.atomics.has_nvidia.store(has, Ordering::Relaxed); }

    pub fn has_nvidia(&self) -> bool { self.atomics.has_nvidia.load(Ordering::Relaxed) }

    pub fn set_has_tdp(&self, has: bool) { self.atomics.has_tdp.store(has, Ordering::Relaxed); }

    pub fn has_tdp(&self) -> bool { self.atomics.has_tdp.load(Ordering::Relaxed) }

    pub fn touch(&self, now_ms: u64) { self.atomics.last_update_ms.store(now_ms, Ordering::Relaxed); }

    pub fn last_update_ms(&self) -> u64 { self.atomics.last_update_ms.load(Ordering::Relaxed) }
}

impl Default for Snapshot {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip_is_lock_free() {
        let snap = Snapshot::new();
        snap.set_webcam_on(true);
        snap.set_charge_thresholds(20, 80);
        snap.set_wc_connected(true);
        assert!(snap.webcam_on());
        assert_eq!(snap.charge_thresholds(), (20, 80));
        assert!(snap.wc_connected());
    }

    #[test]
    fn fan_readings_round_trip() {
        let snap = Snapshot::new();
        snap.set_fans(vec![FanReading { speed_percent: 50, temperature: Some(60), timestamp_ms: 1000 }]);
        let fans = snap.fans();
        assert_eq!(fans.len(), 1);
        assert_eq!(fans[0].speed_percent, 50);
    }
}
