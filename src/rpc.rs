// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The D-Bus RPC object (spec §4.11): `com.uniwill.uccd` at
//! `/com/uniwill/uccd`. Getters are pure snapshot/settings reads; setters
//! that touch hardware dispatch through the shared device handle or the fan
//! worker, never blocking the bus dispatcher beyond that single await.

use crate::ble::WaterCoolerHandle;
use crate::charging;
use crate::cpu::CpuController;
use crate::fan::{CurveSource, FanWorker};
use crate::io::DeviceInterface;
use crate::keyboard::{KeyboardBacklight, ZoneState};
use crate::orchestrator::{PowerState, ProfileApplier};
use crate::profile::model::{FanPoint, PumpLevel};
use crate::profile::{Profile, ProfileStore};
use crate::settings::Settings;
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

const UCCD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything an RPC call or the daemon's power-state loop needs to touch.
/// One instance is shared (via `Arc`) between the zbus interface object and
/// the daemon's own driving loop.
pub struct RpcState {
    pub snapshot: Arc<Snapshot>,
    pub settings: Mutex<Settings>,
    pub store: Mutex<ProfileStore>,
    pub cpu: Arc<CpuController>,
    pub device: Arc<Mutex<Box<dyn DeviceInterface>>>,
    pub fan_worker: Arc<Mutex<FanWorker>>,
    pub keyboard: Arc<Mutex<KeyboardBacklight>>,
    pub water_cooler: WaterCoolerHandle,
    pub current_curve_source: StdMutex<CurveSource>,
    pub active_profile: Mutex<Profile>,
    pub power_state: StdMutex<PowerState>,
    pub sensor_collection_enabled: StdMutex<bool>,
    pub dgpu_d0_metrics_enabled: AtomicBool,
    pub reapply_pending: AtomicBool,
}

impl RpcState {
    fn config_dir() -> std::path::PathBuf { std::path::PathBuf::from(crate::settings::CONFIG_DIR) }

    fn persist_settings_blocking(settings: &Settings) {
        if let Err(why) = crate::settings::save(&Self::config_dir(), settings) {
            log::warn!("rpc: failed to persist settings: {}", why);
        }
    }

    /// Applies `profile` across every subsystem and publishes its JSON into
    /// the snapshot. Does not touch `settings.stateMap`; callers that need
    /// persistence do that themselves.
    pub async fn apply_profile_object(&self, profile: &Profile) {
        let mut keyboard = self.keyboard.lock().await;
        let device = self.device.lock().await;
        let mut applier = ProfileApplier { cpu: &self.cpu, io: device.as_ref(), keyboard: &mut keyboard };
        let curve_source = applier.apply(profile);
        drop(device);
        drop(keyboard);

        *self.current_curve_source.lock().unwrap() = curve_source;
        *self.active_profile.lock().await = profile.clone();

        if let Ok(json) = serde_json::to_string(profile) {
            self.snapshot.set_active_profile_json(json);
        }
    }

    async fn apply_profile_by_id(&self, id: &str) -> bool {
        let profile = match self.store.lock().await.get(id) {
            Some(profile) => profile.clone(),
            None => return false,
        };
        self.apply_profile_object(&profile).await;
        true
    }

    pub(crate) fn fan_control_enabled_blocking(settings: &Settings) -> bool { settings.fan_control_enabled }
}

pub struct Uccd(pub Arc<RpcState>);

#[zbus::interface(name = "com.uniwill.uccd")]
impl Uccd {
    // ---- Device/system ----------------------------------------------

    async fn get_device_name(&self) -> String { self.0.snapshot.device_name() }

    async fn get_display_modes_json(&self) -> String { self.0.snapshot.display_modes_json() }

    async fn get_is_x11(&self) -> bool { std::env::var("WAYLAND_DISPLAY").is_err() }

    async fn tuxedo_wmi_available(&self) -> bool {
        crate::sysfs::is_available("/sys/devices/platform/uniwill_wmi")
    }

    async fn fan_hwmon_available(&self) -> bool { self.0.snapshot.has_tdp() }

    async fn uccd_version(&self) -> String { UCCD_VERSION.to_owned() }

    async fn get_water_cooler_supported(&self) -> bool { self.0.snapshot.wc_available() }

    async fn get_ctgp_adjustment_supported(&self) -> bool {
        self.0.active_profile.lock().await.nvidia_power_ctrl_profile.c_tgp_offset.is_some()
    }

    // ---- Fans ----------------------------------------------------------

    async fn get_fan_data_cpu(&self) -> HashMap<String, HashMap<String, zbus::zvariant::Value<'static>>> {
        fan_record(self.0.snapshot.fans().first().copied())
    }

    async fn get_fan_data_gpu1(&self) -> HashMap<String, HashMap<String, zbus::zvariant::Value<'static>>> {
        fan_record(self.0.snapshot.fans().get(1).copied())
    }

    async fn get_fan_data_gpu2(&self) -> HashMap<String, HashMap<String, zbus::zvariant::Value<'static>>> {
        fan_record(self.0.snapshot.fans().get(2).copied())
    }

    async fn get_fans_min_speed(&self) -> u8 { self.0.device.lock().await.fans_min_speed().unwrap_or(0) }

    async fn get_fans_off_available(&self) -> bool { self.0.device.lock().await.fans_off_available().unwrap_or(false) }

    async fn set_fan_profile_cpu(&self, json: &str) -> bool { self.set_table_field(json, TableField::Cpu).await }

    async fn set_fan_profile_dgpu(&self, json: &str) -> bool { self.set_table_field(json, TableField::Gpu).await }

    async fn apply_fan_profiles(&self, json: &str) -> bool {
        let Ok(source) = serde_json::from_str::<CurveSource>(json) else { return false };
        self.0.fan_worker.lock().await.push_temporary_override(source);
        true
    }

    async fn revert_fan_profiles(&self) { self.0.fan_worker.lock().await.clear_temporary_override(); }

    async fn get_fan_profile(&self, name: &str) -> String {
        crate::profile::defaults::fan_preset_by_name(name)
            .and_then(|preset| serde_json::to_string(&preset.cpu).ok())
            .unwrap_or_else(|| "[]".to_owned())
    }

    async fn get_fan_profile_names(&self) -> Vec<String> {
        crate::profile::defaults::fan_presets().into_iter().map(|p| p.name.to_owned()).collect()
    }

    async fn set_fan_profile(&self, name: &str, json: &str) -> bool {
        let mut profile = self.0.active_profile.lock().await.clone();
        profile.fan.fan_profile = name.to_owned();
        if let Ok(points) = serde_json::from_str::<Vec<FanPoint>>(json) {
            profile.fan.table_cpu = points;
        }
        if !profile.is_valid() {
            return false;
        }
        self.0.apply_profile_object(&profile).await;
        true
    }

    // ---- Webcam / display -----------------------------------------------

    async fn webcam_sw_available(&self) -> bool { self.0.device.lock().await.webcam().is_ok() }

    async fn get_webcam_sw_status(&self) -> bool { self.0.snapshot.webcam_on() }

    async fn set_webcam(&self, on: bool) -> bool {
        let ok = self.0.device.lock().await.set_webcam(on).is_ok();
        if ok {
            self.0.snapshot.set_webcam_on(on);
        }
        ok
    }

    async fn get_display_brightness(&self) -> i32 {
        crate::autosave::load(&RpcState::config_dir()).display_brightness
    }

    async fn set_display_brightness(&self, value: i32) -> bool {
        let autosave = crate::autosave::Autosave { display_brightness: value.clamp(0, 100) };
        crate::autosave::save(&RpcState::config_dir(), autosave).is_ok()
    }

    async fn set_display_refresh_rate(&self, _display: &str, _hz: i32) -> bool { false }

    async fn get_force_yuv420_output_switch_available(&self) -> bool { false }

    // ---- GPU / CPU info --------------------------------------------------

    async fn get_d_gpu_info_values_json(&self) -> String { self.0.snapshot.gpu_info_json() }

    async fn get_i_gpu_info_values_json(&self) -> String { self.0.snapshot.cpu_power_json() }

    async fn get_cpu_power_values_json(&self) -> String { self.0.snapshot.cpu_power_json() }

    async fn get_cpu_frequency_limits_json(&self) -> String {
        #[derive(Serialize)]
        struct Limits { min: Option<i64>, max: Option<i64> }
        let limits = Limits { min: self.0.cpu.cpuinfo_min_freq(0), max: self.0.cpu.cpuinfo_max_freq(0) };
        serde_json::to_string(&limits).unwrap_or_else(|_| "{}".to_owned())
    }

    async fn get_available_governors(&self) -> Vec<String> { self.0.cpu.available_governors(0) }

    async fn get_prime_state(&self) -> String { self.0.snapshot.prime_state() }

    async fn consume_mode_reapply_pending(&self) -> bool { self.0.reapply_pending.swap(false, Ordering::SeqCst) }

    // ---- Profiles --------------------------------------------------------

    async fn get_active_profile_json(&self) -> String { self.0.snapshot.active_profile_json() }

    async fn get_power_state(&self) -> String { (*self.0.power_state.lock().unwrap()).as_str().to_owned() }

    async fn set_active_profile(
        &self,
        id: &str,
        #[zbus(signal_context)] context: zbus::SignalContext<'_>,
    ) -> bool {
        if !self.0.apply_profile_by_id(id).await {
            return false;
        }
        let state = *self.0.power_state.lock().unwrap();
        {
            let mut settings = self.0.settings.lock().await;
            settings.state_map.set(state, id.to_owned());
            RpcState::persist_settings_blocking(&settings);
        }
        let _ = Self::profile_changed(&context, id).await;
        true
    }

    async fn set_temp_profile_by_id(
        &self,
        id: &str,
        #[zbus(signal_context)] context: zbus::SignalContext<'_>,
    ) -> bool {
        if !self.0.apply_profile_by_id(id).await {
            return false;
        }
        let _ = Self::profile_changed(&context, id).await;
        true
    }

    async fn apply_profile(
        &self,
        json: &str,
        #[zbus(signal_context)] context: zbus::SignalContext<'_>,
    ) -> bool {
        let Ok(profile) = serde_json::from_str::<Profile>(json) else { return false };
        if !profile.is_valid() {
            return false;
        }
        let id = profile.id.clone();
        self.0.apply_profile_object(&profile).await;
        let _ = Self::profile_changed(&context, &id).await;
        true
    }

    async fn get_profiles_json(&self) -> String {
        let store = self.0.store.lock().await;
        serde_json::to_string(&store.all()).unwrap_or_else(|_| "[]".to_owned())
    }

    async fn get_custom_profiles_json(&self) -> String {
        let store = self.0.store.lock().await;
        serde_json::to_string(store.custom_profiles()).unwrap_or_else(|_| "{}".to_owned())
    }

    async fn get_default_profiles_json(&self) -> String {
        let store = self.0.store.lock().await;
        let builtins: Vec<&Profile> = store.all().into_iter().filter(|p| store.is_builtin(&p.id)).collect();
        serde_json::to_string(&builtins).unwrap_or_else(|_| "[]".to_owned())
    }

    async fn get_default_values_profile_json(&self) -> String {
        serde_json::to_string(&self.0.store.lock().await.default_template()).unwrap_or_else(|_| "{}".to_owned())
    }

    async fn add_custom_profile(&self, json: &str) -> String {
        let Ok(profile) = serde_json::from_str::<Profile>(json) else { return String::new() };
        let mut store = self.0.store.lock().await;
        let id = store.add_custom(profile).unwrap_or_default();
        if !id.is_empty() {
            self.persist_custom_profiles(&store).await;
        }
        id
    }

    async fn save_custom_profile(&self, json: &str) -> bool {
        let Ok(profile) = serde_json::from_str::<Profile>(json) else { return false };
        let mut store = self.0.store.lock().await;
        let ok = store.add_custom(profile).is_ok();
        if ok {
            self.persist_custom_profiles(&store).await;
        }
        ok
    }

    async fn update_custom_profile(&self, json: &str) -> bool {
        let Ok(profile) = serde_json::from_str::<Profile>(json) else { return false };
        let mut store = self.0.store.lock().await;
        let ok = store.update_custom(profile).is_ok();
        if ok {
            self.persist_custom_profiles(&store).await;
        }
        ok
    }

    async fn delete_custom_profile(&self, id: &str) -> bool {
        let mut store = self.0.store.lock().await;
        let ok = store.delete_custom(id).is_ok();
        if ok {
            let mut settings = self.0.settings.lock().await;
            settings.state_map.rewrite_references(id, crate::profile::defaults::CUSTOM_TEMPLATE_ID);
            self.persist_custom_profiles_locked(&store, &mut settings);
        }
        ok
    }

    // ---- Settings ----------------------------------------------------

    async fn get_settings_json(&self) -> String { self.0.snapshot.settings_json() }

    async fn set_state_map(&self, state: &str, profile_id: &str) -> bool {
        let Some(state) = parse_power_state(state) else { return false };
        let mut settings = self.0.settings.lock().await;
        settings.state_map.set(state, profile_id.to_owned());
        RpcState::persist_settings_blocking(&settings);
        if let Ok(json) = serde_json::to_string(&*settings) {
            self.0.snapshot.set_settings_json(json);
        }
        true
    }

    // ---- ODM / NVIDIA --------------------------------------------------

    async fn odm_profiles_available(&self) -> Vec<String> {
        self.0.device.lock().await.available_odm_performance_profiles().unwrap_or_default()
    }

    async fn odm_power_limits_json(&self) -> String { self.0.snapshot.odm_power_limits_json() }

    async fn get_nvidia_power_ctrl_default_power_limit(&self) -> i32 { 0 }

    async fn get_nvidia_power_ctrl_max_power_limit(&self) -> i32 { 0 }

    async fn get_nvidia_power_ctrl_available(&self) -> bool { self.0.snapshot.has_nvidia() }

    // ---- Keyboard --------------------------------------------------------

    async fn get_keyboard_backlight_capabilities_json(&self) -> String {
        serde_json::to_string(self.0.keyboard.lock().await.capabilities()).unwrap_or_else(|_| "{}".to_owned())
    }

    async fn get_keyboard_backlight_states_json(&self) -> String {
        serde_json::to_string(self.0.keyboard.lock().await.zones()).unwrap_or_else(|_| "[]".to_owned())
    }

    async fn set_keyboard_backlight_states_json(&self, json: &str) -> bool {
        let Ok(zones) = serde_json::from_str::<Vec<ZoneState>>(json) else { return false };
        self.0.keyboard.lock().await.apply(zones);
        let mut settings = self.0.settings.lock().await;
        settings.keyboard_backlight_states.insert("last".to_owned(), json.to_owned());
        RpcState::persist_settings_blocking(&settings);
        true
    }

    // ---- Charging --------------------------------------------------------

    async fn get_charging_profiles_available(&self) -> Vec<String> {
        charging::charging_profiles().into_iter().map(|p| p.id.to_owned()).collect()
    }

    async fn get_current_charging_profile(&self) -> String { charging::get_charging_profile().unwrap_or_default() }

    async fn set_charging_profile(&self, desc: &str) -> bool { charging::set_charging_profile(desc) }

    async fn get_charging_priorities_available(&self) -> Vec<String> {
        charging::charging_priorities().into_iter().map(str::to_owned).collect()
    }

    async fn get_current_charging_priority(&self) -> String { charging::get_charging_priority().unwrap_or_default() }

    async fn set_charging_priority(&self, desc: &str) -> bool { charging::set_charging_priority(desc) }

    async fn get_charge_start_available_thresholds(&self) -> Vec<u8> { (0..=95).step_by(5).collect() }

    async fn get_charge_end_available_thresholds(&self) -> Vec<u8> { (5..=100).step_by(5).collect() }

    async fn get_charge_start_threshold(&self) -> i32 { self.0.snapshot.charge_thresholds().0 }

    async fn get_charge_end_threshold(&self) -> i32 { self.0.snapshot.charge_thresholds().1 }

    async fn set_charge_start_threshold(&self, value: i32) -> bool {
        let ok = charging::set_start_threshold(value.clamp(0, 100) as u8).is_ok();
        if ok {
            if let Ok((start, end)) = charging::get_thresholds() {
                self.0.snapshot.set_charge_thresholds(start as i32, end as i32);
            }
        }
        ok
    }

    async fn set_charge_end_threshold(&self, value: i32) -> bool {
        let ok = charging::set_end_threshold(value.clamp(0, 100) as u8).is_ok();
        if ok {
            if let Ok((start, end)) = charging::get_thresholds() {
                self.0.snapshot.set_charge_thresholds(start as i32, end as i32);
            }
        }
        ok
    }

    async fn get_charge_type(&self) -> String { charging::get_charge_type().unwrap_or_default() }

    async fn set_charge_type(&self, t: &str) -> bool { charging::set_charge_type(t) }

    // ---- FnLock / sensors --------------------------------------------------

    async fn get_fn_lock_supported(&self) -> bool { crate::sysfs::is_available("/sys/devices/platform/uniwill_wmi/fn_lock") }

    async fn get_fn_lock_status(&self) -> bool { self.0.snapshot.fn_lock() }

    async fn set_fn_lock_status(&self, enabled: bool) -> bool {
        let ok = crate::sysfs::write("/sys/devices/platform/uniwill_wmi/fn_lock", if enabled { 1u8 } else { 0u8 });
        if ok {
            self.0.snapshot.set_fn_lock(enabled);
        }
        ok
    }

    async fn get_sensor_data_collection_status(&self) -> bool { *self.0.sensor_collection_enabled.lock().unwrap() }

    async fn set_sensor_data_collection_status(&self, enabled: bool) -> bool {
        *self.0.sensor_collection_enabled.lock().unwrap() = enabled;
        true
    }

    async fn set_d_gpu_d0_metrics(&self, enabled: bool) -> bool {
        self.0.dgpu_d0_metrics_enabled.store(enabled, Ordering::SeqCst);
        self.0.snapshot.has_nvidia()
    }

    // ---- Water cooler ------------------------------------------------------

    async fn get_water_cooler_available(&self) -> bool { self.0.snapshot.wc_available() }

    async fn get_water_cooler_connected(&self) -> bool { self.0.water_cooler.is_connected() }

    async fn get_water_cooler_fan_speed(&self) -> i32 { self.0.water_cooler.last_fan_speed().map(i32::from).unwrap_or(-1) }

    async fn get_water_cooler_pump_level(&self) -> i32 {
        self.0.water_cooler.last_pump_level().map(|level| level as i32).unwrap_or(-1)
    }

    async fn enable_water_cooler(&self, enabled: bool) -> bool {
        self.0.water_cooler.set_scanning_enabled(enabled).await;
        true
    }

    async fn set_water_cooler_fan_speed(&self, pct: i32) -> bool {
        if !(0..=100).contains(&pct) {
            return false;
        }
        self.0.water_cooler.set_fan_speed(Some(pct as u8)).await;
        true
    }

    async fn set_water_cooler_pump_voltage(&self, v: i32) -> bool {
        self.0.water_cooler.set_pump_voltage(Some(PumpLevel::from_raw(v))).await;
        true
    }

    async fn set_water_cooler_led_color(&self, r: u8, g: u8, b: u8, mode: &str) -> bool {
        self.0.water_cooler.set_rgb(Some((r, g, b, crate::ble::protocol::RgbMode::from_ui_mode(mode)))).await;
        true
    }

    async fn turn_off_water_cooler_led(&self) -> bool {
        self.0.water_cooler.set_rgb(None).await;
        true
    }

    async fn turn_off_water_cooler_fan(&self) -> bool {
        self.0.water_cooler.set_fan_speed(None).await;
        true
    }

    async fn turn_off_water_cooler_pump(&self) -> bool {
        self.0.water_cooler.set_pump_voltage(Some(PumpLevel::Off)).await;
        true
    }

    async fn is_water_cooler_auto_control_enabled(&self) -> bool {
        self.0.active_profile.lock().await.fan.auto_control_wc
    }

    // ---- Signals -----------------------------------------------------

    #[zbus(signal)]
    async fn profile_changed(context: &zbus::SignalContext<'_>, profile_id: &str) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn power_state_changed(context: &zbus::SignalContext<'_>, state: &str) -> zbus::Result<()>;
}

enum TableField {
    Cpu,
    Gpu,
}

impl Uccd {
    async fn set_table_field(&self, json: &str, field: TableField) -> bool {
        let Ok(points) = serde_json::from_str::<Vec<FanPoint>>(json) else { return false };
        let mut profile = self.0.active_profile.lock().await.clone();
        match field {
            TableField::Cpu => profile.fan.table_cpu = points,
            TableField::Gpu => profile.fan.table_gpu = points,
        }
        if !profile.is_valid() {
            return false;
        }
        self.0.apply_profile_object(&profile).await;
        true
    }

    async fn persist_custom_profiles(&self, store: &ProfileStore) {
        let mut settings = self.0.settings.lock().await;
        self.persist_custom_profiles_locked(store, &mut settings);
    }

    fn persist_custom_profiles_locked(&self, store: &ProfileStore, settings: &mut Settings) {
        settings.profiles = store.custom_profiles().clone();
        RpcState::persist_settings_blocking(settings);
    }
}

fn parse_power_state(raw: &str) -> Option<PowerState> {
    match raw {
        "power_ac" => Some(PowerState::Ac),
        "power_bat" => Some(PowerState::Battery),
        "power_wc" => Some(PowerState::WaterCooler),
        _ => None,
    }
}

fn fan_record(reading: Option<crate::snapshot::FanReading>) -> HashMap<String, HashMap<String, zbus::zvariant::Value<'static>>> {
    use zbus::zvariant::Value;

    let reading = reading.unwrap_or_default();
    let mut speed = HashMap::new();
    speed.insert("data".to_owned(), Value::from(i32::from(reading.speed_percent)));
    speed.insert("timestamp".to_owned(), Value::from(reading.timestamp_ms as i64));

    let mut temp = HashMap::new();
    temp.insert("data".to_owned(), Value::from(reading.temperature.unwrap_or(0)));
    let timestamp = if reading.temperature.is_some() { reading.timestamp_ms as i64 } else { 0 };
    temp.insert("timestamp".to_owned(), Value::from(timestamp));

    let mut out = HashMap::new();
    out.insert("speed".to_owned(), speed);
    out.insert("temp".to_owned(), temp);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_power_states() {
        assert_eq!(parse_power_state("power_ac"), Some(PowerState::Ac));
        assert_eq!(parse_power_state("power_wc"), Some(PowerState::WaterCooler));
        assert_eq!(parse_power_state("bogus"), None);
    }

    #[test]
    fn fan_record_marks_missing_temperature_with_zero_timestamp() {
        let record = fan_record(Some(crate::snapshot::FanReading { speed_percent: 40, temperature: None, timestamp_ms: 1234 }));
        let temp = &record["temp"];
        assert_eq!(temp["timestamp"], zbus::zvariant::Value::from(0i64));
    }
}
