// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Client-side proxy for `com.uniwill.uccd` (spec §4.11, §6.1). A thin,
//! typed mirror of the interface served by `uccd`'s `rpc` module; GUIs and
//! other clients depend on this crate instead of hand-rolling D-Bus calls.

use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

#[zbus::proxy(
    interface = "com.uniwill.uccd",
    default_service = "com.uniwill.uccd",
    default_path = "/com/uniwill/uccd"
)]
trait Uccd {
    // ---- Device/system ----------------------------------------------

    fn get_device_name(&self) -> zbus::Result<String>;

    fn get_display_modes_json(&self) -> zbus::Result<String>;

    fn get_is_x11(&self) -> zbus::Result<bool>;

    fn tuxedo_wmi_available(&self) -> zbus::Result<bool>;

    fn fan_hwmon_available(&self) -> zbus::Result<bool>;

    fn uccd_version(&self) -> zbus::Result<String>;

    fn get_water_cooler_supported(&self) -> zbus::Result<bool>;

    fn get_ctgp_adjustment_supported(&self) -> zbus::Result<bool>;

    // ---- Fans ----------------------------------------------------------

    fn get_fan_data_cpu(&self) -> zbus::Result<HashMap<String, HashMap<String, OwnedValue>>>;

    fn get_fan_data_gpu1(&self) -> zbus::Result<HashMap<String, HashMap<String, OwnedValue>>>;

    fn get_fan_data_gpu2(&self) -> zbus::Result<HashMap<String, HashMap<String, OwnedValue>>>;

    fn get_fans_min_speed(&self) -> zbus::Result<u8>;

    fn get_fans_off_available(&self) -> zbus::Result<bool>;

    fn set_fan_profile_cpu(&self, json: &str) -> zbus::Result<bool>;

    fn set_fan_profile_dgpu(&self, json: &str) -> zbus::Result<bool>;

    fn apply_fan_profiles(&self, json: &str) -> zbus::Result<bool>;

    fn revert_fan_profiles(&self) -> zbus::Result<()>;

    fn get_fan_profile(&self, name: &str) -> zbus::Result<String>;

    fn get_fan_profile_names(&self) -> zbus::Result<Vec<String>>;

    fn set_fan_profile(&self, name: &str, json: &str) -> zbus::Result<bool>;

    // ---- Webcam / display -----------------------------------------------

    fn webcam_sw_available(&self) -> zbus::Result<bool>;

    fn get_webcam_sw_status(&self) -> zbus::Result<bool>;

    fn set_webcam(&self, on: bool) -> zbus::Result<bool>;

    fn get_display_brightness(&self) -> zbus::Result<i32>;

    fn set_display_brightness(&self, value: i32) -> zbus::Result<bool>;

    fn set_display_refresh_rate(&self, display: &str, hz: i32) -> zbus::Result<bool>;

    fn get_force_yuv420_output_switch_available(&self) -> zbus::Result<bool>;

    // ---- GPU / CPU info --------------------------------------------------

    fn get_d_gpu_info_values_json(&self) -> zbus::Result<String>;

    fn get_i_gpu_info_values_json(&self) -> zbus::Result<String>;

    fn get_cpu_power_values_json(&self) -> zbus::Result<String>;

    fn get_cpu_frequency_limits_json(&self) -> zbus::Result<String>;

    fn get_available_governors(&self) -> zbus::Result<Vec<String>>;

    fn get_prime_state(&self) -> zbus::Result<String>;

    fn consume_mode_reapply_pending(&self) -> zbus::Result<bool>;

    // ---- Profiles --------------------------------------------------------

    fn get_active_profile_json(&self) -> zbus::Result<String>;

    fn get_power_state(&self) -> zbus::Result<String>;

    fn set_active_profile(&self, id: &str) -> zbus::Result<bool>;

    fn set_temp_profile_by_id(&self, id: &str) -> zbus::Result<bool>;

    fn apply_profile(&self, json: &str) -> zbus::Result<bool>;

    fn get_profiles_json(&self) -> zbus::Result<String>;

    fn get_custom_profiles_json(&self) -> zbus::Result<String>;

    fn get_default_profiles_json(&self) -> zbus::Result<String>;

    fn get_default_values_profile_json(&self) -> zbus::Result<String>;

    fn add_custom_profile(&self, json: &str) -> zbus::Result<String>;

    fn save_custom_profile(&self, json: &str) -> zbus::Result<bool>;

    fn update_custom_profile(&self, json: &str) -> zbus::Result<bool>;

    fn delete_custom_profile(&self, id: &str) -> zbus::Result<bool>;

    // ---- Settings ----------------------------------------------------

    fn get_settings_json(&self) -> zbus::Result<String>;

    fn set_state_map(&self, state: &str, profile_id: &str) -> zbus::Result<bool>;

    // ---- ODM / NVIDIA --------------------------------------------------

    fn odm_profiles_available(&self) -> zbus::Result<Vec<String>>;

    fn odm_power_limits_json(&self) -> zbus::Result<String>;

    fn get_nvidia_power_ctrl_default_power_limit(&self) -> zbus::Result<i32>;

    fn get_nvidia_power_ctrl_max_power_limit(&self) -> zbus::Result<i32>;

    fn get_nvidia_power_ctrl_available(&self) -> zbus::Result<bool>;

    // ---- Keyboard --------------------------------------------------------

    fn get_keyboard_backlight_capabilities_json(&self) -> zbus::Result<String>;

    fn get_keyboard_backlight_states_json(&self) -> zbus::Result<String>;

    fn set_keyboard_backlight_states_json(&self, json: &str) -> zbus::Result<bool>;

    // ---- Charging --------------------------------------------------------

    fn get_charging_profiles_available(&self) -> zbus::Result<Vec<String>>;

    fn get_current_charging_profile(&self) -> zbus::Result<String>;

    fn set_charging_profile(&self, desc: &str) -> zbus::Result<bool>;

    fn get_charging_priorities_available(&self) -> zbus::Result<Vec<String>>;

    fn get_current_charging_priority(&self) -> zbus::Result<String>;

    fn set_charging_priority(&self, desc: &str) -> zbus::Result<bool>;

    fn get_charge_start_available_thresholds(&self) -> zbus::Result<Vec<u8>>;

    fn get_charge_end_available_thresholds(&self) -> zbus::Result<Vec<u8>>;

    fn get_charge_start_threshold(&self) -> zbus::Result<i32>;

    fn get_charge_end_threshold(&self) -> zbus::Result<i32>;

    fn set_charge_start_threshold(&self, value: i32) -> zbus::Result<bool>;

    fn set_charge_end_threshold(&self, value: i32) -> zbus::Result<bool>;

    fn get_charge_type(&self) -> zbus::Result<String>;

    fn set_charge_type(&self, t: &str) -> zbus::Result<bool>;

    // ---- FnLock / sensors --------------------------------------------------

    fn get_fn_lock_supported(&self) -> zbus::Result<bool>;

    fn get_fn_lock_status(&self) -> zbus::Result<bool>;

    fn set_fn_lock_status(&self, enabled: bool) -> zbus::Result<bool>;

    fn get_sensor_data_collection_status(&self) -> zbus::Result<bool>;

    fn set_sensor_data_collection_status(&self, enabled: bool) -> zbus::Result<bool>;

    fn set_d_gpu_d0_metrics(&self, enabled: bool) -> zbus::Result<bool>;

    // ---- Water cooler ------------------------------------------------------

    fn get_water_cooler_available(&self) -> zbus::Result<bool>;

    fn get_water_cooler_connected(&self) -> zbus::Result<bool>;

    fn get_water_cooler_fan_speed(&self) -> zbus::Result<i32>;

    fn get_water_cooler_pump_level(&self) -> zbus::Result<i32>;

    fn enable_water_cooler(&self, enabled: bool) -> zbus::Result<bool>;

    fn set_water_cooler_fan_speed(&self, pct: i32) -> zbus::Result<bool>;

    fn set_water_cooler_pump_voltage(&self, v: i32) -> zbus::Result<bool>;

    fn set_water_cooler_led_color(&self, r: u8, g: u8, b: u8, mode: &str) -> zbus::Result<bool>;

    fn turn_off_water_cooler_led(&self) -> zbus::Result<bool>;

    fn turn_off_water_cooler_fan(&self) -> zbus::Result<bool>;

    fn turn_off_water_cooler_pump(&self) -> zbus::Result<bool>;

    fn is_water_cooler_auto_control_enabled(&self) -> zbus::Result<bool>;

    // ---- Signals -----------------------------------------------------

    #[zbus(signal)]
    fn profile_changed(&self, profile_id: &str) -> zbus::Result<()>;

    #[zbus(signal)]
    fn power_state_changed(&self, state: &str) -> zbus::Result<()>;
}
