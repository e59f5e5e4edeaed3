// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The settings file (spec §3.2): `/etc/ucc/settings`, with a
//! backup-before-overwrite / corrupted-snapshot-on-parse-failure recovery
//! scheme.

use crate::profile::Profile;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "/etc/ucc";
const SETTINGS_FILE: &str = "settings";
const BACKUP_FILE: &str = "settings.backup";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to create {0:?}: {1}")]
    CreateDir(PathBuf, io::Error),
    #[error("failed to read {0:?}: {1}")]
    Read(PathBuf, io::Error),
    #[error("failed to write {0:?}: {1}")]
    Write(PathBuf, io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStateMap {
    #[serde(default)]
    pub power_ac: Option<String>,
    #[serde(default)]
    pub power_bat: Option<String>,
    #[serde(default)]
    pub power_wc: Option<String>,
}

impl PowerStateMap {
    pub fn get(&self, state: crate::orchestrator::PowerState) -> Option<&str> {
        use crate::orchestrator::PowerState;
        match state {
            PowerState::Ac => self.power_ac.as_deref(),
            PowerState::Battery => self.power_bat.as_deref(),
            PowerState::WaterCooler => self.power_wc.as_deref(),
        }
    }

    pub fn set(&mut self, state: crate::orchestrator::PowerState, profile_id: String) {
        use crate::orchestrator::PowerState;
        match state {
            PowerState::Ac => self.power_ac = Some(profile_id),
            PowerState::Battery => self.power_bat = Some(profile_id),
            PowerState::WaterCooler => self.power_wc = Some(profile_id),
        }
    }

    /// Rewrites any reference to `from` to `to` (used when a custom profile
    /// named in the map is deleted).
    pub fn rewrite_references(&mut self, from: &str, to: &str) {
        for slot in [&mut self.power_ac, &mut self.power_bat, &mut self.power_wc] {
            if slot.as_deref() == Some(from) {
                *slot = Some(to.to_owned());
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YcbcrPort {
    pub port: i32,
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YcbcrWorkaround {
    pub card: i32,
    pub ports: Vec<YcbcrPort>,
}

fn default_true() -> bool { true }

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub fahrenheit: bool,
    #[serde(default)]
    pub state_map: PowerStateMap,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub shutdown_time: Option<String>,
    #[serde(default = "default_true")]
    pub cpu_settings_enabled: bool,
    #[serde(default = "default_true")]
    pub fan_control_enabled: bool,
    #[serde(default = "default_true")]
    pub keyboard_backlight_control_enabled: bool,
    #[serde(default)]
    pub ycbcr420_workaround: Vec<YcbcrWorkaround>,
    #[serde(default)]
    pub charging_profile: Option<String>,
    #[serde(default)]
    pub charging_priority: Option<String>,
    #[serde(default)]
    pub keyboard_backlight_states: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fahrenheit: false,
            state_map: PowerStateMap::default(),
            profiles: BTreeMap::new(),
            shutdown_time: None,
            cpu_settings_enabled: true,
            fan_control_enabled: true,
            keyboard_backlight_control_enabled: true,
            ycbcr420_workaround: Vec::new(),
            charging_profile: None,
            charging_priority: None,
            keyboard_backlight_states: BTreeMap::new(),
        }
    }
}

/// Creates `/etc/ucc` (mode 0755) if absent. Called once at daemon start.
pub fn ensure_config_dir(dir: &Path) -> Result<(), SettingsError> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| SettingsError::CreateDir(dir.to_owned(), e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o755);
        let _ = fs::set_permissions(dir, perms);
    }
    Ok(())
}

/// Reads the settings file, falling back to `settings.backup` on parse
/// failure. A corrupted primary is snapshotted to
/// `settings.corrupted_<timestamp>` before the backup is adopted.
pub fn load(dir: &Path) -> Result<Settings, SettingsError> {
    let primary = dir.join(SETTINGS_FILE);
    let backup = dir.join(BACKUP_FILE);

    match read_settings(&primary) {
        Ok(settings) => Ok(settings),
        Err(SettingsError::Read(..)) => Ok(Settings::default()),
        Err(parse_err) => {
            log::warn!("settings file corrupted, attempting recovery from backup: {}", parse_err);
            let snapshot = dir.join(format!("settings.corrupted_{}", Local::now().format("%Y%m%d_%H%M%S")));
            if let Err(e) = fs::copy(&primary, &snapshot) {
                log::warn!("failed to snapshot corrupted settings to {:?}: {}", snapshot, e);
            }
            read_settings(&backup)
        }
    }
}

fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|e| SettingsError::Read(path.to_owned(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Writes the settings file, first copying the existing primary to
/// `settings.backup`.
pub fn save(dir: &Path, settings: &Settings) -> Result<(), SettingsError> {
    ensure_config_dir(dir)?;
    let primary = dir.join(SETTINGS_FILE);
    let backup = dir.join(BACKUP_FILE);

    if primary.exists() {
        if let Err(e) = fs::copy(&primary, &backup) {
            log::warn!("failed to back up settings to {:?}: {}", backup, e);
        }
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&primary, json).map_err(|e| SettingsError::Write(primary.clone(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("uccd-settings-test-{}-{}", process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = scratch_dir("roundtrip");
        let mut settings = Settings::default();
        settings.fahrenheit = true;
        settings.state_map.set(crate::orchestrator::PowerState::Ac, "custom-1".into());

        save(&dir, &settings).unwrap();
        let reloaded = load(&dir).unwrap();
        assert_eq!(reloaded.fahrenheit, true);
        assert_eq!(reloaded.state_map.power_ac.as_deref(), Some("custom-1"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupted_primary_falls_back_to_backup() {
        let dir = scratch_dir("corrupt");
        let settings = Settings::default();
        save(&dir, &settings).unwrap();
        save(&dir, &settings).unwrap(); // now settings.backup exists too

        fs::write(dir.join(SETTINGS_FILE), b"{ not json").unwrap();
        let reloaded = load(&dir).unwrap();
        assert_eq!(reloaded.cpu_settings_enabled, true);

        let has_snapshot = fs::read_dir(&dir).unwrap().any(|e| e.unwrap().file_name().to_string_lossy().starts_with("settings.corrupted_"));
        assert!(has_snapshot);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = scratch_dir("missing");
        let settings = load(&dir).unwrap();
        assert!(settings.profiles.is_empty());
    }
}
