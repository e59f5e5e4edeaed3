// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! In-memory + on-disk catalog of profiles (spec §4.4): built-ins are never
//! persisted, custom profiles live in the settings file's `profiles` map.

use crate::profile::defaults::{self, CUSTOM_TEMPLATE_ID};
use crate::profile::model::Profile;
use rand::Rng;
use std::collections::BTreeMap;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const CUSTOM_ID_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile id already exists")]
    IdCollision,
    #[error("no such profile")]
    NotFound,
    #[error("cannot modify a built-in profile")]
    BuiltIn,
    #[error("profile failed validation")]
    Invalid,
}

/// Holds the device-keyed (or legacy) built-in catalog plus the custom
/// profiles loaded from the settings file.
pub struct ProfileStore {
    builtins: Vec<Profile>,
    custom: BTreeMap<String, Profile>,
}

fn random_custom_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CUSTOM_ID_LEN).map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char).collect();
    format!("custom-{}", suffix)
}

impl ProfileStore {
    /// `device_id` is the model string used to key the device-specific
    /// catalog; devices without an entry fall back to the legacy 3.
    pub fn new(device_id: &str, custom: BTreeMap<String, Profile>) -> Self {
        let builtins = defaults::device_profiles(device_id);
        let builtins = if builtins.is_empty() { defaults::legacy_profiles() } else { builtins };
        Self { builtins, custom }
    }

    pub fn custom_profiles(&self) -> &BTreeMap<String, Profile> { &self.custom }

    pub fn is_builtin(&self, id: &str) -> bool { self.builtins.iter().any(|p| p.id == id) }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.builtins.iter().find(|p| p.id == id).or_else(|| self.custom.get(id))
    }

    pub fn all(&self) -> Vec<&Profile> { self.builtins.iter().chain(self.custom.values()).collect() }

    pub fn default_template(&self) -> Profile { defaults::custom_template() }

    /// Assigns a fresh random id if `profile.id` is empty, fills any
    /// zero-valued field from the default template, then inserts. Fails if
    /// the (possibly caller-supplied) id collides with an existing profile.
    pub fn add_custom(&mut self, mut profile: Profile) -> Result<String, StoreError> {
        if profile.id.is_empty() {
            loop {
                let candidate = random_custom_id();
                if self.get(&candidate).is_none() {
                    profile.id = candidate;
                    break;
                }
            }
        } else if self.get(&profile.id).is_some() {
            return Err(StoreError::IdCollision);
        }

        profile.fill_from_default(&self.default_template());
        if !profile.is_valid() {
            return Err(StoreError::Invalid);
        }

        let id = profile.id.clone();
        self.custom.insert(id.clone(), profile);
        Ok(id)
    }

    pub fn update_custom(&mut self, profile: Profile) -> Result<(), StoreError> {
        if self.is_builtin(&profile.id) {
            return Err(StoreError::BuiltIn);
        }
        if !self.custom.contains_key(&profile.id) {
            return Err(StoreError::NotFound);
        }
        if !profile.is_valid() {
            return Err(StoreError::Invalid);
        }
        self.custom.insert(profile.id.clone(), profile);
        Ok(())
    }

    /// Removes a custom profile. Callers are responsible for rewriting any
    /// `stateMap` entry that referenced `id` to [`CUSTOM_TEMPLATE_ID`]
    /// before committing the delete (the store itself holds no state map).
    pub fn delete_custom(&mut self, id: &str) -> Result<(), StoreError> {
        if self.is_builtin(id) {
            return Err(StoreError::BuiltIn);
        }
        self.custom.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::model::{CpuSettings, DisplaySettings, FanSettings, KeyboardSettings, NvidiaPowerCtrlProfile, OdmPowerLimits, OdmProfile, WebcamSettings};

    fn blank_profile(id: &str) -> Profile {
        Profile {
            id: id.to_owned(),
            name: "Mine".to_owned(),
            description: String::new(),
            display: DisplaySettings::default(),
            cpu: CpuSettings::default(),
            webcam: WebcamSettings::default(),
            fan: FanSettings::default(),
            odm_profile: OdmProfile::default(),
            odm_power_limits: OdmPowerLimits::default(),
            nvidia_power_ctrl_profile: NvidiaPowerCtrlProfile::default(),
            charging_profile: String::new(),
            charging_priority: String::new(),
            charge_type: String::new(),
            charge_start_threshold: -1,
            charge_end_threshold: -1,
            keyboard: KeyboardSettings::default(),
        }
    }

    #[test]
    fn add_custom_assigns_random_id_when_missing() {
        let mut store = ProfileStore::new("unknown-device", BTreeMap::new());
        let id = store.add_custom(blank_profile("")).unwrap();
        assert!(id.starts_with("custom-"));
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn add_custom_rejects_id_collision() {
        let mut store = ProfileStore::new("unknown-device", BTreeMap::new());
        let builtin_id = store.builtins[0].id.clone();
        assert!(matches!(store.add_custom(blank_profile(&builtin_id)), Err(StoreError::IdCollision)));
    }

    #[test]
    fn update_and_delete_refuse_builtins() {
        let mut store = ProfileStore::new("unknown-device", BTreeMap::new());
        let builtin_id = store.builtins[0].id.clone();
        assert!(matches!(store.update_custom(blank_profile(&builtin_id)), Err(StoreError::BuiltIn)));
        assert!(matches!(store.delete_custom(&builtin_id), Err(StoreError::BuiltIn)));
    }

    #[test]
    fn delete_removes_custom_profile() {
        let mut store = ProfileStore::new("unknown-device", BTreeMap::new());
        let id = store.add_custom(blank_profile("custom-abc")).unwrap();
        store.delete_custom(&id).unwrap();
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn all_includes_builtins_and_custom() {
        let mut store = ProfileStore::new("unknown-device", BTreeMap::new());
        let builtin_count = store.builtins.len();
        store.add_custom(blank_profile("custom-xyz")).unwrap();
        assert_eq!(store.all().len(), builtin_count + 1);
    }
}
