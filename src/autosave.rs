// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! `/etc/ucc/autosave` (spec §3.3): the last display brightness, restored
//! across reboots independent of any profile.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

const AUTOSAVE_FILE: &str = "autosave";

#[derive(Debug, thiserror::Error)]
pub enum AutosaveError {
    #[error("failed to read {0:?}: {1}")]
    Read(std::path::PathBuf, io::Error),
    #[error("failed to write {0:?}: {1}")]
    Write(std::path::PathBuf, io::Error),
    #[error("failed to parse autosave: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autosave {
    pub display_brightness: i32,
}

pub fn load(dir: &Path) -> Autosave {
    let path = dir.join(AUTOSAVE_FILE);
    match fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => Autosave::default(),
    }
}

pub fn save(dir: &Path, autosave: Autosave) -> Result<(), AutosaveError> {
    let path = dir.join(AUTOSAVE_FILE);
    let json = serde_json::to_string(&autosave)?;
    fs::write(&path, json).map_err(|e| AutosaveError::Write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    #[test]
    fn round_trips_brightness() {
        let dir = std::env::temp_dir().join(format!("uccd-autosave-test-{}", process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        save(&dir, Autosave { display_brightness: 42 }).unwrap();
        assert_eq!(load(&dir).display_brightness, 42);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_yields_zero() {
        let dir = std::env::temp_dir().join(format!("uccd-autosave-missing-{}", process::id()));
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(load(&dir).display_brightness, 0);
    }
}
