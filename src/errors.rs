// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Error taxonomy (spec §7): one aggregating enum per subsystem boundary so
//! `?` composes, with no error type ever crossing the RPC surface itself.

use crate::autosave::AutosaveError;
use crate::charging::ChargingError;
use crate::io::IoError;
use crate::profile::StoreError;
use crate::settings::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("hardware interface error: {0}")]
    Io(#[from] IoError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("autosave error: {0}")]
    Autosave(#[from] AutosaveError),
    #[error("charging error: {0}")]
    Charging(#[from] ChargingError),
    #[error("profile store error: {0}")]
    Store(#[from] StoreError),
}
