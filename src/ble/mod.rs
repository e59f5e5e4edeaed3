// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod worker;

pub use worker::{WaterCoolerHandle, WaterCoolerWorker, WcState};
