// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

pub mod curve;
pub mod filter;
pub mod worker;

pub use worker::{CurveSource, FanWorker};
