// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

pub mod defaults;
pub mod model;
pub mod store;

pub use model::Profile;
pub use store::{ProfileStore, StoreError};
