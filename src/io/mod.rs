// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Hardware abstraction over the `/dev/tuxedo_io` character device.
//!
//! The device receives ioctls carrying a single 32-bit argument (read,
//! write, or write-then-read). At startup we probe for a Clevo identifier,
//! then a Uniwill identifier; the first that reports "identified" selects
//! the backing [`DeviceInterface`] implementation. If neither responds we
//! fall back to [`dummy::DummyDevice`], whose every operation fails with
//! [`IoError::Unsupported`].

pub mod clevo;
pub mod dummy;
pub mod uniwill;

use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::io::AsRawFd,
};
use thiserror::Error;

const DEVICE_PATH: &str = "/dev/tuxedo_io";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("operation not supported by this hardware/platform variant")]
    Unsupported,
    #[error("value out of range")]
    OutOfRange,
    #[error("ioctl failed: {0}")]
    Ioctl(#[from] io::Error),
}

pub type IoResult<T> = Result<T, IoError>;

/// The laptop-vendor platform family identified at startup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Platform {
    Clevo,
    Uniwill,
    Dummy,
}

/// Raw ioctl plumbing shared by every platform implementation. A single
/// 32-bit integer is exchanged with the kernel driver per call; request
/// codes below mirror the shape of `tuxedo_io_ioctl.h` (read, write, and
/// write-then-read variants over the same device node).
pub(crate) struct RawDevice {
    file: Option<File>,
}

impl RawDevice {
    fn open() -> Self { Self { file: OpenOptions::new().read(true).write(true).open(DEVICE_PATH).ok() } }

    fn is_available(&self) -> bool { self.file.is_some() }

    /// `ioctl(fd, request)` with no argument; success is `result >= 0`.
    fn call(&self, request: u64) -> bool { self.call_rw(request, &mut 0).is_ok() }

    /// `ioctl(fd, request, &mut arg)`; the driver may read, write, or both.
    fn call_rw(&self, request: u64, arg: &mut i32) -> IoResult<()> {
        let file = self.file.as_ref().ok_or(IoError::Unsupported)?;
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, arg as *mut i32) };
        if ret >= 0 {
            Ok(())
        } else {
            Err(IoError::Ioctl(io::Error::last_os_error()))
        }
    }

    fn read_i32(&self, request: u64) -> IoResult<i32> {
        let mut arg = 0i32;
        self.call_rw(request, &mut arg)?;
        Ok(arg)
    }

    fn write_i32(&self, request: u64, value: i32) -> IoResult<()> {
        let mut arg = value;
        self.call_rw(request, &mut arg)
    }
}

/// Capability surface exposed uniformly across Clevo / Uniwill / Dummy
/// backends. Every operation returns [`IoError::Unsupported`] when the
/// backing device cannot service it.
pub trait DeviceInterface: Send {
    fn platform(&self) -> Platform;
    fn identify(&self) -> IoResult<bool>;
    fn interface_id_str(&self) -> IoResult<String>;
    fn model_id_str(&self) -> IoResult<String>;
    fn set_enable_mode_set(&self, enabled: bool) -> IoResult<()>;
    fn number_fans(&self) -> IoResult<u8>;
    fn fans_min_speed(&self) -> IoResult<u8>;
    fn fans_off_available(&self) -> IoResult<bool>;
    fn set_fans_auto(&self) -> IoResult<()>;
    fn set_fan_speed_percent(&self, fan: u8, percent: u8) -> IoResult<()>;
    fn fan_speed_percent(&self, fan: u8) -> IoResult<u8>;
    fn fan_temperature(&self, fan: u8) -> IoResult<u8>;
    fn set_webcam(&self, on: bool) -> IoResult<()>;
    fn webcam(&self) -> IoResult<bool>;
    fn available_odm_performance_profiles(&self) -> IoResult<Vec<String>>;
    fn set_odm_performance_profile(&self, name: &str) -> IoResult<()>;
    fn default_odm_performance_profile(&self) -> IoResult<String>;
    fn number_tdps(&self) -> IoResult<u8>;
    fn tdp_descriptors(&self) -> IoResult<Vec<String>>;
    fn tdp_min(&self, index: u8) -> IoResult<i32>;
    fn tdp_max(&self, index: u8) -> IoResult<i32>;
    fn tdp(&self, index: u8) -> IoResult<i32>;
    fn set_tdp(&self, index: u8, watts: i32) -> IoResult<()>;
}

/// Probes `/dev/tuxedo_io` for a Clevo, then a Uniwill identifier, falling
/// back to the dummy implementation if neither responds.
pub fn detect() -> Box<dyn DeviceInterface> {
    let clevo = clevo::ClevoDevice::new();
    match clevo.identify() {
        Ok(true) => {
            log::info!("tuxedo_io: identified Clevo platform");
            return Box::new(clevo);
        }
        Ok(false) => {}
        Err(why) => log::debug!("tuxedo_io: clevo identify failed: {}", why),
    }

    let uniwill = uniwill::UniwillDevice::new();
    match uniwill.identify() {
        Ok(true) => {
            log::info!("tuxedo_io: identified Uniwill platform");
            return Box::new(uniwill);
        }
        Ok(false) => {}
        Err(why) => log::debug!("tuxedo_io: uniwill identify failed: {}", why),
    }

    log::warn!("tuxedo_io: no supported platform identified, falling back to dummy");
    Box::new(dummy::DummyDevice::new())
}
