// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Logging setup (spec §7, §A.1): silences third-party crates and logs only
//! `uccd`'s own target, to stderr in `--debug` (foreground) and through
//! syslog otherwise (the daemon normally runs headless under systemd).

use fern::{Dispatch, InitError};
use log::LevelFilter;
use std::io;

pub fn setup(filter: LevelFilter, foreground: bool) -> Result<(), InitError> {
    let dispatch = Dispatch::new()
        .level(LevelFilter::Off)
        .level_for("uccd", filter)
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)));

    if foreground {
        dispatch.chain(io::stderr()).apply()?;
        return Ok(());
    }

    let syslog_formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: "uccd".into(),
        pid: std::process::id(),
    };

    match syslog::unix(syslog_formatter) {
        Ok(logger) => dispatch.chain(logger).apply()?,
        Err(why) => {
            dispatch.chain(io::stderr()).apply()?;
            log::warn!("failed to connect to syslog, falling back to stderr: {}", why);
        }
    }

    Ok(())
}
