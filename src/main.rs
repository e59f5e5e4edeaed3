// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use log::LevelFilter;
use std::process;

mod autosave;
mod ble;
mod charging;
mod cpu;
mod daemon;
mod errors;
mod fan;
mod io;
mod keyboard;
mod logging;
mod monitor;
mod orchestrator;
mod profile;
mod rpc;
mod settings;
mod snapshot;
mod sysfs;

/// Uniwill/Clevo control-plane daemon.
#[derive(Parser, Debug)]
#[command(name = "uccd", version, about = "Uniwill/Clevo control-plane daemon")]
struct Cli {
    /// Start the daemon (the default if no flag is given).
    #[arg(long)]
    start: bool,

    /// Signal a running instance to shut down.
    #[arg(long)]
    stop: bool,

    /// Run in the foreground with debug-level logging to stderr.
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.stop {
        match daemon::stop_running_instance() {
            Ok(_) => process::exit(0),
            Err(why) => {
                eprintln!("uccd: {}", why);
                process::exit(1);
            }
        }
    }

    let filter = if cli.debug { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(why) = logging::setup(filter, cli.debug) {
        eprintln!("uccd: failed to set up logging: {}", why);
        process::exit(1);
    }

    if unsafe { libc::geteuid() } != 0 {
        log::error!("uccd must be run as root");
        process::exit(1);
    }

    if let Err(why) = daemon::run() {
        log::error!("{:#}", why);
        process::exit(1);
    }
}
