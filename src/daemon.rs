// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Daemon shell & lifecycle (spec §4.10 last paragraph, §5, §6.5): builds
//! every worker, registers the `com.uniwill.uccd` service, and drives the
//! tick loops RPC handlers never touch directly. Workers publish state into
//! the snapshot; this module is the only thing that reads the clock.

use crate::ble::WaterCoolerWorker;
use crate::cpu::CpuController;
use crate::fan::FanWorker;
use crate::io;
use crate::keyboard::KeyboardBacklight;
use crate::monitor::HardwareMonitor;
use crate::orchestrator::{CpuReapplyLoop, PowerState, PowerStateResolver, ProfileApplier};
use crate::profile::ProfileStore;
use crate::rpc::{RpcState, Uccd};
use crate::settings;
use crate::snapshot::Snapshot;
use anyhow::Context;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tokio::time::interval;

pub const DBUS_NAME: &str = "com.uniwill.uccd";
pub const DBUS_PATH: &str = "/com/uniwill/uccd";

const PID_FILE: &str = "/run/uccd.pid";
const DEVICE_ID_PATH: &str = "/sys/class/dmi/id/product_version";
const AC_ONLINE_PATHS: [&str; 2] = ["/sys/class/power_supply/AC/online", "/sys/class/power_supply/ADP1/online"];

const CPU_VALIDATOR_TICK: Duration = Duration::from_secs(10);
const FAN_CONTROL_TICK: Duration = Duration::from_secs(1);
const KEYBOARD_LISTENER_TICK: Duration = Duration::from_secs(2);
const POWER_STATE_TICK: Duration = Duration::from_secs(1);

static CONTINUE: AtomicBool = AtomicBool::new(true);

async fn signal_handling() {
    let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut hup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    let name = tokio::select! {
        _ = int.recv() => "SIGINT",
        _ = hup.recv() => "SIGHUP",
        _ = term.recv() => "SIGTERM",
    };

    log::info!("caught signal: {}", name);
    CONTINUE.store(false, Ordering::SeqCst);
}

fn device_id() -> String { crate::sysfs::read_string(DEVICE_ID_PATH).unwrap_or_default() }

/// Best-effort mains-plug probe; assumes AC when neither node is present
/// rather than defaulting every unknown laptop to the battery profile.
fn mains_plugged() -> bool {
    AC_ONLINE_PATHS.iter().find_map(|path| crate::sysfs::read::<u8, _>(path)).map(|v| v != 0).unwrap_or(true)
}

fn now_ms() -> u64 { SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0) }

/// Single-instance lock (spec §5, §6.2): refuses to start if `/run/uccd.pid`
/// names a process that is still alive, and removes the file on drop.
struct PidLock;

impl PidLock {
    fn acquire() -> anyhow::Result<Self> {
        if let Some(existing) = crate::sysfs::read::<i32, _>(PID_FILE) {
            if Path::new(&format!("/proc/{}", existing)).exists() {
                anyhow::bail!("uccd is already running (pid {})", existing);
            }
            log::warn!("removing stale pid file for pid {}", existing);
        }
        std::fs::write(PID_FILE, std::process::id().to_string()).context("failed to write pid file")?;
        Ok(Self)
    }
}

impl Drop for PidLock {
    fn drop(&mut self) { let _ = std::fs::remove_file(PID_FILE); }
}

/// `uccd --stop`: signals a running instance via its PID file. Returns
/// `false` (not an error) when no instance was running, matching §6.5's
/// "exits 0 if none was running".
pub fn stop_running_instance() -> anyhow::Result<bool> {
    let Some(pid) = crate::sysfs::read::<i32, _>(PID_FILE) else { return Ok(false) };
    if !Path::new(&format!("/proc/{}", pid)).exists() {
        return Ok(false);
    }
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        anyhow::bail!("failed to signal pid {}: {}", pid, std::io::Error::last_os_error());
    }
    Ok(true)
}

async fn cpu_validator_loop(state: Arc<RpcState>) {
    let mut ticker = interval(CPU_VALIDATOR_TICK);
    let mut reapply = CpuReapplyLoop::new();

    loop {
        ticker.tick().await;
        if !CONTINUE.load(Ordering::SeqCst) {
            return;
        }

        let cpu_enabled = state.settings.lock().await.cpu_settings_enabled;
        if !cpu_enabled {
            continue;
        }

        let profile = state.active_profile.lock().await.clone();
        let matches = state.cpu.matches(
            &profile.cpu.governor,
            &profile.cpu.energy_performance_preference,
            profile.cpu.scaling_min_frequency,
            profile.cpu.scaling_max_frequency,
            Some(profile.cpu.no_turbo),
        );

        if reapply.observe(matches) {
            log::info!("cpu: live sysfs disagreed with active profile, reapplying");
            state.reapply_pending.store(true, Ordering::SeqCst);
            let mut keyboard = state.keyboard.lock().await;
            let device = state.device.lock().await;
            let applier = ProfileApplier { cpu: &state.cpu, io: device.as_ref(), keyboard: &mut keyboard };
            applier.apply_cpu(&profile);
            drop(device);
            drop(keyboard);
        }
    }
}

async fn fan_control_loop(state: Arc<RpcState>) {
    let mut ticker = interval(FAN_CONTROL_TICK);

    loop {
        ticker.tick().await;
        if !CONTINUE.load(Ordering::SeqCst) {
            return;
        }

        let fan_control_enabled = state.settings.lock().await.fan_control_enabled;
        let curve_source = state.current_curve_source.lock().unwrap().clone();
        state.fan_worker.lock().await.tick(&curve_source, fan_control_enabled);
    }
}

async fn hardware_monitor_loop(state: Arc<RpcState>) {
    let mut monitor = HardwareMonitor::new();
    let mut ticker = interval(crate::monitor::TICK);

    loop {
        ticker.tick().await;
        if !CONTINUE.load(Ordering::SeqCst) {
            return;
        }

        let tick = monitor.tick().await;
        if !*state.sensor_collection_enabled.lock().unwrap() {
            continue;
        }

        if let Some(cpu_power) = &tick.cpu_power {
            if let Ok(json) = serde_json::to_string(cpu_power) {
                state.snapshot.set_cpu_power_json(json);
            }
        }
        if state.dgpu_d0_metrics_enabled.load(Ordering::SeqCst) {
            if let Some(dgpu) = &tick.dgpu {
                state.snapshot.set_has_nvidia(true);
                if let Ok(json) = serde_json::to_string(dgpu) {
                    state.snapshot.set_gpu_info_json(json);
                }
            }
        }
        if let Some(prime_state) = tick.prime_state {
            state.snapshot.set_prime_state(prime_state);
        }
        state.snapshot.touch(now_ms());
    }
}

async fn keyboard_listener_loop(state: Arc<RpcState>) {
    let mut ticker = interval(KEYBOARD_LISTENER_TICK);

    loop {
        ticker.tick().await;
        if !CONTINUE.load(Ordering::SeqCst) {
            return;
        }

        let enabled = state.settings.lock().await.keyboard_backlight_control_enabled;
        state.keyboard.lock().await.set_control_enabled(enabled);
    }
}

/// Resolves power state every tick (§4.10) and, on a change, applies the
/// profile named by `settings.stateMap[state]` and fires both signals.
async fn power_state_loop(state: Arc<RpcState>, context: zbus::SignalContext<'static>) {
    let mut ticker = interval(POWER_STATE_TICK);
    let mut resolver = PowerStateResolver::new();

    loop {
        ticker.tick().await;
        if !CONTINUE.load(Ordering::SeqCst) {
            return;
        }

        let auto_control_wc = state.active_profile.lock().await.fan.auto_control_wc;
        let resolved = resolver.resolve(mains_plugged(), state.water_cooler.is_connected(), auto_control_wc, std::time::Instant::now());

        let previous = { *state.power_state.lock().unwrap() };
        if resolved == previous {
            continue;
        }

        *state.power_state.lock().unwrap() = resolved;
        log::info!("power state: {:?} -> {:?}", previous, resolved);

        let profile_id = state.settings.lock().await.state_map.get(resolved).map(str::to_owned);
        if let Some(id) = profile_id {
            let applied = {
                let store = state.store.lock().await;
                store.get(&id).cloned()
            };
            if let Some(profile) = applied {
                state.apply_profile_object(&profile).await;
                let _ = Uccd::profile_changed(&context, &id).await;
            }
        }

        let _ = Uccd::power_state_changed(&context, resolved.as_str()).await;
    }
}

/// Resolves the initial profile to apply at startup: the state map's entry
/// for the current power state, falling back to the store's default
/// template when nothing is configured yet.
fn initial_profile(store: &ProfileStore, settings: &settings::Settings, state: PowerState) -> crate::profile::Profile {
    settings
        .state_map
        .get(state)
        .and_then(|id| store.get(id))
        .cloned()
        .unwrap_or_else(|| store.default_template())
}

#[tokio::main(flavor = "current_thread")]
pub async fn run() -> anyhow::Result<()> {
    let _pid_lock = PidLock::acquire()?;

    let config_dir = Path::new(settings::CONFIG_DIR);
    settings::ensure_config_dir(config_dir).context("failed to create config directory")?;
    let settings_data = settings::load(config_dir).context("failed to load settings")?;

    let snapshot = Arc::new(Snapshot::new());
    let device_id = device_id();
    snapshot.set_device_name(device_id.clone());

    if let Ok(json) = serde_json::to_string(&settings_data) {
        snapshot.set_settings_json(json);
    }

    let cpu = Arc::new(CpuController::discover());
    let store = ProfileStore::new(&device_id, settings_data.profiles.clone());

    let initial_state = if mains_plugged() { PowerState::Ac } else { PowerState::Battery };
    let active_profile = initial_profile(&store, &settings_data, initial_state);

    let fan_device = io::detect();
    let fan_worker = Arc::new(Mutex::new(FanWorker::new(fan_device, snapshot.clone())));

    let rpc_device = io::detect();
    snapshot.set_has_tdp(rpc_device.number_tdps().unwrap_or(0) > 0);

    let mut keyboard = KeyboardBacklight::detect();
    keyboard.set_control_enabled(settings_data.keyboard_backlight_control_enabled);

    let water_cooler = WaterCoolerWorker::spawn(snapshot.clone());

    let state = Arc::new(RpcState {
        snapshot: snapshot.clone(),
        settings: Mutex::new(settings_data),
        store: Mutex::new(store),
        cpu,
        device: Arc::new(Mutex::new(rpc_device)),
        fan_worker,
        keyboard: Arc::new(Mutex::new(keyboard)),
        water_cooler,
        current_curve_source: std::sync::Mutex::new(Default::default()),
        active_profile: Mutex::new(active_profile.clone()),
        power_state: std::sync::Mutex::new(initial_state),
        sensor_collection_enabled: std::sync::Mutex::new(true),
        dgpu_d0_metrics_enabled: AtomicBool::new(true),
        reapply_pending: AtomicBool::new(false),
    });

    state.apply_profile_object(&active_profile).await;

    let connection = zbus::Connection::system().await.context("failed to create zbus connection")?;
    let context = zbus::SignalContext::new(&connection, DBUS_PATH).context("unable to create signal context")?;
    let context: zbus::SignalContext<'static> = context.into_owned();

    let _connection = zbus::ConnectionBuilder::system()
        .context("failed to create zbus connection builder")?
        .name(DBUS_NAME)
        .context("unable to register bus name")?
        .serve_at(DBUS_PATH, Uccd(state.clone()))
        .context("unable to serve uccd interface")?
        .build()
        .await
        .context("unable to create system service for com.uniwill.uccd")?;

    tokio::spawn(cpu_validator_loop(state.clone()));
    tokio::spawn(fan_control_loop(state.clone()));
    tokio::spawn(hardware_monitor_loop(state.clone()));
    tokio::spawn(keyboard_listener_loop(state.clone()));
    tokio::spawn(power_state_loop(state.clone(), context));

    log::info!("uccd listening on {}", DBUS_NAME);
    signal_handling().await;
    log::info!("uccd shutting down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mains_plugged_defaults_true_without_sysfs_node() {
        // Neither AC_ONLINE_PATHS entry exists in a test sandbox; the probe
        // must not report "on battery" just because the node is absent.
        assert!(mains_plugged());
    }
}
