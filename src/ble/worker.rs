// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! The BLE water-cooler state machine (spec §4.7). Runs single-threaded on
//! its own Tokio task; every mutator is a message sent over a channel to
//! that task, so BLE callbacks and the 1 Hz tick never race against an RPC
//! caller poking state directly.

use crate::ble::protocol::{self, RgbMode, CCCD_ENABLE_NOTIFY, CCCD_UUID, UART_RX_CHARACTERISTIC_UUID, UART_SERVICE_UUID, UART_TX_CHARACTERISTIC_UUID};
use crate::profile::model::PumpLevel;
use crate::snapshot::Snapshot;
use bluer::{Address, Device};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};

const DISCOVERY_RETRY_SECONDS: u64 = 3;
const DISCOVERING_TIMEOUT: Duration = Duration::from_secs(15);
const DISCOVERY_SCAN_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECTING_TIMEOUT: Duration = Duration::from_secs(8);
const CONNECTING_TIMEOUT: Duration = Duration::from_secs(12);
const INITIAL_FAN_SPEED_PERCENT: u8 = 10;
const ERROR_RETRY_BASE_SECONDS: u64 = 5;
const ERROR_RETRY_MAX_SECONDS: u64 = 120;
const ADAPTER_RESET_FAILURE_THRESHOLD: u32 = 5;
const BLE_WRITE_GAP: Duration = Duration::from_millis(80);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WcState {
    Disconnected,
    Discovering,
    Reconnecting,
    Connecting,
    Connected,
    Error,
}

enum Command_ {
    SetFanSpeed(Option<u8>, oneshot::Sender<()>),
    SetPumpVoltage(Option<PumpLevel>, oneshot::Sender<()>),
    SetRgb(Option<(u8, u8, u8, RgbMode)>, oneshot::Sender<()>),
    SetScanningEnabled(bool, oneshot::Sender<()>),
}

/// Thread-safe handle: dispatches to the worker's event loop and blocks for
/// the round trip, matching the spec's "blocking semantics when called from
/// another thread" contract.
#[derive(Clone)]
pub struct WaterCoolerHandle {
    tx: mpsc::Sender<Command_>,
    last_fan_speed: Arc<AtomicI32>,
    last_pump_level: Arc<AtomicI32>,
    last_rgb: Arc<AtomicU32>,
    connected: Arc<AtomicBool>,
}

impl WaterCoolerHandle {
    pub fn is_connected(&self) -> bool { self.connected.load(Ordering::Relaxed) }

    pub fn last_fan_speed(&self) -> Option<u8> {
        match self.last_fan_speed.load(Ordering::Relaxed) {
            -1 => None,
            v => Some(v as u8),
        }
    }

    pub fn last_pump_level(&self) -> Option<PumpLevel> {
        match self.last_pump_level.load(Ordering::Relaxed) {
            -1 => None,
            v => Some(PumpLevel::from_raw(v)),
        }
    }

    async fn dispatch(&self, command: Command_, rx: oneshot::Receiver<()>) { let _ = self.tx.send(command).await; let _ = rx.await; }

    pub async fn set_fan_speed(&self, duty_percent: Option<u8>) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(Command_::SetFanSpeed(duty_percent, done_tx), done_rx).await;
    }

    pub async fn set_pump_voltage(&self, level: Option<PumpLevel>) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(Command_::SetPumpVoltage(level, done_tx), done_rx).await;
    }

    pub async fn set_rgb(&self, color: Option<(u8, u8, u8, RgbMode)>) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(Command_::SetRgb(color, done_tx), done_rx).await;
    }

    pub async fn set_scanning_enabled(&self, enabled: bool) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(Command_::SetScanningEnabled(enabled, done_tx), done_rx).await;
    }
}

struct GattLink {
    device: Device,
    tx_write_response: bluer::gatt::remote::Characteristic,
    tx_write_no_response: bluer::gatt::remote::Characteristic,
}

pub struct WaterCoolerWorker {
    snapshot: Arc<Snapshot>,
    rx: mpsc::Receiver<Command_>,
    state: WcState,
    state_entered_at: Instant,
    last_discovery_attempt: Option<Instant>,
    failures: u32,
    cached_address: Option<Address>,
    scanning_enabled: bool,
    link: Option<GattLink>,
    last_write_at: Option<Instant>,
    last_fan_speed: Arc<AtomicI32>,
    last_pump_level: Arc<AtomicI32>,
    last_rgb: Arc<AtomicU32>,
    connected_flag: Arc<AtomicBool>,
}

impl WaterCoolerWorker {
    pub fn spawn(snapshot: Arc<Snapshot>) -> WaterCoolerHandle {
        let (tx, rx) = mpsc::channel(16);
        let last_fan_speed = Arc::new(AtomicI32::new(-1));
        let last_pump_level = Arc::new(AtomicI32::new(-1));
        let last_rgb = Arc::new(AtomicU32::new(u32::MAX));
        let connected_flag = Arc::new(AtomicBool::new(false));

        let worker = WaterCoolerWorker {
            snapshot,
            rx,
            state: WcState::Disconnected,
            state_entered_at: Instant::now(),
            last_discovery_attempt: None,
            failures: 0,
            cached_address: None,
            scanning_enabled: true,
            link: None,
            last_write_at: None,
            last_fan_speed: last_fan_speed.clone(),
            last_pump_level: last_pump_level.clone(),
            last_rgb: last_rgb.clone(),
            connected_flag: connected_flag.clone(),
        };

        tokio::spawn(worker.run());

        WaterCoolerHandle { tx, last_fan_speed, last_pump_level, last_rgb, connected: connected_flag }
    }

    async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                Some(command) = self.rx.recv() => self.handle_command(command).await,
            }
        }
    }

    async fn handle_command(&mut self, command: Command_) {
        match command {
            Command_::SetFanSpeed(duty, done) => {
                self.write_throttled(protocol::fan_frame(duty), false).await;
                self.last_fan_speed.store(duty.map(i32::from).unwrap_or(-1), Ordering::Relaxed);
                let _ = done.send(());
            }
            Command_::SetPumpVoltage(level, done) => {
                if level != Some(PumpLevel::FullSpeed) || level.is_none() {
                    self.write_throttled(protocol::pump_frame(level), true).await;
                    self.last_pump_level.store(level.map(|l| l as i32).unwrap_or(-1), Ordering::Relaxed);
                }
                let _ = done.send(());
            }
            Command_::SetRgb(color, done) => {
                self.write_throttled(protocol::rgb_frame(color), true).await;
                let packed = color.map(|(r, g, b, mode)| (r as u32) << 24 | (g as u32) << 16 | (b as u32) << 8 | mode as u32).unwrap_or(u32::MAX);
                self.last_rgb.store(packed, Ordering::Relaxed);
                let _ = done.send(());
            }
            Command_::SetScanningEnabled(enabled, done) => {
                self.scanning_enabled = enabled;
                self.snapshot.set_wc_scanning_enabled(enabled);
                let _ = done.send(());
            }
        }
    }

    /// Suppresses redundant writes (de-duplication lives in the caller via
    /// the last-value atomics) and enforces the 80 ms inter-write gap.
    async fn write_throttled(&mut self, payload: [u8; 8], with_response: bool) {
        let Some(link) = &self.link else { return };

        if let Some(last) = self.last_write_at {
            let elapsed = last.elapsed();
            if elapsed < BLE_WRITE_GAP {
                tokio::time::sleep(BLE_WRITE_GAP - elapsed).await;
            }
        }

        let characteristic = if with_response { &link.tx_write_response } else { &link.tx_write_no_response };
        if let Err(why) = characteristic.write(&payload).await {
            log::warn!("water cooler: write failed: {}", why);
        }
        self.last_write_at = Some(Instant::now());
    }

    fn transition(&mut self, next: WcState) {
        log::debug!("water cooler: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.state_entered_at = Instant::now();
    }

    fn elapsed_in_state(&self) -> Duration { self.state_entered_at.elapsed() }

    async fn tick(&mut self) {
        if !self.scanning_enabled {
            return;
        }

        match self.state {
            WcState::Disconnected => self.tick_disconnected().await,
            WcState::Discovering => self.tick_discovering().await,
            WcState::Reconnecting => self.tick_connect_attempt(RECONNECTING_TIMEOUT, true).await,
            WcState::Connecting => self.tick_connect_attempt(CONNECTING_TIMEOUT, false).await,
            WcState::Connected => self.tick_connected().await,
            WcState::Error => self.tick_error().await,
        }

        self.snapshot.set_wc_connected(self.connected_flag.load(Ordering::Relaxed));
    }

    async fn tick_disconnected(&mut self) {
        if self.cached_address.is_some() {
            self.transition(WcState::Reconnecting);
            return;
        }

        let due = self.last_discovery_attempt.map(|at| at.elapsed() >= Duration::from_secs(DISCOVERY_RETRY_SECONDS)).unwrap_or(true);
        if due {
            self.last_discovery_attempt = Some(Instant::now());
            self.transition(WcState::Discovering);
        }
    }

    async fn tick_discovering(&mut self) {
        if self.elapsed_in_state() >= DISCOVERING_TIMEOUT {
            self.transition(WcState::Disconnected);
            return;
        }

        match self.discover_device().await {
            Ok(Some(address)) => {
                self.snapshot.set_wc_available(true);
                self.cached_address = Some(address);
                self.transition(WcState::Connecting);
            }
            Ok(None) => {
                self.snapshot.set_wc_available(false);
                self.transition(WcState::Disconnected);
            }
            Err(why) => log::debug!("water cooler: discovery error: {}", why),
        }
    }

    /// Scans for up to [`DISCOVERY_SCAN_TIMEOUT`], stopping early on the
    /// first peer whose name contains "lct".
    async fn discover_device(&self) -> bluer::Result<Option<Address>> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;

        let mut events = adapter.discover_devices().await?;
        let scan = async {
            use futures_util::StreamExt;
            while let Some(event) = events.next().await {
                if let bluer::AdapterEvent::DeviceAdded(address) = event {
                    if let Ok(device) = adapter.device(address) {
                        if let Ok(Some(name)) = device.name().await {
                            if name.to_lowercase().contains("lct") {
                                return Some(address);
                            }
                        }
                    }
                }
            }
            None
        };

        Ok(timeout(DISCOVERY_SCAN_TIMEOUT, scan).await.unwrap_or(None))
    }

    async fn tick_connect_attempt(&mut self, overall_timeout: Duration, is_reconnect: bool) {
        if self.elapsed_in_state() >= overall_timeout {
            self.on_connect_failure(is_reconnect).await;
            return;
        }

        let Some(address) = self.cached_address else {
            self.transition(WcState::Disconnected);
            return;
        };

        match self.try_connect(address).await {
            Ok(link) => {
                self.link = Some(link);
                self.connected_flag.store(true, Ordering::Relaxed);
                self.failures = 0;
                self.transition(WcState::Connected);
                self.apply_safe_initial_state().await;
            }
            Err(why) => {
                log::debug!("water cooler: connect attempt failed: {}", why);
            }
        }
    }

    async fn try_connect(&self, address: Address) -> bluer::Result<GattLink> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        let device = adapter.device(address)?;
        device.connect().await?;

        for service in device.services().await? {
            let uuid = service.uuid().await?;
            if uuid.to_string() != UART_SERVICE_UUID {
                continue;
            }

            let mut tx_write_response = None;
            let mut tx_write_no_response = None;
            let mut rx = None;

            for characteristic in service.characteristics().await? {
                let char_uuid = characteristic.uuid().await?.to_string();
                if char_uuid == UART_TX_CHARACTERISTIC_UUID {
                    tx_write_response = Some(characteristic.clone());
                    tx_write_no_response = Some(characteristic);
                } else if char_uuid == UART_RX_CHARACTERISTIC_UUID {
                    rx = Some(characteristic);
                }
            }

            if let (Some(tx_write_response), Some(tx_write_no_response), Some(rx)) = (tx_write_response, tx_write_no_response, rx) {
                for descriptor in rx.descriptors().await? {
                    if descriptor.uuid().await?.to_string() == CCCD_UUID {
                        let _ = descriptor.write(&CCCD_ENABLE_NOTIFY).await;
                    }
                }
                return Ok(GattLink { device, tx_write_response, tx_write_no_response });
            }
        }

        Err(bluer::Error { kind: bluer::ErrorKind::NotFound, message: "UART service not found".to_owned() })
    }

    async fn on_connect_failure(&mut self, is_reconnect: bool) {
        self.failures += 1;
        self.link = None;
        self.connected_flag.store(false, Ordering::Relaxed);
        if is_reconnect {
            self.cached_address = None;
        }
        self.transition(WcState::Error);
    }

    async fn tick_connected(&mut self) {
        let still_connected = match &self.link {
            Some(link) => link.device.is_connected().await.unwrap_or(false),
            None => false,
        };

        if !still_connected {
            self.failures += 1;
            self.link = None;
            self.connected_flag.store(false, Ordering::Relaxed);
            self.transition(WcState::Disconnected);
        }
    }

    async fn apply_safe_initial_state(&mut self) {
        self.write_throttled(protocol::pump_frame(Some(PumpLevel::Off)), true).await;
        self.last_pump_level.store(PumpLevel::Off as i32, Ordering::Relaxed);
        self.write_throttled(protocol::fan_frame(Some(INITIAL_FAN_SPEED_PERCENT)), false).await;
        self.last_fan_speed.store(i32::from(INITIAL_FAN_SPEED_PERCENT), Ordering::Relaxed);
        self.failures = 0;
    }

    async fn tick_error(&mut self) {
        let backoff_secs = ERROR_RETRY_BASE_SECONDS * 2u64.pow(self.failures.min(5)).min(ERROR_RETRY_MAX_SECONDS / ERROR_RETRY_BASE_SECONDS);
        let backoff = Duration::from_secs(backoff_secs.min(ERROR_RETRY_MAX_SECONDS));

        if self.elapsed_in_state() < backoff {
            return;
        }

        if self.failures >= ADAPTER_RESET_FAILURE_THRESHOLD {
            if self.reset_adapter().await.is_ok() {
                self.failures = 0;
            }
        }

        self.transition(WcState::Disconnected);
    }

    async fn reset_adapter(&self) -> std::io::Result<()> {
        log::warn!("water cooler: resetting bluetooth adapter after {} consecutive failures", self.failures);
        Command::new("bluetoothctl").arg("power").arg("off").stdout(Stdio::null()).status().await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        Command::new("bluetoothctl").arg("power").arg("on").stdout(Stdio::null()).status().await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_backoff_doubles_with_cap() {
        let backoff = |failures: u32| ERROR_RETRY_BASE_SECONDS * 2u64.pow(failures.min(5)).min(ERROR_RETRY_MAX_SECONDS / ERROR_RETRY_BASE_SECONDS);
        assert_eq!(backoff(0), 5);
        assert_eq!(backoff(1), 10);
        assert_eq!(backoff(4), 80);
        assert_eq!(backoff(10).min(ERROR_RETRY_MAX_SECONDS), 120);
    }
}
