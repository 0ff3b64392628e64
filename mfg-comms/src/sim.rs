// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-process switch backed by a JSON state file.

use crate::error::DeviceError;
use crate::error::StateFileError;
use crate::DeviceOp;
use crate::MfgDevice;
use async_trait::async_trait;
use mfg_messages::ActiveImageIndex;
use mfg_messages::BootPhase;
use mfg_messages::ImageSlot;
use mfg_messages::KmskEntry;
use mfg_messages::SecurityConfig;
use mfg_messages::SerialVersionInfo;
use mfg_messages::KMSK_LEN;
use mfg_messages::KMSK_NUM;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::o;
use slog::warn;
use slog::Logger;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tokio::sync::Mutex;

/// Status returned when a request is not permitted in the current phase.
const STATUS_NOT_PERMITTED: u32 = 0x0000_0004;

/// Everything the simulated switch remembers between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub boot_phase: BootPhase,
    pub security_config: SecurityConfig,
    pub serial_version: SerialVersionInfo,
    pub active_index: ActiveImageIndex,
    /// Pending mailbox log lines, oldest first.
    #[serde(default)]
    pub mailbox: Vec<String>,
}

impl DeviceState {
    /// A freshly provisioned switch paused in `phase`.
    pub fn in_phase(boot_phase: BootPhase) -> Self {
        let mut public_key = vec![KmskEntry::default(); KMSK_NUM];
        for (i, entry) in public_key.iter_mut().take(2).enumerate() {
            for (j, b) in entry.0.iter_mut().enumerate() {
                *b = (i * KMSK_LEN + j) as u8;
            }
        }

        Self {
            boot_phase,
            security_config: SecurityConfig {
                basic_setting_valid: true,
                public_key_exp_valid: true,
                public_key_num_valid: true,
                public_key_ver_valid: true,
                secure_state: 1,
                debug_mode: 1,
                jtag_lock_after_reset: 1,
                jtag_lock_after_bl1: 1,
                jtag_bl1_unlock_allowed: 1,
                jtag_post_bl1_unlock_allowed: 0,
                spi_clk_rate: 3,
                i2c_recovery_tmo: 30,
                i2c_port: 0,
                i2c_addr: 0x5a,
                i2c_cmd_map: 0x0000_0ff3,
                public_key_exponent: 0x0001_0001,
                public_key_num: 2,
                public_key_ver: 1,
                public_key,
            },
            serial_version: SerialVersionInfo {
                chip_serial: 0x5a3c_0f12,
                ver_km: 1,
                ver_bl2: 2,
                ver_main: 3,
                ver_sec_unlock: 0,
            },
            active_index: ActiveImageIndex {
                bl2: Some(ImageSlot::Zero),
                firmware: Some(ImageSlot::Zero),
                config: Some(ImageSlot::Zero),
                key_manifest: Some(ImageSlot::Zero),
            },
            mailbox: vec![
                "BL1: secure boot check passed".to_string(),
                "BL1: waiting for host".to_string(),
            ],
        }
    }
}

#[derive(Debug, Default)]
struct Bookkeeping {
    faults: BTreeMap<DeviceOp, u32>,
    calls: BTreeMap<DeviceOp, usize>,
}

/// A switch simulated entirely in memory.
///
/// Requests behave the way firmware does: mutations the current phase does
/// not permit come back as error statuses rather than being silently
/// ignored. Tests can inject one-shot failures with
/// [`SimulatedDevice::fail_next`] and inspect how often each request was
/// made.
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
    books: Mutex<Bookkeeping>,
    log: Logger,
}

impl SimulatedDevice {
    pub fn new(state: DeviceState, log: &Logger) -> Self {
        Self {
            state: Mutex::new(state),
            books: Mutex::default(),
            log: log.new(o!("device" => "simulated")),
        }
    }

    /// Load device state from a JSON file written by [`Self::save`] (or by
    /// hand).
    pub async fn load(
        path: &Path,
        log: &Logger,
    ) -> Result<Self, StateFileError> {
        let contents = tokio::fs::read(path).await.map_err(|err| {
            StateFileError::Read { path: path.display().to_string(), err }
        })?;
        let state = serde_json::from_slice(&contents).map_err(|err| {
            StateFileError::Parse { path: path.display().to_string(), err }
        })?;
        let dev = Self::new(state, log);
        debug!(dev.log, "loaded device state"; "path" => %path.display());
        Ok(dev)
    }

    pub async fn save(&self, path: &Path) -> Result<(), StateFileError> {
        let mut contents = {
            let state = self.state.lock().await;
            serde_json::to_vec_pretty(&*state)
                .map_err(StateFileError::Serialize)?
        };
        contents.push(b'\n');
        tokio::fs::write(path, contents).await.map_err(|err| {
            StateFileError::Write { path: path.display().to_string(), err }
        })?;
        debug!(self.log, "saved device state"; "path" => %path.display());
        Ok(())
    }

    /// Snapshot of the current device state.
    pub async fn state(&self) -> DeviceState {
        self.state.lock().await.clone()
    }

    /// Make the next `op` request fail with `status`.
    pub async fn fail_next(&self, op: DeviceOp, status: u32) {
        self.books.lock().await.faults.insert(op, status);
    }

    /// Number of `op` requests received so far.
    pub async fn calls(&self, op: DeviceOp) -> usize {
        self.books.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.books.lock().await.calls.values().sum()
    }

    /// Count a request and consume any fault injected for it.
    async fn begin(&self, op: DeviceOp) -> Result<(), DeviceError> {
        let mut books = self.books.lock().await;
        *books.calls.entry(op).or_default() += 1;
        match books.faults.remove(&op) {
            Some(status) => {
                warn!(
                    self.log, "injected fault";
                    "op" => %op,
                    "status" => status,
                );
                Err(DeviceError::Status { op, status })
            }
            None => {
                debug!(self.log, "request"; "op" => %op);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MfgDevice for SimulatedDevice {
    async fn query_boot_phase(&self) -> Result<BootPhase, DeviceError> {
        self.begin(DeviceOp::QueryBootPhase).await?;
        Ok(self.state.lock().await.boot_phase)
    }

    async fn query_security_config(
        &self,
    ) -> Result<SecurityConfig, DeviceError> {
        let op = DeviceOp::QuerySecurityConfig;
        self.begin(op).await?;
        let state = self.state.lock().await;
        if state.boot_phase == BootPhase::Bl2 {
            return Err(DeviceError::Status {
                op,
                status: STATUS_NOT_PERMITTED,
            });
        }
        Ok(state.security_config.clone())
    }

    async fn query_serial_version_info(
        &self,
    ) -> Result<SerialVersionInfo, DeviceError> {
        self.begin(DeviceOp::QuerySerialVersionInfo).await?;
        Ok(self.state.lock().await.serial_version)
    }

    async fn query_active_image_index(
        &self,
    ) -> Result<ActiveImageIndex, DeviceError> {
        self.begin(DeviceOp::QueryActiveImageIndex).await?;
        Ok(self.state.lock().await.active_index)
    }

    async fn submit_active_image_index(
        &self,
        index: ActiveImageIndex,
    ) -> Result<(), DeviceError> {
        let op = DeviceOp::SubmitActiveImageIndex;
        self.begin(op).await?;
        let mut state = self.state.lock().await;
        if state.boot_phase != BootPhase::Bl1 {
            return Err(DeviceError::Status {
                op,
                status: STATUS_NOT_PERMITTED,
            });
        }
        state.active_index.apply(&index);
        Ok(())
    }

    async fn resume_boot(&self) -> Result<(), DeviceError> {
        let op = DeviceOp::ResumeBoot;
        self.begin(op).await?;
        let mut state = self.state.lock().await;
        if state.boot_phase == BootPhase::MainFirmware {
            return Err(DeviceError::Status {
                op,
                status: STATUS_NOT_PERMITTED,
            });
        }
        state.boot_phase = BootPhase::MainFirmware;
        Ok(())
    }

    async fn drain_mailbox_to(
        &self,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, DeviceError> {
        let op = DeviceOp::DrainMailbox;
        self.begin(op).await?;
        let mut state = self.state.lock().await;
        let mut written = 0;
        for line in &state.mailbox {
            sink.write_all(line.as_bytes())
                .and_then(|()| sink.write_all(b"\n"))
                .map_err(|err| DeviceError::Sink { op, err })?;
            written += line.len() as u64 + 1;
        }
        // Drained entries are gone from the device.
        state.mailbox.clear();
        Ok(written)
    }
}
