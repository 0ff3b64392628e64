// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device-access surface consumed by manufacturing commands.

use crate::error::DeviceError;
use async_trait::async_trait;
use mfg_messages::ActiveImageIndex;
use mfg_messages::BootPhase;
use mfg_messages::SecurityConfig;
use mfg_messages::SerialVersionInfo;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// Individual requests a device understands.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceOp {
    QueryBootPhase,
    QuerySecurityConfig,
    QuerySerialVersionInfo,
    QueryActiveImageIndex,
    SubmitActiveImageIndex,
    ResumeBoot,
    DrainMailbox,
}

impl fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = self.into();
        f.write_str(s)
    }
}

/// Behavior implemented by both real and simulated switches.
///
/// Each method is a single blocking request: it completes when the device has
/// answered or the transport has given up. Implementations must not retry on
/// their own; callers report failures to the operator as-is.
#[async_trait]
pub trait MfgDevice: Send + Sync {
    async fn query_boot_phase(&self) -> Result<BootPhase, DeviceError>;

    async fn query_security_config(
        &self,
    ) -> Result<SecurityConfig, DeviceError>;

    async fn query_serial_version_info(
        &self,
    ) -> Result<SerialVersionInfo, DeviceError>;

    async fn query_active_image_index(
        &self,
    ) -> Result<ActiveImageIndex, DeviceError>;

    /// Submit all four selectors in one request. Selectors that are `None`
    /// are left unchanged by the device.
    async fn submit_active_image_index(
        &self,
        index: ActiveImageIndex,
    ) -> Result<(), DeviceError>;

    async fn resume_boot(&self) -> Result<(), DeviceError>;

    /// Copy the device's mailbox log into `sink`, returning the number of
    /// bytes written.
    async fn drain_mailbox_to(
        &self,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, DeviceError>;
}
