// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interpretation of the device's security configuration.

use crate::current_phase;
use crate::error::FormatError;
use crate::error::QueryError;
use crate::MfgDevice;
use mfg_messages::BootPhase;
use mfg_messages::DebugMode;
use mfg_messages::KmskEntry;
use mfg_messages::SecureState;
use mfg_messages::SecurityConfig;
use mfg_messages::SerialVersionInfo;
use serde::Serialize;
use slog::debug;
use slog::info;
use slog::Logger;
use std::fmt;

/// SPI clock rates (in MHz) selectable on the device, indexed from 1.
pub const SPI_CLOCK_RATES_MHZ: [&str; 10] = [
    "100", "67", "50", "40", "33.33", "28.57", "25", "22.22", "20", "18.18",
];

/// Translate the device's 1-based SPI clock rate index.
pub fn spi_clock_rate_mhz(index: u8) -> Result<&'static str, FormatError> {
    usize::from(index)
        .checked_sub(1)
        .and_then(|i| SPI_CLOCK_RATES_MHZ.get(i))
        .copied()
        .ok_or(FormatError::SpiClockRate {
            index,
            max: SPI_CLOCK_RATES_MHZ.len(),
        })
}

/// A value paired with the device's claim about whether it is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Flagged<T> {
    pub value: T,
    pub valid: bool,
}

/// The currently selected KMSK index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyVersion {
    NotSet,
    Index(u32),
}

impl KeyVersion {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::NotSet,
            n => Self::Index(n),
        }
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSet => f.write_str("Not Set"),
            Self::Index(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityReport {
    /// When clear, the basic settings below are shown as the device sent
    /// them but are not checked for consistency.
    pub basic_settings_valid: bool,
    pub secure_state: SecureState,
    pub debug_mode: DebugMode,
    pub jtag_lock_after_reset: u8,
    pub jtag_lock_after_bl1: u8,
    pub jtag_bl1_unlock_allowed: u8,
    pub jtag_post_bl1_unlock_allowed: u8,
    /// Rate in MHz, or the reason the device's index could not be mapped.
    pub spi_clock_rate_mhz: Result<&'static str, FormatError>,
    pub i2c_recovery_tmo: u32,
    pub i2c_port: u8,
    pub i2c_addr: u8,
    pub i2c_cmd_map: u32,
    pub public_key_exponent: Flagged<u32>,
    pub public_key_num: Flagged<u32>,
    pub public_key_ver: Flagged<KeyVersion>,
    /// Key material for the declared entries only.
    pub keys: Vec<KmskEntry>,
    /// Set if the device declared more entries than it supplied.
    pub key_count_error: Option<FormatError>,
}

impl SecurityReport {
    /// Every inconsistency found while building the report. Basic settings
    /// the device marked invalid are not held against it.
    pub fn problems(&self) -> impl Iterator<Item = FormatError> + '_ {
        let spi_rate =
            self.spi_clock_rate_mhz.err().filter(|_| self.basic_settings_valid);
        spi_rate.into_iter().chain(self.key_count_error)
    }
}

/// Build a report from a raw snapshot.
///
/// Never fails: values we can't interpret are reported as such rather than
/// guessed at, so an operator always gets to see what the device said.
pub fn build_report(config: &SecurityConfig) -> SecurityReport {
    let declared = config.public_key_num;
    let available = config.public_key.len();
    let declared_len = usize::try_from(declared).unwrap_or(usize::MAX);
    let key_count_error = (declared_len > available)
        .then_some(FormatError::KeyCount { declared, available });

    SecurityReport {
        basic_settings_valid: config.basic_setting_valid,
        secure_state: SecureState::from_raw(config.secure_state),
        debug_mode: DebugMode::from_raw(config.debug_mode),
        jtag_lock_after_reset: config.jtag_lock_after_reset,
        jtag_lock_after_bl1: config.jtag_lock_after_bl1,
        jtag_bl1_unlock_allowed: config.jtag_bl1_unlock_allowed,
        jtag_post_bl1_unlock_allowed: config.jtag_post_bl1_unlock_allowed,
        spi_clock_rate_mhz: spi_clock_rate_mhz(config.spi_clk_rate),
        i2c_recovery_tmo: config.i2c_recovery_tmo,
        i2c_port: config.i2c_port,
        i2c_addr: config.i2c_addr,
        i2c_cmd_map: config.i2c_cmd_map,
        public_key_exponent: Flagged {
            value: config.public_key_exponent,
            valid: config.public_key_exp_valid,
        },
        public_key_num: Flagged {
            value: declared,
            valid: config.public_key_num_valid,
        },
        public_key_ver: Flagged {
            value: KeyVersion::from_raw(config.public_key_ver),
            valid: config.public_key_ver_valid,
        },
        keys: config.public_key[..declared_len.min(available)].to_vec(),
        key_count_error,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecuritySection {
    /// The device does not expose its security configuration in this phase.
    Unavailable { phase: BootPhase },
    Available(SecurityReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoReport {
    pub phase: BootPhase,
    pub serial_version: SerialVersionInfo,
    pub security: SecuritySection,
}

/// Gather everything `info` shows.
///
/// In BL2 the security configuration is not queried at all; the report
/// carries the serial and version counters and marks the rest unavailable.
pub async fn info<D: MfgDevice + ?Sized>(
    dev: &D,
    log: &Logger,
) -> Result<InfoReport, QueryError> {
    let phase = current_phase(dev, log).await?;
    let serial_version = dev.query_serial_version_info().await?;
    debug!(log, "queried serial and version info"; "info" => ?serial_version);

    if phase == BootPhase::Bl2 {
        info!(log, "security configuration unavailable in BL2");
        return Ok(InfoReport {
            phase,
            serial_version,
            security: SecuritySection::Unavailable { phase },
        });
    }

    let config = dev.query_security_config().await?;
    let report = build_report(&config);
    for problem in report.problems() {
        info!(
            log, "inconsistent security configuration";
            "problem" => %problem,
        );
    }

    Ok(InfoReport {
        phase,
        serial_version,
        security: SecuritySection::Available(report),
    })
}
