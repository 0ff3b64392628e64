// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;
use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use static_assertions::const_assert;

/// Length in bytes of a single key-manifest signing key (KMSK) entry.
pub const KMSK_LEN: usize = 64;

/// Number of KMSK entries the device can hold.
pub const KMSK_NUM: usize = 10;

const_assert!(KMSK_NUM <= u8::MAX as usize);

/// Security configuration exactly as the device reports it.
///
/// Enumerated fields are kept as raw values; interpreting them (and deciding
/// what to do with values we don't recognize) is the job of the reporter.
/// Each group of fields is guarded by its own `*_valid` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub basic_setting_valid: bool,
    pub public_key_exp_valid: bool,
    pub public_key_num_valid: bool,
    pub public_key_ver_valid: bool,

    /// Raw secure state; see [`SecureState::from_raw`].
    pub secure_state: u8,
    /// Raw JTAG/EJTAG debug mode; see [`DebugMode::from_raw`].
    pub debug_mode: u8,

    pub jtag_lock_after_reset: u8,
    pub jtag_lock_after_bl1: u8,
    pub jtag_bl1_unlock_allowed: u8,
    pub jtag_post_bl1_unlock_allowed: u8,

    /// 1-based index into the SPI clock rate table. Not trusted: the device
    /// may report anything here.
    pub spi_clk_rate: u8,

    /// I2C recovery timeout, in seconds.
    pub i2c_recovery_tmo: u32,
    pub i2c_port: u8,
    /// 7-bit I2C address.
    pub i2c_addr: u8,
    pub i2c_cmd_map: u32,

    pub public_key_exponent: u32,
    /// Number of populated entries in `public_key`.
    pub public_key_num: u32,
    /// Currently selected KMSK index; 0 means none has been set.
    pub public_key_ver: u32,

    /// Backing storage for KMSK entries. Only the first `public_key_num`
    /// entries hold key material; anything after that is unspecified.
    pub public_key: Vec<KmskEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecureState {
    UninitializedUnsecured,
    InitializedUnsecured,
    InitializedSecured,
    Unsupported,
}

impl SecureState {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::UninitializedUnsecured,
            1 => Self::InitializedUnsecured,
            2 => Self::InitializedSecured,
            _ => Self::Unsupported,
        }
    }
}

impl fmt::Display for SecureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UninitializedUnsecured => "UNINITIALIZED_UNSECURED",
            Self::InitializedUnsecured => "INITIALIZED_UNSECURED",
            Self::InitializedSecured => "INITIALIZED_SECURED",
            Self::Unsupported => "Unsupported State",
        })
    }
}

/// JTAG/EJTAG debug policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugMode {
    AlwaysEnabled,
    DisabledButUnlockable,
    AlwaysDisabled,
    Unsupported,
}

impl DebugMode {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::AlwaysEnabled,
            1 => Self::DisabledButUnlockable,
            2 => Self::AlwaysDisabled,
            _ => Self::Unsupported,
        }
    }
}

impl fmt::Display for DebugMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlwaysEnabled => "Always Enabled",
            Self::DisabledButUnlockable => {
                "Disabled by Default But Can Be Enabled"
            }
            Self::AlwaysDisabled => "Always Disabled",
            Self::Unsupported => "Unsupported State",
        })
    }
}

/// A single KMSK fingerprint.
///
/// Serialized as a hex string so device state files stay readable.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KmskEntry(pub [u8; KMSK_LEN]);

impl KmskEntry {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for KmskEntry {
    fn default() -> Self {
        Self([0; KMSK_LEN])
    }
}

impl fmt::Debug for KmskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KmskEntry({})", self.to_hex())
    }
}

impl Serialize for KmskEntry {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for KmskEntry {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        let mut out = [0; KMSK_LEN];
        hex::decode_to_slice(&s, &mut out).map_err(|err| {
            D::Error::custom(format!("invalid KMSK entry {s:?}: {err}"))
        })?;
        Ok(Self(out))
    }
}

/// Chip serial number and anti-rollback counters.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct SerialVersionInfo {
    pub chip_serial: u32,
    /// Key manifest secure version.
    pub ver_km: u32,
    pub ver_bl2: u32,
    /// Main firmware secure version.
    pub ver_main: u32,
    pub ver_sec_unlock: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_raw_states_are_unsupported() {
        for raw in 3..=u8::MAX {
            assert_eq!(SecureState::from_raw(raw), SecureState::Unsupported);
            assert_eq!(DebugMode::from_raw(raw), DebugMode::Unsupported);
        }
        assert_eq!(SecureState::from_raw(2), SecureState::InitializedSecured);
        assert_eq!(DebugMode::from_raw(1), DebugMode::DisabledButUnlockable);
    }

    #[test]
    fn kmsk_entry_rejects_short_hex() {
        let err = serde_json::from_str::<KmskEntry>("\"abcd\"").unwrap_err();
        assert!(err.to_string().contains("invalid KMSK entry"), "{err}");
    }
}
