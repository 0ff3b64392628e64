// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data types exchanged between a Switchtec-style fabric switch and the
//! manufacturing tooling that provisions it.
//!
//! Nothing in this crate talks to a device; these are the snapshots a
//! device-access layer hands back and the requests it accepts.

mod image;
mod security;

use bitflags::bitflags;
use core::fmt;
use serde::Deserialize;
use serde::Serialize;

pub use image::*;
pub use security::*;

/// Stage of device startup.
///
/// The device moves between phases on its own (e.g., after a boot resume or a
/// reset), so a `BootPhase` is only a snapshot of the moment it was queried.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BootPhase {
    Bl1,
    Bl2,
    MainFirmware,
    Unknown,
}

impl BootPhase {
    /// Interpret the raw phase ID reported by the device.
    ///
    /// IDs outside the known set are reported as [`BootPhase::Unknown`] rather
    /// than rejected; gating treats an unknown phase as legal for nothing.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Bl1,
            2 => Self::Bl2,
            3 => Self::MainFirmware,
            _ => Self::Unknown,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bl1 => "BL1",
            Self::Bl2 => "BL2",
            Self::MainFirmware => "Main Firmware",
            Self::Unknown => "Unknown Phase",
        }
    }

    /// The [`PhaseSet`] flag for this phase, if it has one.
    pub const fn flag(self) -> Option<PhaseSet> {
        match self {
            Self::Bl1 => Some(PhaseSet::BL1),
            Self::Bl2 => Some(PhaseSet::BL2),
            Self::MainFirmware => Some(PhaseSet::MAIN_FIRMWARE),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of boot phases in which an operation is legal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhaseSet: u8 {
        const BL1 = 1 << 0;
        const BL2 = 1 << 1;
        const MAIN_FIRMWARE = 1 << 2;
    }
}

impl PhaseSet {
    /// Is `phase` a member of this set? [`BootPhase::Unknown`] never is.
    pub fn allows(self, phase: BootPhase) -> bool {
        match phase.flag() {
            Some(flag) => self.contains(flag),
            None => false,
        }
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (PhaseSet::BL1, BootPhase::Bl1),
            (PhaseSet::BL2, BootPhase::Bl2),
            (PhaseSet::MAIN_FIRMWARE, BootPhase::MainFirmware),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, phase)| phase.name())
        .collect::<Vec<_>>();

        match names.as_slice() {
            [] => f.write_str("no boot phase"),
            [one] => f.write_str(one),
            [rest @ .., last] => write!(f, "{} or {last}", rest.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn raw_phase_ids() {
        assert_eq!(BootPhase::from_raw(1), BootPhase::Bl1);
        assert_eq!(BootPhase::from_raw(2), BootPhase::Bl2);
        assert_eq!(BootPhase::from_raw(3), BootPhase::MainFirmware);
        assert_eq!(BootPhase::from_raw(0), BootPhase::Unknown);
        assert_eq!(BootPhase::from_raw(0x7f), BootPhase::Unknown);
    }

    #[test]
    fn unknown_phase_is_never_allowed() {
        assert!(!PhaseSet::all().allows(BootPhase::Unknown));
        for phase in BootPhase::iter().filter(|p| *p != BootPhase::Unknown) {
            assert!(PhaseSet::all().allows(phase), "{phase} not allowed");
            assert!(!PhaseSet::empty().allows(phase));
        }
    }

    #[test]
    fn phase_set_display() {
        assert_eq!(PhaseSet::BL1.to_string(), "BL1");
        assert_eq!((PhaseSet::BL1 | PhaseSet::BL2).to_string(), "BL1 or BL2");
        assert_eq!(
            PhaseSet::all().to_string(),
            "BL1, BL2 or Main Firmware"
        );
        assert_eq!(PhaseSet::empty().to_string(), "no boot phase");
    }
}
