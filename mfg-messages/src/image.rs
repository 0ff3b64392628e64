// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;
use serde::Deserialize;
use serde::Serialize;
use serde_repr::Deserialize_repr;
use serde_repr::Serialize_repr;

/// One of the two stored copies of an image.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum ImageSlot {
    Zero = 0,
    One = 1,
}

impl TryFrom<u8> for ImageSlot {
    /// The rejected value.
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            _ => Err(value),
        }
    }
}

impl From<ImageSlot> for u8 {
    fn from(slot: ImageSlot) -> Self {
        slot as u8
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Image category with its own active slot selector.
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
)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Bl2,
    Firmware,
    Config,
    KeyManifest,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bl2 => "BL2",
            Self::Firmware => "FIRMWARE",
            Self::Config => "CONFIG",
            Self::KeyManifest => "KEY MANIFEST",
        })
    }
}

/// Active slot selectors for all four image categories.
///
/// A `None` selector means "not set": in a request, the device leaves that
/// category's active slot as it is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct ActiveImageIndex {
    pub bl2: Option<ImageSlot>,
    pub firmware: Option<ImageSlot>,
    pub config: Option<ImageSlot>,
    pub key_manifest: Option<ImageSlot>,
}

impl ActiveImageIndex {
    /// An index with every selector unset.
    pub const NOT_SET: Self =
        Self { bl2: None, firmware: None, config: None, key_manifest: None };

    pub fn get(&self, kind: ImageKind) -> Option<ImageSlot> {
        match kind {
            ImageKind::Bl2 => self.bl2,
            ImageKind::Firmware => self.firmware,
            ImageKind::Config => self.config,
            ImageKind::KeyManifest => self.key_manifest,
        }
    }

    pub fn set(&mut self, kind: ImageKind, slot: Option<ImageSlot>) {
        let field = match kind {
            ImageKind::Bl2 => &mut self.bl2,
            ImageKind::Firmware => &mut self.firmware,
            ImageKind::Config => &mut self.config,
            ImageKind::KeyManifest => &mut self.key_manifest,
        };
        *field = slot;
    }

    /// True if no selector is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::NOT_SET
    }

    /// Overwrite the selectors that are set in `update`, keeping the rest.
    pub fn apply(&mut self, update: &ActiveImageIndex) {
        self.bl2 = update.bl2.or(self.bl2);
        self.firmware = update.firmware.or(self.firmware);
        self.config = update.config.or(self.config);
        self.key_manifest = update.key_manifest.or(self.key_manifest);
    }
}
