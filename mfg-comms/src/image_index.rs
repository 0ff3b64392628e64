// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading and changing which stored image copy is active.

use crate::error::QueryError;
use crate::error::SelectError;
use crate::require_phase;
use crate::MfgDevice;
use crate::IMAGE_PHASES;
use mfg_messages::ActiveImageIndex;
use mfg_messages::ImageKind;
use mfg_messages::ImageSlot;
use slog::debug;
use slog::info;
use slog::warn;
use slog::Logger;

/// Operator-supplied selector overrides, not yet validated.
///
/// `None` leaves the corresponding selector unchanged on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialIndex {
    pub bl2: Option<u8>,
    pub firmware: Option<u8>,
    pub config: Option<u8>,
    pub key_manifest: Option<u8>,
}

impl PartialIndex {
    /// Fields in the order they are validated.
    fn fields(&self) -> [(ImageKind, Option<u8>); 4] {
        [
            (ImageKind::Bl2, self.bl2),
            (ImageKind::Firmware, self.firmware),
            (ImageKind::Config, self.config),
            (ImageKind::KeyManifest, self.key_manifest),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }

    /// Check every set field is a valid slot, reporting the first that isn't.
    fn validate(&self) -> Result<ActiveImageIndex, SelectError> {
        let mut index = ActiveImageIndex::NOT_SET;
        for (kind, value) in self.fields() {
            let slot = value
                .map(|value| {
                    ImageSlot::try_from(value).map_err(|value| {
                        SelectError::OutOfRange { kind, value }
                    })
                })
                .transpose()?;
            index.set(kind, slot);
        }
        Ok(index)
    }
}

/// Change the active image index.
///
/// Checks run in a fixed order, and nothing is sent to the device until all
/// of them pass:
///
/// 1. at least one selector is set
/// 2. the device is in BL1
/// 3. every set selector is 0 or 1
///
/// All four selectors go to the device in a single request. Returns the index
/// that was submitted.
pub async fn select<D: MfgDevice + ?Sized>(
    dev: &D,
    overrides: PartialIndex,
    log: &Logger,
) -> Result<ActiveImageIndex, SelectError> {
    if overrides.is_empty() {
        warn!(log, "image select requested with no selectors set");
        return Err(SelectError::NoFieldsSpecified);
    }

    require_phase(dev, IMAGE_PHASES, log).await?;

    let index = overrides.validate().map_err(|err| {
        warn!(log, "rejecting image select"; "err" => %err);
        err
    })?;

    dev.submit_active_image_index(index).await.map_err(|err| {
        warn!(log, "device rejected active image index"; "err" => %err);
        SelectError::Submit(err)
    })?;
    info!(log, "active image index updated"; "index" => ?index);

    Ok(index)
}

/// Read the active image index (BL1 only).
pub async fn image_list<D: MfgDevice + ?Sized>(
    dev: &D,
    log: &Logger,
) -> Result<ActiveImageIndex, QueryError> {
    require_phase(dev, IMAGE_PHASES, log).await?;
    let index = dev.query_active_image_index().await?;
    debug!(log, "queried active image index"; "index" => ?index);
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::error::PhaseError;
    use crate::test_util::test_log;
    use crate::DeviceOp;
    use crate::DeviceState;
    use crate::SimulatedDevice;
    use mfg_messages::BootPhase;
    use strum::IntoEnumIterator;

    fn with_field(kind: ImageKind, value: u8) -> PartialIndex {
        let mut overrides = PartialIndex::default();
        let field = match kind {
            ImageKind::Bl2 => &mut overrides.bl2,
            ImageKind::Firmware => &mut overrides.firmware,
            ImageKind::Config => &mut overrides.config,
            ImageKind::KeyManifest => &mut overrides.key_manifest,
        };
        *field = Some(value);
        overrides
    }

    fn device_in(phase: BootPhase) -> SimulatedDevice {
        SimulatedDevice::new(DeviceState::in_phase(phase), &test_log())
    }

    #[tokio::test]
    async fn nothing_set_never_reaches_device() {
        let log = test_log();
        for phase in BootPhase::iter() {
            let dev = device_in(phase);
            let err = select(&dev, PartialIndex::default(), &log)
                .await
                .unwrap_err();
            assert!(matches!(err, SelectError::NoFieldsSpecified));
            assert_eq!(err.kind(), ErrorKind::NoFieldsSpecified);
            assert_eq!(dev.total_calls().await, 0);
        }
    }

    #[tokio::test]
    async fn wrong_phase_rejected_before_submission() {
        let log = test_log();
        for phase in BootPhase::iter().filter(|p| *p != BootPhase::Bl1) {
            for kind in ImageKind::iter() {
                for value in [0, 1] {
                    let dev = device_in(phase);
                    let err = select(&dev, with_field(kind, value), &log)
                        .await
                        .unwrap_err();
                    assert!(
                        matches!(
                            err,
                            SelectError::Phase(PhaseError::WrongPhase {
                                current,
                                ..
                            }) if current == phase
                        ),
                        "unexpected error in {phase}: {err}"
                    );
                    assert_eq!(
                        dev.calls(DeviceOp::SubmitActiveImageIndex).await,
                        0
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn phase_checked_before_range() {
        let log = test_log();
        let dev = device_in(BootPhase::MainFirmware);
        let err = select(&dev, with_field(ImageKind::Config, 7), &log)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongPhase);
    }

    #[tokio::test]
    async fn each_field_range_checked_independently() {
        let log = test_log();
        for kind in ImageKind::iter() {
            for value in 2..=u8::MAX {
                // Other fields hold valid values; only `kind` is bad.
                let mut overrides = PartialIndex {
                    bl2: Some(0),
                    firmware: Some(1),
                    config: Some(0),
                    key_manifest: Some(1),
                };
                let bad = with_field(kind, value);
                overrides.bl2 = bad.bl2.or(overrides.bl2);
                overrides.firmware = bad.firmware.or(overrides.firmware);
                overrides.config = bad.config.or(overrides.config);
                overrides.key_manifest =
                    bad.key_manifest.or(overrides.key_manifest);

                let dev = device_in(BootPhase::Bl1);
                let err = select(&dev, overrides, &log).await.unwrap_err();
                match err {
                    SelectError::OutOfRange { kind: k, value: v } => {
                        assert_eq!((k, v), (kind, value));
                    }
                    other => panic!("unexpected error {other}"),
                }
                assert_eq!(
                    dev.calls(DeviceOp::SubmitActiveImageIndex).await,
                    0
                );
            }
        }
    }

    #[tokio::test]
    async fn first_bad_field_is_reported() {
        let log = test_log();
        let dev = device_in(BootPhase::Bl1);
        let overrides = PartialIndex {
            bl2: None,
            firmware: Some(4),
            config: Some(9),
            key_manifest: Some(0),
        };
        let err = select(&dev, overrides, &log).await.unwrap_err();
        assert!(matches!(
            err,
            SelectError::OutOfRange { kind: ImageKind::Firmware, value: 4 }
        ));
        assert_eq!(
            err.to_string(),
            "active index of FIRMWARE must be within 0-1 (got 4)"
        );
    }

    #[tokio::test]
    async fn unset_selectors_keep_device_values() {
        let log = test_log();
        let dev = device_in(BootPhase::Bl1);
        let before = dev.state().await.active_index;

        let submitted = select(
            &dev,
            PartialIndex { config: Some(1), ..Default::default() },
            &log,
        )
        .await
        .unwrap();
        assert_eq!(
            submitted,
            ActiveImageIndex {
                config: Some(ImageSlot::One),
                ..ActiveImageIndex::NOT_SET
            }
        );

        let after = dev.state().await.active_index;
        assert_eq!(after.config, Some(ImageSlot::One));
        assert_eq!(after.bl2, before.bl2);
        assert_eq!(after.firmware, before.firmware);
        assert_eq!(after.key_manifest, before.key_manifest);
        assert_eq!(dev.calls(DeviceOp::SubmitActiveImageIndex).await, 1);
    }

    #[tokio::test]
    async fn repeated_full_selection_is_idempotent() {
        let log = test_log();
        let dev = device_in(BootPhase::Bl1);
        let overrides = PartialIndex {
            bl2: Some(1),
            firmware: Some(0),
            config: Some(1),
            key_manifest: Some(0),
        };

        select(&dev, overrides, &log).await.unwrap();
        let first = image_list(&dev, &log).await.unwrap();
        select(&dev, overrides, &log).await.unwrap();
        let second = image_list(&dev, &log).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            second,
            ActiveImageIndex {
                bl2: Some(ImageSlot::One),
                firmware: Some(ImageSlot::Zero),
                config: Some(ImageSlot::One),
                key_manifest: Some(ImageSlot::Zero),
            }
        );
    }

    #[tokio::test]
    async fn device_rejection_is_action_failure() {
        let log = test_log();
        let dev = device_in(BootPhase::Bl1);
        dev.fail_next(DeviceOp::SubmitActiveImageIndex, 0x1f).await;

        let err = select(
            &dev,
            PartialIndex { bl2: Some(0), ..Default::default() },
            &log,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionFailed);
        assert!(matches!(err, SelectError::Submit(_)));
    }

    #[tokio::test]
    async fn image_list_is_bl1_only() {
        let log = test_log();
        let dev = device_in(BootPhase::Bl2);
        let err = image_list(&dev, &log).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongPhase);
        assert_eq!(dev.calls(DeviceOp::QueryActiveImageIndex).await, 0);
    }
}
