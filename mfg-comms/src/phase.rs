// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot phase queries and gating.

use crate::error::DeviceError;
use crate::error::PhaseError;
use crate::MfgDevice;
use mfg_messages::BootPhase;
use mfg_messages::PhaseSet;
use slog::debug;
use slog::warn;
use slog::Logger;

/// Phases in which the active image index may be read or changed.
pub const IMAGE_PHASES: PhaseSet = PhaseSet::BL1;

/// Phases in which a paused boot may be resumed.
pub const BOOT_RESUME_PHASES: PhaseSet = PhaseSet::BL1.union(PhaseSet::BL2);

/// Ask the device which boot phase it is in.
///
/// The answer is never cached: the device can change phase underneath us
/// (e.g., after a boot resume), so every caller gets a fresh query.
pub async fn current_phase<D: MfgDevice + ?Sized>(
    dev: &D,
    log: &Logger,
) -> Result<BootPhase, DeviceError> {
    let phase = dev.query_boot_phase().await?;
    debug!(log, "queried boot phase"; "phase" => %phase);
    Ok(phase)
}

/// Query the boot phase once and fail unless it is one of `allowed`.
///
/// Returns the phase that was observed so callers can branch on it without a
/// second query.
pub async fn require_phase<D: MfgDevice + ?Sized>(
    dev: &D,
    allowed: PhaseSet,
    log: &Logger,
) -> Result<BootPhase, PhaseError> {
    let current = current_phase(dev, log).await.map_err(PhaseError::Query)?;
    if allowed.allows(current) {
        Ok(current)
    } else {
        warn!(
            log, "operation not permitted in current boot phase";
            "phase" => %current,
            "allowed" => %allowed,
        );
        Err(PhaseError::WrongPhase { current, allowed })
    }
}
