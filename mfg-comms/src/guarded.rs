// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Execution of operations this tool cannot undo.
//!
//! Running a guarded operation happens in two separate stages. The decision
//! stage queries the boot phase and asks a [`Confirm`] implementation whether
//! to go ahead; the execution stage runs the action exactly once, and only if
//! the decision was [`Decision::Proceed`]. Tests substitute the decision stage
//! without touching the device-mutating action.

use crate::error::DeviceError;
use crate::error::ExecError;
use crate::require_phase;
use crate::MfgDevice;
use crate::BOOT_RESUME_PHASES;
use mfg_messages::PhaseSet;
use slog::info;
use slog::warn;
use slog::Logger;
use std::future::Future;
use std::io;

/// Operator confirmation for an irreversible operation.
pub trait Confirm {
    /// Show `warning` and ask whether to continue.
    fn confirm(&mut self, warning: &str) -> io::Result<bool>;
}

/// Confirms everything without asking (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _warning: &str) -> io::Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Decline,
}

/// Static description of a guarded operation.
#[derive(Debug, Clone, Copy)]
pub struct Guard {
    /// Human-readable name used in logs and errors.
    pub name: &'static str,
    pub allowed: PhaseSet,
    /// Shown to the operator before asking for confirmation.
    pub warning: &'static str,
}

pub const BOOT_RESUME: Guard = Guard {
    name: "boot resume",
    allowed: BOOT_RESUME_PHASES,
    warning: "WARNING: if your system does not support hotplug,\n\
              your device might not be immediately accessible\n\
              after normal boot process. In this case, be sure\n\
              to reboot your system after sending this command.\n",
};

/// Decision stage: gate on the boot phase, then ask for confirmation.
pub async fn decide<D, C>(
    dev: &D,
    guard: &Guard,
    confirm: &mut C,
    log: &Logger,
) -> Result<Decision, ExecError>
where
    D: MfgDevice + ?Sized,
    C: Confirm + ?Sized,
{
    require_phase(dev, guard.allowed, log).await?;

    let confirmed =
        confirm.confirm(guard.warning).map_err(ExecError::Confirmation)?;
    if confirmed {
        Ok(Decision::Proceed)
    } else {
        Ok(Decision::Decline)
    }
}

/// Run `action` once if, and only if, the decision stage says to proceed.
pub async fn execute_guarded<D, C, F, Fut>(
    dev: &D,
    guard: &Guard,
    confirm: &mut C,
    action: F,
    log: &Logger,
) -> Result<(), ExecError>
where
    D: MfgDevice + ?Sized,
    C: Confirm + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), DeviceError>>,
{
    match decide(dev, guard, confirm, log).await? {
        Decision::Proceed => (),
        Decision::Decline => {
            warn!(log, "operator declined"; "action" => guard.name);
            return Err(ExecError::UserAborted { action: guard.name });
        }
    }

    action().await.map_err(|err| {
        warn!(
            log, "guarded action failed";
            "action" => guard.name,
            "err" => %err,
        );
        ExecError::ActionFailed { action: guard.name, err }
    })?;
    info!(log, "guarded action complete"; "action" => guard.name);

    Ok(())
}

/// Ask a device paused in BL1 or BL2 to continue its normal boot.
pub async fn boot_resume<D, C>(
    dev: &D,
    confirm: &mut C,
    log: &Logger,
) -> Result<(), ExecError>
where
    D: MfgDevice + ?Sized,
    C: Confirm + ?Sized,
{
    execute_guarded(dev, &BOOT_RESUME, confirm, || dev.resume_boot(), log)
        .await
}
