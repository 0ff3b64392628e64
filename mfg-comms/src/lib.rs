// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manufacturing-mode operations against a single fabric switch.
//!
//! Everything here goes through the [`MfgDevice`] trait; the crate decides
//! *whether* an operation may be sent (boot phase gating, argument
//! validation, operator confirmation) and what the answers mean, while the
//! device implementation decides *how* to reach the hardware.
//!
//! [`SimulatedDevice`] is the in-process implementation used by tests and by
//! state-file driven provisioning runs.

mod device;
mod guarded;
mod image_index;
mod mailbox;
mod phase;
mod report;
mod sim;

pub mod error;

pub use device::DeviceOp;
pub use device::MfgDevice;
pub use guarded::boot_resume;
pub use guarded::decide;
pub use guarded::execute_guarded;
pub use guarded::AssumeYes;
pub use guarded::Confirm;
pub use guarded::Decision;
pub use guarded::Guard;
pub use guarded::BOOT_RESUME;
pub use image_index::image_list;
pub use image_index::select;
pub use image_index::PartialIndex;
pub use mailbox::drain_mailbox;
pub use mailbox::save_mailbox;
pub use mailbox::DEFAULT_MAILBOX_FILE;
pub use phase::current_phase;
pub use phase::require_phase;
pub use phase::BOOT_RESUME_PHASES;
pub use phase::IMAGE_PHASES;
pub use report::build_report;
pub use report::info;
pub use report::spi_clock_rate_mhz;
pub use report::Flagged;
pub use report::InfoReport;
pub use report::KeyVersion;
pub use report::SecurityReport;
pub use report::SecuritySection;
pub use report::SPI_CLOCK_RATES_MHZ;
pub use sim::DeviceState;
pub use sim::SimulatedDevice;
