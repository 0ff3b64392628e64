// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::DeviceOp;
use mfg_messages::BootPhase;
use mfg_messages::ImageKind;
use mfg_messages::PhaseSet;
use serde::Serialize;
use slog_error_chain::SlogInlineError;
use std::io;
use thiserror::Error;

/// Coarse classification of every failure a manufacturing command can hit.
///
/// Callers use this to pick distinct process exit codes without matching on
/// each operation's error type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The device or its transport failed to answer a query.
    DeviceQuery,
    /// The device rejected (or failed to carry out) a mutation after all
    /// local checks passed.
    ActionFailed,
    WrongPhase,
    NoFieldsSpecified,
    OutOfRange,
    /// Device-reported data is inconsistent with the expected tables.
    Format,
    UserAborted,
    /// A local file or terminal operation failed.
    Io,
}

#[derive(Debug, Error, SlogInlineError)]
pub enum DeviceError {
    #[error("device returned error status {status:#x} for {op}")]
    Status { op: DeviceOp, status: u32 },
    #[error("device I/O failed during {op}")]
    Io {
        op: DeviceOp,
        #[source]
        err: io::Error,
    },
    #[error("failed writing {op} output")]
    Sink {
        op: DeviceOp,
        #[source]
        err: io::Error,
    },
}

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { .. } | Self::Io { .. } => ErrorKind::DeviceQuery,
            Self::Sink { .. } => ErrorKind::Io,
        }
    }

    pub fn op(&self) -> DeviceOp {
        match self {
            Self::Status { op, .. }
            | Self::Io { op, .. }
            | Self::Sink { op, .. } => *op,
        }
    }
}

#[derive(Debug, Error, SlogInlineError)]
pub enum PhaseError {
    #[error("failed to query boot phase")]
    Query(#[source] DeviceError),
    #[error(
        "this command is only available in {allowed} \
         (device is in {current})"
    )]
    WrongPhase { current: BootPhase, allowed: PhaseSet },
}

impl PhaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Query(_) => ErrorKind::DeviceQuery,
            Self::WrongPhase { .. } => ErrorKind::WrongPhase,
        }
    }
}

/// Failure of a read-only command.
#[derive(Debug, Error, SlogInlineError)]
pub enum QueryError {
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("device query failed")]
    Device(#[from] DeviceError),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Phase(err) => err.kind(),
            Self::Device(_) => ErrorKind::DeviceQuery,
        }
    }
}

#[derive(Debug, Error, SlogInlineError)]
pub enum SelectError {
    #[error(
        "one of BL2, Config, Key Manifest or Firmware indices must be set"
    )]
    NoFieldsSpecified,
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("active index of {kind} must be within 0-1 (got {value})")]
    OutOfRange { kind: ImageKind, value: u8 },
    #[error("failed to submit active image index")]
    Submit(#[source] DeviceError),
}

impl SelectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoFieldsSpecified => ErrorKind::NoFieldsSpecified,
            Self::Phase(err) => err.kind(),
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::Submit(_) => ErrorKind::ActionFailed,
        }
    }
}

#[derive(Debug, Error, SlogInlineError)]
pub enum ExecError {
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("failed to read operator confirmation")]
    Confirmation(#[source] io::Error),
    #[error("{action} aborted by operator")]
    UserAborted { action: &'static str },
    #[error("{action} failed")]
    ActionFailed {
        action: &'static str,
        #[source]
        err: DeviceError,
    },
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Phase(err) => err.kind(),
            Self::Confirmation(_) => ErrorKind::Io,
            Self::UserAborted { .. } => ErrorKind::UserAborted,
            Self::ActionFailed { .. } => ErrorKind::ActionFailed,
        }
    }
}

#[derive(Debug, Error, SlogInlineError)]
pub enum MailboxError {
    #[error("failed to create {path}")]
    Create {
        path: String,
        #[source]
        err: io::Error,
    },
    #[error("failed to retrieve mailbox log")]
    Drain(#[source] DeviceError),
    #[error("failed to flush mailbox log")]
    Flush(#[source] io::Error),
}

impl MailboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Create { .. } | Self::Flush(_) => ErrorKind::Io,
            Self::Drain(err) => err.kind(),
        }
    }
}

/// Device-reported data that falls outside the tables we know how to
/// interpret.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Error, SlogInlineError,
)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FormatError {
    #[error("SPI clock rate index {index} is outside of 1..={max}")]
    SpiClockRate { index: u8, max: usize },
    #[error(
        "device declares {declared} KMSK entries but only {available} \
         are present"
    )]
    KeyCount { declared: u32, available: usize },
}

impl FormatError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Format
    }
}

#[derive(Debug, Error, SlogInlineError)]
pub enum StateFileError {
    #[error("failed to read device state from {path}")]
    Read {
        path: String,
        #[source]
        err: io::Error,
    },
    #[error("failed to parse device state in {path}")]
    Parse {
        path: String,
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to serialize device state")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write device state to {path}")]
    Write {
        path: String,
        #[source]
        err: io::Error,
    },
}

impl StateFileError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}
