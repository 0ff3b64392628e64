// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extracting the device's mailbox log.

use crate::error::MailboxError;
use crate::MfgDevice;
use slog::debug;
use slog::info;
use slog::warn;
use slog::Logger;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

pub const DEFAULT_MAILBOX_FILE: &str = "switchtec_mailbox.log";

/// Drain the mailbox log into `sink`.
///
/// The sink is owned for the duration of the call and dropped before this
/// returns, whether the extraction succeeded or not. Returns the number of
/// bytes written.
pub async fn drain_mailbox<D, W>(
    dev: &D,
    mut sink: W,
    log: &Logger,
) -> Result<u64, MailboxError>
where
    D: MfgDevice + ?Sized,
    W: Write + Send,
{
    let written = dev.drain_mailbox_to(&mut sink).await.map_err(|err| {
        warn!(log, "mailbox extraction failed"; "err" => %err);
        MailboxError::Drain(err)
    })?;
    sink.flush().map_err(MailboxError::Flush)?;
    debug!(log, "drained mailbox log"; "bytes" => written);
    Ok(written)
}

/// Drain the mailbox log into a newly created (or truncated) file at `path`.
pub async fn save_mailbox<D: MfgDevice + ?Sized>(
    dev: &D,
    path: &Path,
    log: &Logger,
) -> Result<u64, MailboxError> {
    let file = File::create(path).map_err(|err| MailboxError::Create {
        path: path.display().to_string(),
        err,
    })?;
    let written = drain_mailbox(dev, BufWriter::new(file), log).await?;
    info!(
        log, "mailbox log saved";
        "path" => %path.display(),
        "bytes" => written,
    );
    Ok(written)
}
