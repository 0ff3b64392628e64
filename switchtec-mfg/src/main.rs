// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use mfg_comms::error::DeviceError;
use mfg_comms::error::ErrorKind;
use mfg_comms::error::ExecError;
use mfg_comms::error::FormatError;
use mfg_comms::error::MailboxError;
use mfg_comms::error::PhaseError;
use mfg_comms::error::QueryError;
use mfg_comms::error::SelectError;
use mfg_comms::error::StateFileError;
use mfg_comms::AssumeYes;
use mfg_comms::Confirm;
use mfg_comms::MfgDevice;
use mfg_comms::PartialIndex;
use mfg_comms::SecuritySection;
use mfg_comms::SimulatedDevice;
use mfg_comms::DEFAULT_MAILBOX_FILE;
use serde_json::json;
use slog::debug;
use slog::o;
use slog::Drain;
use slog::Fuse;
use slog::Level;
use slog::Logger;
use slog_async::AsyncGuard;
use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;
use std::path::PathBuf;

mod prompt;
mod render;

use prompt::TerminalConfirm;

/// Manufacturing and provisioning commands for a fabric switch.
#[derive(Parser, Debug)]
struct Args {
    #[clap(
        short,
        long,
        default_value = "warn",
        value_parser = level_from_str,
        help = "Log level: {off,critical,error,warn,info,debug,trace}",
    )]
    log_level: Level,

    /// Write logs to a file instead of stderr.
    #[clap(long)]
    logfile: Option<PathBuf>,

    /// Emit parseable JSON on stdout instead of human-readable text.
    #[clap(long, value_name = "STYLE")]
    json: Option<Option<JsonStyle>>,

    /// Device state file of the switch to operate on.
    ///
    /// The state is read before the command runs and written back afterwards,
    /// so later invocations see the effect of earlier ones.
    #[clap(long, env = "SWITCHTEC_MFG_DEVICE")]
    device: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

fn level_from_str(s: &str) -> Result<Level> {
    s.parse().map_err(|()| anyhow!("unknown log level {s:?}"))
}

/// Layout of `--json` output; compact when no style is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum JsonStyle {
    Pretty,
}

#[derive(Subcommand, Debug, Clone)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Ping firmware and get current boot phase.
    Ping,

    /// Display security settings.
    ///
    /// The detailed security configuration is only available in BL1 and Main
    /// Firmware; in BL2 only the serial number and secure versions are shown.
    Info {
        /// Fail if the device reports values outside the known tables instead
        /// of displaying them as invalid.
        #[clap(long)]
        strict: bool,
    },

    /// Retrieve mailbox logs.
    Mailbox {
        /// File to write the mailbox log to.
        #[clap(default_value = DEFAULT_MAILBOX_FILE)]
        file: PathBuf,
    },

    /// Display active image list (BL1 only).
    ImageList,

    /// Select active image index (BL1 only).
    ///
    /// Selectors that are not given keep their current value on the device.
    ImageSelect {
        /// Active image index for BL2
        #[clap(short, long)]
        bl2: Option<u8>,
        /// Active image index for FIRMWARE
        #[clap(short = 'm', long)]
        firmware: Option<u8>,
        /// Active image index for CONFIG
        #[clap(short, long)]
        config: Option<u8>,
        /// Active image index for KEY MANIFEST
        #[clap(short, long)]
        keyman: Option<u8>,
    },

    /// Resume device boot process (BL1 and BL2 only).
    ///
    /// A normal device boot process includes BL1, BL2 and Main Firmware boot
    /// phases. In the case when boot process is paused at BL1 or BL2 phase
    /// (due to boot failure or BOOT_RECOVERY PIN[0:1] being set to LOW),
    /// sending this command requests device to try resuming normal boot
    /// process.
    ///
    /// NOTE: if your system does not support hotplug, your device might not be
    /// immediately accessible after normal boot process. In this case, be sure
    /// to reboot your system after sending this command.
    BootResume {
        /// Assume yes when prompted.
        #[clap(short, long)]
        yes: bool,
    },
}

/// Formats records through `decorator` on a background thread. Dropping the
/// guard flushes whatever is still queued.
fn async_drain<D>(
    decorator: D,
    level: Level,
) -> (Fuse<slog_async::Async>, AsyncGuard)
where
    D: slog_term::Decorator + Send + 'static,
{
    let format = slog_term::FullFormat::new(decorator).build();
    let (drain, guard) =
        slog_async::Async::new(format.filter_level(level).fuse())
            .build_with_guard();
    (drain.fuse(), guard)
}

/// Log to `logfile` when one is given, else to the terminal on stderr.
fn build_logger(
    level: Level,
    logfile: Option<&Path>,
) -> Result<(Logger, AsyncGuard)> {
    let (drain, guard) = match logfile {
        Some(path) => {
            let file = File::create(path).with_context(|| {
                format!("cannot open log file {}", path.display())
            })?;
            async_drain(slog_term::PlainDecorator::new(file), level)
        }
        None => {
            let term = slog_term::TermDecorator::new().stderr().build();
            async_drain(term, level)
        }
    };
    let log = Logger::root(drain, o!("component" => "switchtec-mfg"));
    Ok((log, guard))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (log, log_guard) =
        build_logger(args.log_level, args.logfile.as_deref())?;

    let json = args.json;
    let code = match run(args, &log).await {
        Ok(output) => {
            print_output(output, json)?;
            0
        }
        Err(err) => {
            let kind = error_kind(&err);
            debug!(log, "command failed"; "err" => format!("{err:#}"));
            if json.is_some() {
                let kind = kind.map_or("other", <&'static str>::from);
                let value =
                    json!({ "error": format!("{err:#}"), "kind": kind });
                print_output(Output::Json(value), json)?;
            } else {
                eprintln!("Error: {err:#}");
            }
            exit_code(kind)
        }
    };

    if code != 0 {
        // Flush any buffered log messages; `process::exit` skips destructors.
        mem::drop(log_guard);
        std::process::exit(code);
    }

    Ok(())
}

/// Load the device, run one command against it, then persist its state.
async fn run(args: Args, log: &Logger) -> Result<Output> {
    let dev = SimulatedDevice::load(&args.device, log).await?;

    let result =
        run_command(&dev, args.command, args.json.is_some(), log).await;

    // Persist even on failure; a command can change the device before it
    // fails.
    let saved = dev.save(&args.device).await;
    let output = result?;
    saved?;
    Ok(output)
}

async fn run_command(
    dev: &dyn MfgDevice,
    command: Command,
    json: bool,
    log: &Logger,
) -> Result<Output> {
    debug!(log, "running command"; "command" => ?command);
    match command {
        Command::Ping => {
            let phase = mfg_comms::current_phase(dev, log)
                .await
                .context("mfg ping failed")?;
            if json {
                Ok(Output::Json(json!({
                    "ping": "success",
                    "phase": phase,
                    "phase_name": phase.name(),
                })))
            } else {
                Ok(Output::Lines(render::ping_lines(phase)))
            }
        }
        Command::Info { strict } => {
            let report = mfg_comms::info(dev, log).await?;
            if strict {
                if let SecuritySection::Available(security) = &report.security
                {
                    if let Some(problem) = security.problems().next() {
                        return Err(problem).context(
                            "device security configuration is inconsistent",
                        );
                    }
                }
            }
            if json {
                Ok(Output::Json(serde_json::to_value(&report)?))
            } else {
                Ok(Output::Lines(render::info_lines(&report)))
            }
        }
        Command::Mailbox { file } => {
            let bytes = mfg_comms::save_mailbox(dev, &file, log).await?;
            if json {
                Ok(Output::Json(json!({ "path": file, "bytes": bytes })))
            } else {
                eprintln!("\nLog saved to {}.", file.display());
                Ok(Output::Lines(Vec::new()))
            }
        }
        Command::ImageList => {
            let index = mfg_comms::image_list(dev, log).await?;
            if json {
                Ok(Output::Json(serde_json::to_value(index)?))
            } else {
                Ok(Output::Lines(render::image_list_lines(&index)))
            }
        }
        Command::ImageSelect { bl2, firmware, config, keyman } => {
            let overrides = PartialIndex {
                bl2,
                firmware,
                config,
                key_manifest: keyman,
            };
            let submitted = mfg_comms::select(dev, overrides, log).await?;
            if json {
                Ok(Output::Json(json!({ "submitted": submitted })))
            } else {
                Ok(Output::Lines(Vec::new()))
            }
        }
        Command::BootResume { yes } => {
            let mut confirm: Box<dyn Confirm> = if yes {
                Box::new(AssumeYes)
            } else {
                Box::new(TerminalConfirm::stdio())
            };
            mfg_comms::boot_resume(dev, confirm.as_mut(), log).await?;
            if json {
                Ok(Output::Json(json!({ "boot_resume": "requested" })))
            } else {
                Ok(Output::Lines(Vec::new()))
            }
        }
    }
}

/// Find the most specific classification anywhere in `err`'s chain.
fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<QueryError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<SelectError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<ExecError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<MailboxError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<PhaseError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<FormatError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<StateFileError>() {
            Some(err.kind())
        } else {
            cause.downcast_ref::<DeviceError>().map(DeviceError::kind)
        }
    })
}

/// Process exit code for a failed command. Codes are distinct per kind and
/// carry no other meaning.
fn exit_code(kind: Option<ErrorKind>) -> i32 {
    match kind {
        None | Some(ErrorKind::Io) => 1,
        Some(ErrorKind::DeviceQuery) => 10,
        Some(ErrorKind::ActionFailed) => 11,
        Some(ErrorKind::WrongPhase) => 20,
        Some(ErrorKind::NoFieldsSpecified) => 21,
        Some(ErrorKind::OutOfRange) => 22,
        Some(ErrorKind::Format) => 23,
        Some(ErrorKind::UserAborted) => 30,
    }
}

fn print_output(
    output: Output,
    json: Option<Option<JsonStyle>>,
) -> Result<()> {
    match (output, json) {
        (Output::Json(value), Some(Some(JsonStyle::Pretty))) => {
            serde_json::to_writer_pretty(io::stdout().lock(), &value)
                .context("failed to write to stdout")?;
            println!();
        }
        (Output::Json(value), _) => {
            serde_json::to_writer(io::stdout().lock(), &value)
                .context("failed to write to stdout")?;
            println!();
        }
        (Output::Lines(lines), _) => {
            for line in lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}

enum Output {
    Json(serde_json::Value),
    Lines(Vec<String>),
}
