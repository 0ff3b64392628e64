// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mfg_comms::Confirm;
use std::io;
use std::io::BufRead;
use std::io::Write;

/// Asks the operator on the terminal: warning and prompt go to stderr so they
/// never mix with command output, the answer comes from stdin.
///
/// Only `y` or `Y` proceeds. End of input counts as a decline.
pub(crate) struct TerminalConfirm<R, W> {
    input: R,
    output: W,
}

impl TerminalConfirm<io::StdinLock<'static>, io::Stderr> {
    pub(crate) fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalConfirm<R, W> {
    fn confirm(&mut self, warning: &str) -> io::Result<bool> {
        writeln!(self.output, "{warning}")?;
        write!(self.output, "Do you want to continue? [y/N] ")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            writeln!(self.output)?;
            return Ok(false);
        }
        let answer = answer.trim_end_matches(['\r', '\n']);
        Ok(matches!(answer, "y" | "Y"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfg_comms::error::ErrorKind;
    use mfg_comms::error::ExecError;
    use mfg_comms::DeviceOp;
    use mfg_comms::DeviceState;
    use mfg_comms::SimulatedDevice;
    use mfg_messages::BootPhase;
    use slog::o;
    use slog::Logger;

    fn ask(input: &str) -> (io::Result<bool>, String) {
        let mut shown = Vec::new();
        let result =
            TerminalConfirm::new(input.as_bytes(), &mut shown).confirm("hot");
        (result, String::from_utf8(shown).unwrap())
    }

    #[test]
    fn only_single_y_proceeds() {
        for (input, expected) in [
            ("y\n", true),
            ("Y\r\n", true),
            ("y", true),
            ("yes\n", false),
            ("YES\n", false),
            ("  y  \n", false),
            ("\n", false),
            ("n\n", false),
        ] {
            assert_eq!(ask(input).0.unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn warning_precedes_prompt() {
        let (_, shown) = ask("n\n");
        assert_eq!(shown, "hot\nDo you want to continue? [y/N] ");
    }

    #[test]
    fn closed_stdin_declines() {
        let (result, shown) = ask("");
        assert!(!result.unwrap());
        assert!(shown.ends_with("[y/N] \n"));
    }

    /// Reads fail with an error that is not end of input.
    struct BrokenInput;

    impl io::Read for BrokenInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "tty gone"))
        }
    }

    #[test]
    fn read_errors_are_reported() {
        let mut shown = Vec::new();
        let input = io::BufReader::new(BrokenInput);
        let err =
            TerminalConfirm::new(input, &mut shown).confirm("hot").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[tokio::test]
    async fn boot_resume_without_answer_is_aborted() {
        let log = Logger::root(slog::Discard, o!());
        let dev =
            SimulatedDevice::new(DeviceState::in_phase(BootPhase::Bl2), &log);
        let mut shown = Vec::new();
        let mut confirm = TerminalConfirm::new(io::empty(), &mut shown);

        let err = mfg_comms::boot_resume(&dev, &mut confirm, &log)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::UserAborted { .. }));
        assert_eq!(err.kind(), ErrorKind::UserAborted);
        assert_eq!(dev.calls(DeviceOp::ResumeBoot).await, 0);
        assert_eq!(dev.state().await.boot_phase, BootPhase::Bl2);
    }
}
