// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Human-readable output.

use mfg_comms::Flagged;
use mfg_comms::InfoReport;
use mfg_comms::SecurityReport;
use mfg_comms::SecuritySection;
use mfg_messages::ActiveImageIndex;
use mfg_messages::BootPhase;
use mfg_messages::ImageKind;
use mfg_messages::ImageSlot;

fn validity(valid: bool) -> &'static str {
    if valid {
        "(Valid)"
    } else {
        "(Invalid)"
    }
}

fn flagged_label<T>(label: &str, flagged: &Flagged<T>) -> String {
    format!("{label} {}:", validity(flagged.valid))
}

fn row(label: &str, value: impl std::fmt::Display) -> String {
    format!("{label:<40}{value}")
}

pub(crate) fn ping_lines(phase: BootPhase) -> Vec<String> {
    vec![
        row("Mfg Ping:", "SUCCESS"),
        row("Current Boot Phase:", phase.name()),
    ]
}

pub(crate) fn info_lines(report: &InfoReport) -> Vec<String> {
    let sv = &report.serial_version;
    let mut lines = vec![
        row("Current Boot Phase:", report.phase.name()),
        row("Chip Serial:", format_args!("{:#010x}", sv.chip_serial)),
        row(
            "Key Manifest Secure Version:",
            format_args!("{:#010x}", sv.ver_km),
        ),
        row("BL2 Secure Version:", format_args!("{:#010x}", sv.ver_bl2)),
        row("Main Secure Version:", format_args!("{:#010x}", sv.ver_main)),
        row(
            "Secure Unlock Version:",
            format_args!("{:#010x}", sv.ver_sec_unlock),
        ),
    ];

    match &report.security {
        SecuritySection::Unavailable { .. } => {
            lines.push(String::new());
            lines.push(
                "Other secure settings are only shown in BL1 or Main \
                 Firmware phase."
                    .to_string(),
            );
        }
        SecuritySection::Available(security) => {
            lines.push(String::new());
            security_lines(security, &mut lines);
        }
    }
    lines
}

fn security_lines(report: &SecurityReport, lines: &mut Vec<String>) {
    lines.push(format!(
        "Basic Secure Settings {}",
        validity(report.basic_settings_valid)
    ));

    let indented = |label: &str, value: &dyn std::fmt::Display| {
        format!("    {}", row(label, value))
    };
    lines.push(indented("Secure State:", &report.secure_state));
    lines.push(indented("JTAG/EJTAG Debug State:", &report.debug_mode));
    lines.push(indented(
        "JTAG/EJTAG State After Reset:",
        &report.jtag_lock_after_reset,
    ));
    lines.push(indented(
        "JTAG/EJTAG State After BL1:",
        &report.jtag_lock_after_bl1,
    ));
    lines.push(indented(
        "JTAG/EJTAG Unlock IN BL1:",
        &report.jtag_bl1_unlock_allowed,
    ));
    lines.push(indented(
        "JTAG/EJTAG Unlock AFTER BL1:",
        &report.jtag_post_bl1_unlock_allowed,
    ));
    let spi_rate = match report.spi_clock_rate_mhz {
        Ok(mhz) => format!("{mhz} MHz"),
        Err(err) => format!("invalid ({err})"),
    };
    lines.push(indented("SPI Clock Rate:", &spi_rate));
    lines.push(indented(
        "I2C Recovery TMO:",
        &format_args!("{} Second(s)", report.i2c_recovery_tmo),
    ));
    lines.push(indented("I2C Port:", &report.i2c_port));
    lines.push(indented(
        "I2C Address (7-bits):",
        &format_args!("{:#04x}", report.i2c_addr),
    ));
    lines.push(indented(
        "I2C Command Map:",
        &format_args!("{:#010x}", report.i2c_cmd_map),
    ));
    lines.push(String::new());

    let exp = &report.public_key_exponent;
    lines.push(row(
        &flagged_label("Exponent Hex Data", exp),
        format_args!("{:#010x}", exp.value),
    ));
    let num = &report.public_key_num;
    lines.push(row(&flagged_label("KMSK Entry Number", num), num.value));
    let ver = &report.public_key_ver;
    lines.push(row(&flagged_label("Current KMSK index", ver), ver.value));
    for (i, key) in report.keys.iter().enumerate() {
        lines.push(format!("KMSK Entry {}:  {}", i + 1, key.to_hex()));
    }
    if let Some(err) = &report.key_count_error {
        lines.push(format!("Warning: {err}"));
    }
}

pub(crate) fn image_list_lines(index: &ActiveImageIndex) -> Vec<String> {
    let slot = |slot: Option<ImageSlot>| match slot {
        Some(slot) => slot.to_string(),
        None => "not set".to_string(),
    };
    let mut lines = vec![format!("{:<16}INDEX", "IMAGE")];
    for (label, kind) in [
        ("Key Manifest", ImageKind::KeyManifest),
        ("BL2", ImageKind::Bl2),
        ("Config", ImageKind::Config),
        ("Firmware", ImageKind::Firmware),
    ] {
        lines.push(format!("{label:<16}{}", slot(index.get(kind))));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfg_comms::build_report;
    use mfg_comms::DeviceState;

    #[test]
    fn ping_reports_phase_name() {
        let lines = ping_lines(BootPhase::MainFirmware);
        assert!(lines[0].ends_with("SUCCESS"));
        assert!(lines[1].ends_with("Main Firmware"));
    }

    #[test]
    fn info_in_bl2_has_note_instead_of_security() {
        let state = DeviceState::in_phase(BootPhase::Bl2);
        let report = InfoReport {
            phase: BootPhase::Bl2,
            serial_version: state.serial_version,
            security: SecuritySection::Unavailable { phase: BootPhase::Bl2 },
        };
        let lines = info_lines(&report);
        assert!(lines.iter().any(|l| l.starts_with("Other secure settings")));
        assert!(!lines.iter().any(|l| l.starts_with("Basic Secure Settings")));
    }

    #[test]
    fn info_renders_only_declared_keys() {
        let state = DeviceState::in_phase(BootPhase::Bl1);
        let security = build_report(&state.security_config);
        let report = InfoReport {
            phase: BootPhase::Bl1,
            serial_version: state.serial_version,
            security: SecuritySection::Available(security),
        };
        let lines = info_lines(&report);
        let keys =
            lines.iter().filter(|l| l.starts_with("KMSK Entry ")).count();
        // One "KMSK Entry Number" line plus one per declared key.
        assert_eq!(keys, 1 + state.security_config.public_key_num as usize);
        assert!(lines.iter().any(|l| l.ends_with("0x5a3c0f12")));
    }

    #[test]
    fn invalid_spi_rate_is_shown_not_hidden() {
        let mut config = DeviceState::in_phase(BootPhase::Bl1).security_config;
        config.spi_clk_rate = 11;
        let mut lines = Vec::new();
        security_lines(&build_report(&config), &mut lines);
        assert!(lines
            .iter()
            .any(|l| l.contains("SPI Clock Rate:") && l.contains("invalid")));
    }

    #[test]
    fn image_list_marks_unset_selectors() {
        let index = ActiveImageIndex {
            bl2: Some(ImageSlot::One),
            ..ActiveImageIndex::NOT_SET
        };
        let lines = image_list_lines(&index);
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("BL2") && lines[2].ends_with('1'));
        assert!(lines[4].ends_with("not set"));
    }
}
