// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tests in this file check that the JSON form of the types stored in
//! device state files has not changed.
//!
//! If a test in this file fails, _do not change the test_! Existing state
//! files written by earlier versions of the tooling would stop loading. Revert
//! the rename or reordering instead.

use mfg_messages::ActiveImageIndex;
use mfg_messages::BootPhase;
use mfg_messages::ImageSlot;
use mfg_messages::KmskEntry;
use mfg_messages::SerialVersionInfo;
use mfg_messages::KMSK_LEN;
use serde::Serialize;

fn assert_json(expected: &str, item: &(impl Serialize + std::fmt::Debug)) {
    let json = serde_json::to_string(item).unwrap();
    assert_eq!(expected, json, "incorrect serialization of {item:?}");
}

#[test]
fn boot_phase() {
    assert_json(r#""bl1""#, &BootPhase::Bl1);
    assert_json(r#""bl2""#, &BootPhase::Bl2);
    assert_json(r#""main_firmware""#, &BootPhase::MainFirmware);
    assert_json(r#""unknown""#, &BootPhase::Unknown);
}

#[test]
fn active_image_index() {
    let index = ActiveImageIndex {
        bl2: Some(ImageSlot::One),
        firmware: None,
        config: Some(ImageSlot::Zero),
        key_manifest: None,
    };
    assert_json(
        r#"{"bl2":1,"firmware":null,"config":0,"key_manifest":null}"#,
        &index,
    );

    let parsed: ActiveImageIndex = serde_json::from_str(
        r#"{"bl2":0,"firmware":1,"config":null,"key_manifest":1}"#,
    )
    .unwrap();
    assert_eq!(parsed.bl2, Some(ImageSlot::Zero));
    assert_eq!(parsed.firmware, Some(ImageSlot::One));
    assert_eq!(parsed.config, None);
    assert_eq!(parsed.key_manifest, Some(ImageSlot::One));

    // Only 0 and 1 name a slot.
    assert!(serde_json::from_str::<ActiveImageIndex>(
        r#"{"bl2":2,"firmware":null,"config":null,"key_manifest":null}"#,
    )
    .is_err());
}

#[test]
fn serial_version_info() {
    let info = SerialVersionInfo {
        chip_serial: 0x1234_5678,
        ver_km: 1,
        ver_bl2: 2,
        ver_main: 3,
        ver_sec_unlock: 4,
    };
    assert_json(
        r#"{"chip_serial":305419896,"ver_km":1,"ver_bl2":2,"ver_main":3,"ver_sec_unlock":4}"#,
        &info,
    );
}

#[test]
fn kmsk_entry_is_hex() {
    let mut bytes = [0; KMSK_LEN];
    bytes[0] = 0xde;
    bytes[1] = 0xad;
    bytes[KMSK_LEN - 1] = 0x01;
    let entry = KmskEntry(bytes);

    let expected = format!("\"dead{}01\"", "00".repeat(KMSK_LEN - 3));
    assert_json(&expected, &entry);

    let parsed: KmskEntry = serde_json::from_str(&expected).unwrap();
    assert_eq!(parsed, entry);
}
