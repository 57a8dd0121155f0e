//! Fuzz target: persisted settings record decoding
//!
//! Treats arbitrary bytes as the stored region image and decodes it the way
//! a cold boot would.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A `Valid` record is always complete and flagged valid
//! - A `Blank` record is the in-memory default
//! - Re-encoding a decoded non-blank record and decoding again is stable
//!
//! cargo fuzz run fuzz_record_decode

#![no_main]

use battmon::settings::SettingsRecord;
use battmon::settings::layout::{self, RECORD_LEN, RecordBytes, RecordStatus};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut bytes: RecordBytes = [0xFF; RECORD_LEN];
    let n = data.len().min(RECORD_LEN);
    bytes[..n].copy_from_slice(&data[..n]);

    let (record, status) = layout::decode(&bytes);
    match status {
        RecordStatus::Valid => {
            assert!(record.valid);
            assert!(record.is_complete());
        }
        RecordStatus::Incomplete => assert!(!record.valid),
        RecordStatus::Blank => {
            assert_eq!(record, SettingsRecord::default());
            return;
        }
    }

    let (again, again_status) = layout::decode(&layout::encode(&record));
    assert_eq!(again, record);
    assert_eq!(again_status, status);
});
