//! Settings store: the sole owner of the persisted record.
//!
//! Loading fails soft (a bad or missing record is a status, never an
//! error).  Saving re-derives the sentinel from the completeness predicate,
//! writes the whole fixed-size record, then commits.

use log::{info, warn};

use super::layout::{self, RECORD_LEN, RECORD_OFFSET, RecordStatus};
use super::{SettingsRecord, generate_client_id};
use crate::app::ports::{EntropyPort, RecordStoragePort, StorageError};

/// What a successful save persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// The record was written with the valid sentinel.
    pub complete: bool,
}

/// Settings store over an EEPROM-like [`RecordStoragePort`].
pub struct SettingsStore<S> {
    storage: S,
    current: SettingsRecord,
    status: RecordStatus,
}

impl<S: RecordStoragePort> SettingsStore<S> {
    /// Wrap `storage`.  Nothing is read until [`load`](Self::load).
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            current: SettingsRecord::default(),
            status: RecordStatus::Blank,
        }
    }

    /// Read and classify the stored record.
    ///
    /// A read failure is reported as [`RecordStatus::Incomplete`] so a
    /// transient fault puts the node into configuration mode instead of
    /// wiping it.
    pub fn load(&mut self) -> RecordStatus {
        let mut bytes = [0u8; RECORD_LEN];
        let (record, status) = match self.storage.read(RECORD_OFFSET, &mut bytes) {
            Ok(()) => layout::decode(&bytes),
            Err(e) => {
                warn!("Settings read failed ({}), treating as incomplete", e);
                (SettingsRecord::default(), RecordStatus::Incomplete)
            }
        };
        info!("Settings loaded: {:?}", status);
        self.current = record;
        self.status = status;
        status
    }

    /// The in-memory record.
    pub fn current(&self) -> &SettingsRecord {
        &self.current
    }

    /// Status found by the last [`load`](Self::load).
    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Persist `record`.
    ///
    /// A missing client id is generated first, then `valid` is recomputed.
    /// The in-memory copy is replaced even when the commit fails; the
    /// durable copy may then revert on the next boot.
    pub fn save(
        &mut self,
        mut record: SettingsRecord,
        entropy: &mut impl EntropyPort,
    ) -> Result<SaveReport, StorageError> {
        if record.client_id.is_empty() {
            record.client_id = generate_client_id(entropy);
        }
        record.valid = record.is_complete();
        let complete = record.valid;

        let bytes = layout::encode(&record);
        self.current = record;

        self.storage.write(RECORD_OFFSET, &bytes)?;
        self.storage.commit()?;

        info!(
            "Settings saved ({})",
            if complete { "complete" } else { "incomplete" }
        );
        Ok(SaveReport { complete })
    }

    /// Factory state with a fresh client id.  Not persisted.
    pub fn reset_to_defaults(&self, entropy: &mut impl EntropyPort) -> SettingsRecord {
        SettingsRecord::factory_defaults(generate_client_id(entropy))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
