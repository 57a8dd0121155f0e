//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`RecordStoragePort`] as an EEPROM-style region: a RAM image
//! that is loaded once from a single NVS blob, edited in place by `write`,
//! and flushed back by `commit`.
//!
//! - Erased or never-written storage reads as `0xFF`.
//! - A blob that cannot be loaded leaves the region unreadable until the
//!   next successful commit; reads fail with [`StorageError::Io`].
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`, so a power loss
//!   mid-save leaves the previous record intact.

use crate::app::ports::{RecordStoragePort, StorageError};
use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Size of the emulated region; the settings record sits at offset 0.
pub const REGION_LEN: usize = 1024;

/// Value of an erased byte.
pub const ERASED: u8 = 0xFF;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"battmon\0";
#[cfg(target_os = "espidf")]
const BLOB_KEY: &[u8] = b"eeprom\0";

pub struct NvsRecordStorage {
    image: Box<[u8; REGION_LEN]>,
    /// The stored blob could not be loaded; the image is not its contents.
    load_failed: bool,
    #[cfg(not(target_os = "espidf"))]
    durable: Box<[u8; REGION_LEN]>,
    #[cfg(not(target_os = "espidf"))]
    fail_commit: bool,
}

impl NvsRecordStorage {
    /// Initialise NVS flash and load the region image.
    ///
    /// On a version mismatch or a full partition the NVS partition is
    /// erased and re-initialised, which reads back as blank storage.  Only
    /// a flash that cannot be initialised is an error; a blob that cannot
    /// be read leaves the storage unreadable instead.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::Io);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::Io);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::Io);
            }

            let mut image = Box::new([ERASED; REGION_LEN]);
            let mut load_failed = false;
            match Self::with_nvs_handle(false, |handle| {
                let mut size = REGION_LEN;
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        BLOB_KEY.as_ptr() as *const _,
                        image.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            }) {
                Ok(size) => info!("NvsRecordStorage: loaded {} bytes", size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsRecordStorage: no stored region, starting erased");
                }
                Err(e) => {
                    warn!("NvsRecordStorage: NVS read error {}, region unreadable", e);
                    image.fill(ERASED);
                    load_failed = true;
                }
            }

            Ok(Self { image, load_failed })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsRecordStorage: simulation backend");
            Ok(Self::erased())
        }
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    fn check_bounds(offset: usize, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let end = offset.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > REGION_LEN {
            return Err(StorageError::OutOfBounds);
        }
        Ok(offset..end)
    }
}

// ── Simulation helpers ─────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NvsRecordStorage {
    /// Fresh, never-written storage.
    pub fn erased() -> Self {
        Self {
            image: Box::new([ERASED; REGION_LEN]),
            load_failed: false,
            durable: Box::new([ERASED; REGION_LEN]),
            fail_commit: false,
        }
    }

    /// Make subsequent commits fail.
    pub fn set_commit_failure(&mut self, fail: bool) {
        self.fail_commit = fail;
    }

    /// Make reads fail as after a blob that could not be loaded.
    pub fn set_read_failure(&mut self, fail: bool) {
        self.load_failed = fail;
    }

    /// The committed bytes, as a cold boot would see them.
    pub fn durable(&self) -> &[u8] {
        &self.durable[..]
    }

    /// Simulate a power cycle: uncommitted writes are lost.
    pub fn power_cycle(&mut self) {
        *self.image = *self.durable;
    }

    /// Simulate a power cycle whose blob load fails.
    pub fn power_cycle_unreadable(&mut self) {
        self.image.fill(ERASED);
        self.load_failed = true;
    }
}

impl RecordStoragePort for NvsRecordStorage {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        if self.load_failed {
            return Err(StorageError::Io);
        }
        let range = Self::check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let range = Self::check_bounds(offset, data.len())?;
        self.image[range].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if self.fail_commit {
                warn!("NvsRecordStorage: injected commit failure");
                return Err(StorageError::CommitFailed);
            }
            *self.durable = *self.image;
            self.load_failed = false;
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let image = &self.image;
            let result = Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        BLOB_KEY.as_ptr() as *const _,
                        image.as_ptr() as *const _,
                        REGION_LEN,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsRecordStorage: NVS commit error {}", e);
                StorageError::CommitFailed
            })?;
            // The blob now holds the image.
            self.load_failed = false;
            Ok(())
        }
    }
}
