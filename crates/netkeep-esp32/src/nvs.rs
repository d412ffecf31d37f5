//! NVS (Non-Volatile Storage) persistence for ESP32.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::EspError;
use log::debug;
use netkeep_core::{copy_prefix, Persistence, PersistenceSession, StoreError};

/// Persistence over the default NVS partition.
#[derive(Clone)]
pub struct NvsPersistence {
    partition: EspDefaultNvsPartition,
}

impl NvsPersistence {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }
}

impl Persistence for NvsPersistence {
    fn begin(
        &self,
        namespace: &str,
        read_only: bool,
    ) -> Result<Box<dyn PersistenceSession + '_>, StoreError> {
        let nvs = EspNvs::new(self.partition.clone(), namespace, !read_only)
            .map_err(|e| StoreError::Unavailable(format!("nvs '{}': {}", namespace, e)))?;
        Ok(Box::new(NvsSession { nvs }))
    }
}

/// An open NVS namespace. The handle is closed on drop.
struct NvsSession {
    nvs: EspNvs<NvsDefault>,
}

impl PersistenceSession for NvsSession {
    fn get_length(&self, key: &str) -> Result<Option<usize>, StoreError> {
        self.nvs
            .blob_len(key)
            .map_err(|e| StoreError::ReadError(e.to_string()))
    }

    /// `nvs_get_blob` rejects a buffer shorter than the stored blob, so
    /// oversized blobs are read in full and truncated here.
    fn get_bytes(&self, key: &str, buf: &mut [u8]) -> Result<usize, StoreError> {
        let read_err = |e: EspError| StoreError::ReadError(e.to_string());

        let Some(len) = self.nvs.blob_len(key).map_err(read_err)? else {
            return Ok(0);
        };
        if len <= buf.len() {
            let data = self.nvs.get_blob(key, buf).map_err(read_err)?;
            return Ok(data.map_or(0, <[u8]>::len));
        }

        debug!("NVS: '{}' holds {} bytes, reading first {}", key, len, buf.len());
        let mut full = vec![0u8; len];
        let data = self.nvs.get_blob(key, &mut full).map_err(read_err)?;
        Ok(data.map_or(0, |data| copy_prefix(data, buf)))
    }

    fn put_bytes(&mut self, key: &str, data: &[u8]) -> Result<usize, StoreError> {
        self.nvs
            .set_blob(key, data)
            .map_err(|e| StoreError::WriteError(e.to_string()))?;
        debug!("NVS: wrote {} bytes to '{}'", data.len(), key);
        Ok(data.len())
    }
}
