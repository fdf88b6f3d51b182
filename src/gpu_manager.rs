use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::{
    errors::{GpuInfoError, Result},
    snapshot::{FileSnapshotSource, GpuInfoSnapshot, SnapshotSource},
};

/// Access to the GPUs and driver information of the host.
///
/// Implementors must be safe to share between threads, every setter
/// replaces one field as a whole.
pub trait GpuManager: Send + Sync {
    // Load the last persisted snapshot, if there is one
    fn initialize(&self) -> Result<()>;

    fn set_gpu_ids(&self, gpu_ids: Vec<String>);
    fn get_gpu_ids(&self) -> Vec<String>;

    fn set_driver_version(&self, version: String);
    fn get_driver_version(&self) -> String;

    // The runtime version is the container toolkit integration version
    fn set_runtime_version(&self, version: String);
    fn get_runtime_version(&self) -> String;
}

/// Nvidia implementation of [`GpuManager`], seeded from a snapshot
/// written by the GPU discovery process.
pub struct NvidiaGpuManager<S = FileSnapshotSource> {
    source: S,
    info: RwLock<GpuInfoSnapshot>,
}

impl NvidiaGpuManager<FileSnapshotSource> {
    // Create a manager reading the snapshot from the well-known path
    pub fn new() -> Self {
        Self::with_source(FileSnapshotSource::default())
    }
}

impl Default for NvidiaGpuManager<FileSnapshotSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SnapshotSource> NvidiaGpuManager<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            info: RwLock::new(GpuInfoSnapshot::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // Return a copy of all the fields taken under a single lock
    pub fn snapshot(&self) -> GpuInfoSnapshot {
        self.read_info().clone()
    }

    // Every write is a single field assignment, so the data behind a
    // poisoned lock is still whole and can be used as is
    fn read_info(&self) -> RwLockReadGuard<'_, GpuInfoSnapshot> {
        self.info.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_info(&self) -> RwLockWriteGuard<'_, GpuInfoSnapshot> {
        self.info.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: SnapshotSource> GpuManager for NvidiaGpuManager<S> {
    fn initialize(&self) -> Result<()> {
        let location = self.source.location();

        if !self.source.exists() {
            info!("No GPU info snapshot at {location}, starting empty");

            return Ok(());
        }

        debug!("Loading GPU info snapshot from {location}");

        let content = self.source.read().map_err(|source| {
            GpuInfoError::ReadSnapshot {
                location: location.clone(),
                source,
            }
        })?;

        // Decode aside so a bad snapshot leaves the current values untouched
        let loaded = GpuInfoSnapshot::from_json(&content).map_err(|source| {
            GpuInfoError::ParseSnapshot {
                location: location.clone(),
                source,
            }
        })?;

        info!(
            "Loaded GPU info snapshot: driver \"{}\", runtime \"{}\", {} GPU(s)",
            loaded.driver_version,
            loaded.runtime_version,
            loaded.gpu_ids.len()
        );

        self.set_driver_version(loaded.driver_version);
        self.set_gpu_ids(loaded.gpu_ids);
        self.set_runtime_version(loaded.runtime_version);

        Ok(())
    }

    fn set_gpu_ids(&self, gpu_ids: Vec<String>) {
        self.write_info().gpu_ids = gpu_ids;
    }

    fn get_gpu_ids(&self) -> Vec<String> {
        self.read_info().gpu_ids.clone()
    }

    fn set_driver_version(&self, version: String) {
        self.write_info().driver_version = version;
    }

    fn get_driver_version(&self) -> String {
        self.read_info().driver_version.clone()
    }

    fn set_runtime_version(&self, version: String) {
        self.write_info().runtime_version = version;
    }

    fn get_runtime_version(&self) -> String {
        self.read_info().runtime_version.clone()
    }
}
