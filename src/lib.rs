pub mod arg_parser;
pub mod errors;
pub mod gpu_manager;
pub mod logger;
pub mod snapshot;

pub use errors::{GpuInfoError, Result};
pub use gpu_manager::{GpuManager, NvidiaGpuManager};
pub use snapshot::{FileSnapshotSource, GpuInfoSnapshot, SnapshotSource};
