use thiserror::Error;

// Errors returned while loading the GPU info snapshot
#[derive(Debug, Error)]
pub enum GpuInfoError {
    #[error("could not read GPU file content from {location}")]
    ReadSnapshot {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not unmarshal GPU file content from {location}")]
    ParseSnapshot {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, GpuInfoError>;
