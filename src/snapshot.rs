use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

// Directory where the GPUs and driver info are saved
pub const GPU_INFO_DIR_PATH: &str = "/var/lib/ecs/gpu";
// File name of the Nvidia GPUs and driver info snapshot
pub const NVIDIA_GPU_INFO_FILE_NAME: &str = "nvidia-gpu-info.json";

/// GPU information as persisted by the GPU discovery process.
///
/// The field names on the wire are kept as written by the snapshot
/// producer, the runtime version is stored under `NvidiaDockerVersion`.
/// Keys are matched case-sensitively.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfoSnapshot {
    #[serde(
        rename = "DriverVersion",
        default,
        deserialize_with = "null_as_default"
    )]
    pub driver_version: String,

    #[serde(
        rename = "NvidiaDockerVersion",
        default,
        deserialize_with = "null_as_default"
    )]
    pub runtime_version: String,

    #[serde(rename = "GPUIDs", default, deserialize_with = "null_ids_as_empty")]
    pub gpu_ids: Vec<String>,
}

const WIRE_FIELDS: [&str; 3] = ["DriverVersion", "NvidiaDockerVersion", "GPUIDs"];

impl GpuInfoSnapshot {
    // Decode a snapshot from raw Json bytes.
    // Going through a Value makes a repeated key keep its last value
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;

        match &value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => {
                for key in map.keys().filter(|key| is_miscased_field(key)) {
                    debug!("Ignoring snapshot key \"{key}\", keys are case-sensitive");
                }
            }
            _ => {}
        }

        serde_json::from_value(value)
    }
}

fn is_miscased_field(key: &str) -> bool {
    !WIRE_FIELDS.contains(&key)
        && WIRE_FIELDS.iter().any(|field| field.eq_ignore_ascii_case(key))
}

// The producer may write `null` for fields it knows nothing about
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Same as above, a `null` GPU ID decodes to an empty ID
fn null_ids_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = Option::<Vec<Option<String>>>::deserialize(deserializer)?;

    Ok(ids
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Somewhere a GPU info snapshot may be loaded from.
pub trait SnapshotSource: Send + Sync {
    // Return false only if there is definitely no snapshot to read
    fn exists(&self) -> bool;

    // Read the whole snapshot content
    fn read(&self) -> io::Result<Vec<u8>>;

    // Human readable description of the source, used in logs and errors
    fn location(&self) -> String;
}

// Snapshot stored as a Json file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSnapshotSource {
    fn default() -> Self {
        Self::new(Path::new(GPU_INFO_DIR_PATH).join(NVIDIA_GPU_INFO_FILE_NAME))
    }
}

impl SnapshotSource for FileSnapshotSource {
    // Any failure other than "not found" counts as existing, the
    // following read will then report the actual error
    fn exists(&self) -> bool {
        !matches!(self.path.try_exists(), Ok(false))
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    #[test]
    fn test_decode_full_snapshot() {
        let json = br#"{"DriverVersion":"450.80.02","NvidiaDockerVersion":"2.5.0","GPUIDs":["GPU-0","GPU-1"]}"#;

        let snapshot = GpuInfoSnapshot::from_json(json).unwrap();

        assert_eq!(snapshot.driver_version, "450.80.02");
        assert_eq!(snapshot.runtime_version, "2.5.0");
        assert_eq!(snapshot.gpu_ids, vec!["GPU-0", "GPU-1"]);
    }

    #[test]
    fn test_decode_missing_and_null_fields() {
        let snapshot =
            GpuInfoSnapshot::from_json(br#"{"DriverVersion":"470.57.02"}"#)
                .unwrap();
        assert_eq!(snapshot.driver_version, "470.57.02");
        assert!(snapshot.runtime_version.is_empty());
        assert!(snapshot.gpu_ids.is_empty());

        let snapshot = GpuInfoSnapshot::from_json(
            br#"{"DriverVersion":null,"NvidiaDockerVersion":null,"GPUIDs":null}"#,
        )
        .unwrap();
        assert_eq!(snapshot, GpuInfoSnapshot::default());
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = br#"{"GPUIDs":["GPU-a"],"Extra":{"nested":true}}"#;

        let snapshot = GpuInfoSnapshot::from_json(json).unwrap();

        assert_eq!(snapshot.gpu_ids, vec!["GPU-a"]);
    }

    #[test]
    fn test_decode_rejects_bad_content() {
        assert!(GpuInfoSnapshot::from_json(b"not json").is_err());
        assert!(GpuInfoSnapshot::from_json(br#"{"DriverVersion":42}"#).is_err());
        assert!(GpuInfoSnapshot::from_json(br#"{"GPUIDs":"GPU-0"}"#).is_err());
        assert!(GpuInfoSnapshot::from_json(br#"["GPU-0"]"#).is_err());
    }

    #[test]
    fn test_decode_duplicate_keys_last_wins() {
        let json = br#"{"DriverVersion":"1","DriverVersion":"2","GPUIDs":["GPU-0"],"GPUIDs":["GPU-1"]}"#;

        let snapshot = GpuInfoSnapshot::from_json(json).unwrap();

        assert_eq!(snapshot.driver_version, "2");
        assert_eq!(snapshot.gpu_ids, vec!["GPU-1"]);
    }

    #[test]
    fn test_decode_null_gpu_id() {
        let snapshot =
            GpuInfoSnapshot::from_json(br#"{"GPUIDs":["GPU-0",null,"GPU-2"]}"#)
                .unwrap();

        assert_eq!(snapshot.gpu_ids, vec!["GPU-0", "", "GPU-2"]);
    }

    #[test]
    fn test_decode_top_level_null() {
        let snapshot = GpuInfoSnapshot::from_json(b"null").unwrap();

        assert_eq!(snapshot, GpuInfoSnapshot::default());
    }

    #[test]
    fn test_decode_keys_are_case_sensitive() {
        let snapshot = GpuInfoSnapshot::from_json(
            br#"{"driverVersion":"450.80.02","GPUIDs":["GPU-0"]}"#,
        )
        .unwrap();

        assert!(is_miscased_field("driverVersion"));
        assert!(!is_miscased_field("DriverVersion"));
        assert!(!is_miscased_field("Extra"));
        assert!(snapshot.driver_version.is_empty());
        assert_eq!(snapshot.gpu_ids, vec!["GPU-0"]);
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let snapshot = GpuInfoSnapshot {
            driver_version: "535.104.05".to_string(),
            runtime_version: "1.14.1".to_string(),
            gpu_ids: vec!["GPU-0".to_string()],
        };

        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["DriverVersion"], "535.104.05");
        assert_eq!(value["NvidiaDockerVersion"], "1.14.1");
        assert_eq!(value["GPUIDs"][0], "GPU-0");
    }

    #[test]
    fn test_default_source_path() {
        let source = FileSnapshotSource::default();

        assert_eq!(
            source.path(),
            Path::new("/var/lib/ecs/gpu/nvidia-gpu-info.json")
        );
    }

    #[test]
    fn test_file_source_reads_content() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"{\"GPUIDs\":[]}").unwrap();

        let source = FileSnapshotSource::new(temp_file.path());

        assert!(source.exists());
        assert_eq!(source.read().unwrap(), b"{\"GPUIDs\":[]}");
        assert_eq!(source.location(), temp_file.path().display().to_string());
    }

    #[test]
    fn test_file_source_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = FileSnapshotSource::new(temp_dir.path().join("missing.json"));

        assert!(!source.exists());
        assert!(source.read().is_err());
    }

    #[test]
    fn test_file_source_directory_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = FileSnapshotSource::new(temp_dir.path());

        assert!(source.exists());
        assert!(source.read().is_err());
    }
}
