use anyhow::{Context, Result};
use nvidia_gpu_info::{
    FileSnapshotSource, GpuManager, NvidiaGpuManager, arg_parser::ArgsOptions,
    logger,
};

fn main() -> Result<()> {
    logger::init_logging();

    // Parse the command line arguments
    let args_options = ArgsOptions::parse();

    let manager = NvidiaGpuManager::with_source(FileSnapshotSource::new(
        &args_options.snapshot_path,
    ));

    manager.initialize().with_context(|| {
        format!(
            "Failed to load GPU info from {:?}",
            args_options.snapshot_path
        )
    })?;

    // Print the loaded state in the snapshot wire format
    let report = serde_json::to_string_pretty(&manager.snapshot())
        .context("Failed to encode GPU info")?;
    println!("{report}");

    Ok(())
}
