use std::path::PathBuf;

use argparse::{ArgumentParser, Print, Store};

use crate::snapshot::FileSnapshotSource;

pub struct ArgsOptions {
    pub snapshot_path: PathBuf,
}

impl ArgsOptions {
    pub fn parse() -> Self {
        let mut options = ArgsOptions::default();

        {
            let mut parser = ArgumentParser::new();
            parser.set_description(
                "Show the GPU info snapshot left by the GPU discovery process",
            );

            // Snapshot file path
            parser.refer(&mut options.snapshot_path).add_option(
                &["-s", "--snapshot"],
                Store,
                "The file path of the GPU info snapshot",
            );

            // Show the tool version
            parser.add_option(
                &["-V", "--version"],
                Print(env!("CARGO_PKG_VERSION").to_string()),
                "Show the tool version",
            );

            parser.parse_args_or_exit();
        }

        options
    }
}

impl Default for ArgsOptions {
    fn default() -> Self {
        Self {
            snapshot_path: FileSnapshotSource::default().path().to_path_buf(),
        }
    }
}
