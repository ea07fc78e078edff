//! Storage Config

use std::path::PathBuf;

use clap::Args;

/// Local state directory settings.
#[derive(Debug, Args)]
pub struct StorageConfig {
    /// Directory holding the persisted cart and checkout staging
    #[arg(long, env = "GRETTA_DATA_DIR", default_value = ".gretta")]
    pub data_dir: PathBuf,
}
