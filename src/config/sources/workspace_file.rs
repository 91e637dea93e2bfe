//! Workspace config source: `folio.toml` beside the plan files, then
//! `folio.<FOLIO_ENV>.toml` when a run environment is named.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const WORKSPACE_CONFIG: &str = "folio.toml";

/// Existing workspace config files, lowest precedence first.
pub fn workspace_config_files(workspace_root: &Path, run_env: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = vec![workspace_root.join(WORKSPACE_CONFIG)];
    if let Some(env) = run_env.map(str::trim).filter(|env| !env.is_empty()) {
        candidates.push(workspace_root.join(format!("folio.{}.toml", env)));
    }
    candidates.into_iter().filter(|path| path.is_file()).collect()
}

pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let run_env = std::env::var("FOLIO_ENV").ok();
    for path in workspace_config_files(workspace_root, run_env.as_deref()) {
        debug!(config_path = %path.display(), "applying workspace configuration");
        builder = builder.add_source(File::from(path).required(false));
    }
    Ok(builder)
}
