//! Config loading facade: one entry point over sources and merge policy.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::FolioConfig;
use config::{Config, File};
use std::path::{Path, PathBuf};

/// Loads `FolioConfig` from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace: defaults, global file, workspace files, env.
    pub fn load(workspace_root: &Path) -> Result<FolioConfig, config::ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = merge_policy::with_environment(builder);
        builder.build()?.try_deserialize()
    }

    /// Load configuration from one explicit file, still honoring env overrides.
    pub fn load_from_file(path: &Path) -> Result<FolioConfig, config::ConfigError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));
        merge_policy::with_environment(builder)
            .build()?
            .try_deserialize()
    }

    /// Global config path, if HOME or XDG_CONFIG_HOME is set
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Defaults only, no file or env lookups
    pub fn defaults() -> Result<FolioConfig, config::ConfigError> {
        Config::builder().build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Serializes HOME / XDG_CONFIG_HOME mutation across tests
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn with_isolated_home<F: FnOnce(&Path)>(temp: &TempDir, f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let original_home = std::env::var("HOME").ok();
        let original_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        let home = temp.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        std::env::set_var("HOME", &home);
        std::env::remove_var("XDG_CONFIG_HOME");

        f(&home);

        match original_home {
            Some(h) => std::env::set_var("HOME", h),
            None => std::env::remove_var("HOME"),
        }
        match original_xdg {
            Some(x) => std::env::set_var("XDG_CONFIG_HOME", x),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    fn test_defaults_without_files() {
        let config = ConfigLoader::defaults().unwrap();
        assert_eq!(config.orchestrator.limiter.hard_max, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_workspace_config_overrides_global() {
        let temp = TempDir::new().unwrap();
        with_isolated_home(&temp, |home| {
            let global_dir = home.join(".config").join("folio");
            std::fs::create_dir_all(&global_dir).unwrap();
            std::fs::write(
                global_dir.join("config.toml"),
                "[orchestrator.limiter]\nhard_max = 10\n\n[orchestrator.quality]\nmin_score = 70.0\n",
            )
            .unwrap();

            let workspace = temp.path().join("workspace");
            std::fs::create_dir_all(&workspace).unwrap();
            std::fs::write(
                workspace.join("folio.toml"),
                "[orchestrator.limiter]\nhard_max = 3\n",
            )
            .unwrap();

            let config = ConfigLoader::load(&workspace).unwrap();
            assert_eq!(config.orchestrator.limiter.hard_max, 3);
            assert_eq!(config.orchestrator.quality.min_score, 70.0);
        });
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("folio.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
strict = true

[orchestrator.writing]
stagger_ms = 0
writer_group_concurrency = 4

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert!(config.orchestrator.strict);
        assert_eq!(config.orchestrator.writing.stagger_ms, 0);
        assert_eq!(config.orchestrator.writing.writer_group_concurrency, 4);
        assert_eq!(config.logging.format, "json");
    }
}
