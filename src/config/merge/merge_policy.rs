//! Merge rules: defaults, override order, environment overrides.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("orchestrator.strict", false)?
        .set_default("logging.level", "info")
}

/// Environment overrides win over every file source.
/// `FOLIO__ORCHESTRATOR__STRICT=true` maps to `orchestrator.strict`.
pub fn with_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("FOLIO")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
