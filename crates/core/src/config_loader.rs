use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};

use crate::config::AnalysisConfig;

/// Default TOML location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";
/// Prefix for environment overrides, e.g. `YIELDSENSE_SIGNALS__THRESHOLD=0.4`.
pub const ENV_PREFIX: &str = "YIELDSENSE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads analysis configuration from `config/Config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the merged
    /// configuration fails validation.
    pub fn load() -> Result<AnalysisConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads analysis configuration by merging a TOML file, environment
    /// variables and an optional JSON overlay on top of the compiled defaults.
    ///
    /// The overlay sits next to the TOML file with a `.json` extension
    /// (`config/Config.toml` pairs with `config/Config.json`) and only fills
    /// keys the TOML and environment leave unset. Missing files are skipped;
    /// every field not named anywhere keeps its default.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the merged
    /// configuration fails validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AnalysisConfig> {
        let path = path.as_ref();
        let config: AnalysisConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        config.validate().context("invalid analysis configuration")?;

        tracing::debug!(path = %path.display(), "loaded analysis configuration");
        Ok(config)
    }
}
