//! Configuration management for sleuthcps.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hexdump::{DEFAULT_WIDTH, MAX_WIDTH as MAX_HEXDUMP_WIDTH};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name under the platform config directory.
const CONFIG_DIR_NAME: &str = "sleuthcps";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "SLEUTHCPS_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SLEUTHCPS_`, sections split by `__`)
/// 2. TOML config file at `~/.config/sleuthcps/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Terminal output configuration.
    pub display: DisplayConfig,
    /// Where generated files go.
    pub output: OutputConfig,
    /// Manifest checking configuration.
    pub manifest: ManifestConfig,
}

/// Terminal output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Bytes per hexdump line when a command does not say otherwise.
    pub hexdump_width: usize,
    /// Print the ASCII banner when the shell starts.
    pub banner: bool,
    /// Shell prompt.
    pub prompt: String,
}

/// Output file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for extracted regions and dumps.
    /// Defaults to the current working directory.
    pub directory: Option<PathBuf>,
    /// Appended to a profile's path when a corrected copy is written.
    pub updated_profile_suffix: String,
}

/// Manifest checking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Hash artifact files when verifying against disk.
    pub verify_hashes: bool,
    /// Report descriptions that contradict the dump's memory area.
    pub check_descriptions: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hexdump_width: DEFAULT_WIDTH,
            banner: true,
            prompt: "sleuth> ".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            updated_profile_suffix: "_updated.csv".to_string(),
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            verify_hashes: true,
            check_descriptions: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HEXDUMP_WIDTH).contains(&self.display.hexdump_width) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "hexdump_width must be between 1 and {MAX_HEXDUMP_WIDTH} (got {})",
                    self.display.hexdump_width
                ),
            });
        }

        if self.output.updated_profile_suffix.is_empty() {
            return Err(Error::ConfigValidation {
                message: "updated_profile_suffix must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Directory for generated files, resolving the default if not set.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.display.hexdump_width, 16);
        assert!(config.display.banner);
        assert_eq!(config.display.prompt, "sleuth> ");
        assert!(config.output.directory.is_none());
        assert_eq!(config.output.updated_profile_suffix, "_updated.csv");
        assert!(config.manifest.verify_hashes);
        assert!(config.manifest.check_descriptions);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_width() {
        let mut config = Config::default();
        config.display.hexdump_width = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("hexdump_width"));
    }

    #[test]
    fn test_validate_wide_width() {
        let mut config = Config::default();
        config.display.hexdump_width = 65;
        assert!(config.validate().is_err());

        config.display.hexdump_width = 64;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_suffix() {
        let mut config = Config::default();
        config.output.updated_profile_suffix = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("updated_profile_suffix"));
    }

    #[test]
    fn test_output_dir_default() {
        assert_eq!(Config::default().output_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_output_dir_custom() {
        let mut config = Config::default();
        config.output.directory = Some(PathBuf::from("/cases/out"));
        assert_eq!(config.output_dir(), PathBuf::from("/cases/out"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("sleuthcps"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[display]\nhexdump_width = 32\nbanner = false\n\n[manifest]\nverify_hashes = false\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.display.hexdump_width, 32);
        assert!(!config.display.banner);
        assert!(!config.manifest.verify_hashes);
        assert_eq!(config.display.prompt, "sleuth> ");
    }

    #[test]
    fn test_load_invalid_toml_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[display]\nhexdump_width = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("hexdump_width"));
        assert!(json.contains("updated_profile_suffix"));
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        assert_eq!(config.clone(), config);
    }
}
