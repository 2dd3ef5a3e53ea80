use config::{Config, ConfigError, Environment, File};
use extractors::{Tolerances, ValidationSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CheckConfig {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    pub currency_tolerance: f64,
    pub usage_tolerance: f64,
    pub annotate: bool,
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let tolerances = Tolerances::default();
        Self {
            currency_tolerance: tolerances.currency,
            usage_tolerance: tolerances.usage,
            annotate: true,
            strict: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    /// Extra provider catalog files, relative paths resolve against the config file
    #[serde(default)]
    pub catalogs: Vec<PathBuf>,
}

impl CheckConfig {
    /// Loads the config file (if any) and `BILLCHECK_*` environment overrides.
    ///
    /// An explicitly requested file must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(get_config_path);

        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::from(config_path.clone()));
        } else if path.is_some() {
            return Err(ConfigError::Message(format!(
                "Config file not found at {:?}",
                config_path
            )));
        } else {
            tracing::debug!("No config at {:?}, using defaults", config_path);
        }

        builder = builder.add_source(
            Environment::with_prefix("BILLCHECK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: CheckConfig = builder.build()?.try_deserialize()?;

        if config.validation.currency_tolerance < 0.0 || config.validation.usage_tolerance < 0.0 {
            return Err(ConfigError::Message(
                "validation tolerances must not be negative".to_string(),
            ));
        }

        if let Some(base) = config_path.parent() {
            config.providers.catalogs = config
                .providers
                .catalogs
                .into_iter()
                .map(|p| if p.is_relative() { base.join(p) } else { p })
                .collect();
        }

        Ok((config, config_path))
    }

    pub fn settings(&self) -> ValidationSettings {
        ValidationSettings {
            tolerances: Tolerances {
                currency: self.validation.currency_tolerance,
                usage: self.validation.usage_tolerance,
            },
            annotate: self.validation.annotate,
            strict: self.validation.strict,
        }
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("billcheck").join("config.toml")
    } else {
        PathBuf::from("billcheck.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[validation]
currency_tolerance = 0.05
strict = true

[providers]
catalogs = ["catalogs/extra.toml", "/etc/billcheck/shared.toml"]
"#,
        )
        .unwrap();

        let (config, loaded_from) = CheckConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded_from, path);
        assert_eq!(config.validation.currency_tolerance, 0.05);
        assert_eq!(config.validation.usage_tolerance, 0.5);
        assert!(config.validation.annotate);
        assert!(config.validation.strict);
        assert_eq!(
            config.providers.catalogs,
            vec![
                dir.path().join("catalogs/extra.toml"),
                PathBuf::from("/etc/billcheck/shared.toml")
            ]
        );

        let settings = config.settings();
        assert_eq!(settings.tolerances.currency, 0.05);
        assert!(settings.strict);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(CheckConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[validation]\nusage_tolerance = -1.0\n").unwrap();
        assert!(CheckConfig::load(Some(&path)).is_err());
    }
}
