use super::ProviderSpec;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use shared_types::ValidationError;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    providers: Vec<ProviderSpec>,
}

/// Parses provider definitions from TOML text (`[[providers]]` tables)
pub fn parse_catalog(toml: &str) -> Result<Vec<ProviderSpec>, ValidationError> {
    let builder = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .map_err(|e| ValidationError::Catalog(e.to_string()))?;

    into_providers(builder)
}

/// Reads provider definitions from a TOML catalog file
pub fn load_catalog(path: &Path) -> Result<Vec<ProviderSpec>, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::Catalog(format!(
            "Catalog file not found at {:?}",
            path
        )));
    }

    let builder = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .build()
        .map_err(|e| ValidationError::Catalog(format!("{:?}: {}", path, e)))?;

    let providers = into_providers(builder)?;
    tracing::info!("Loaded {} provider(s) from {:?}", providers.len(), path);
    Ok(providers)
}

fn into_providers(config: Config) -> Result<Vec<ProviderSpec>, ValidationError> {
    let catalog: Catalog = config
        .try_deserialize()
        .map_err(|e| ValidationError::Catalog(e.to_string()))?;

    for spec in &catalog.providers {
        spec.validate()?;
    }

    Ok(catalog.providers)
}
