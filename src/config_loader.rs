use crate::config::LabConfig;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::path::Path;

/// Load and parse a lab configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<LabConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let content = std::fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read configuration '{}'", config_path.display()))?;

    let config = parse_config(&content)
        .wrap_err_with(|| format!("Invalid configuration '{}'", config_path.display()))?;

    Ok(config)
}

/// Parse and validate YAML text. Empty input yields the defaults.
pub fn parse_config(content: &str) -> Result<LabConfig> {
    let config: LabConfig = if content.trim().is_empty() {
        LabConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };

    config.validate()?;

    Ok(config)
}

/// Load from `path` when given, otherwise fall back to the defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<LabConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(LabConfig::default())
        }
    }
}
