use std::fs;
use std::path::Path;

use tracing::debug;

use super::ImageConfig;
use crate::error::{AppError, Result};
use crate::msd::image::absolute_path;

/// Load and validate a mount configuration file
pub fn load_config(path: &Path) -> Result<ImageConfig> {
    let data = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("read config file {}: {}", path.display(), e))
    })?;

    let mut config: ImageConfig = serde_json::from_str(&data).map_err(|e| {
        AppError::Config(format!("parse config file {}: {}", path.display(), e))
    })?;

    if config.file.as_os_str().is_empty() {
        return Err(AppError::Config(
            "config missing required field: file".to_string(),
        ));
    }

    if !config.file.is_absolute() {
        config.file = absolute_path(&config.file).map_err(|e| {
            AppError::Config(format!(
                "resolve absolute path for '{}': {}",
                config.file.display(),
                e
            ))
        })?;
    }

    debug!("Loaded configuration from {}: {:?}", path.display(), config);
    Ok(config)
}
