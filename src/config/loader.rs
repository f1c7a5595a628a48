//! Configuration loading and discovery for `assetflow.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::AssetflowConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "assetflow.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse assetflow.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output root
    pub out: Option<PathBuf>,
    /// Override dev server host
    pub host: Option<String>,
    /// Override dev server port
    pub port: Option<u16>,
    /// Force lossy image steps on or off
    pub lossy: Option<bool>,
}

/// Find assetflow.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assetflow.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an assetflow.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration.
pub fn load_config(path: Option<&Path>) -> Result<AssetflowConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<AssetflowConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AssetflowConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Default configuration used when no assetflow.toml is found.
///
/// The project name is taken from the current directory name.
pub fn default_config() -> AssetflowConfig {
    let mut config = AssetflowConfig::default();
    if let Some(name) =
        env::current_dir().ok().and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    {
        config.project.name = name;
    }
    config
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. Overriding the
/// output root also rebases every destination that lived under the old root.
pub fn merge_cli_overrides(config: &mut AssetflowConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        let old_out = config.project.out.clone();
        for category in crate::config::Category::ALL {
            let dest = &mut paths_mut(config, category).dest;
            if let Ok(rest) = dest.strip_prefix(&old_out) {
                *dest = out.join(rest);
            }
        }
        config.clean.selective = config
            .clean
            .selective
            .iter()
            .map(|p| match Path::new(p).strip_prefix(&old_out) {
                Ok(rest) => out.join(rest).to_string_lossy().into_owned(),
                Err(_) => p.clone(),
            })
            .collect();
        config.project.out = out.clone();
    }

    if let Some(ref host) = overrides.host {
        config.serve.host = host.clone();
    }

    if let Some(port) = overrides.port {
        config.serve.port = port;
    }

    if let Some(lossy) = overrides.lossy {
        config.images.lossy = lossy;
    }
}

fn paths_mut(
    config: &mut AssetflowConfig,
    category: crate::config::Category,
) -> &mut crate::config::CategoryPaths {
    use crate::config::Category;
    let table = &mut config.paths;
    match category {
        Category::Styles => &mut table.styles,
        Category::SassStyles => &mut table.sass_styles,
        Category::Scripts => &mut table.scripts,
        Category::Images => &mut table.images,
        Category::Templates => &mut table.templates,
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the assetflow.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
