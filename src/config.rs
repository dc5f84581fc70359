//! Optional instance defaults loaded from a `loadfleet.toml`/`.json` file.
//!
//! CLI flags win over file values; file values win over built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::args::{HttpMethod, InstanceArgs};
use crate::error::{AppError, AppResult, ConfigError};

/// Default config filenames checked when `--config` is not given.
const DEFAULT_CONFIG_FILES: [&str; 2] = ["loadfleet.toml", "loadfleet.json"];

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub target: Option<String>,
    pub method: Option<HttpMethod>,
    pub data: Option<String>,
}

/// Loads the config file from `path`, or the first default file that exists.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> AppResult<Option<ConfigFile>> {
    if let Some(path) = path {
        return Ok(Some(load_config_file(Path::new(path))?));
    }

    for candidate in DEFAULT_CONFIG_FILES {
        let candidate = PathBuf::from(candidate);
        if candidate.exists() {
            return Ok(Some(load_config_file(&candidate)?));
        }
    }

    Ok(None)
}

fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}

/// Fills unset template fields on `args` from the loaded config file.
pub fn apply_config(args: &mut InstanceArgs, config: &ConfigFile) {
    if args.target.is_none() {
        args.target.clone_from(&config.target);
    }
    if args.method.is_none() {
        args.method = config.method;
    }
    if args.data.is_none() {
        args.data.clone_from(&config.data);
    }
}
